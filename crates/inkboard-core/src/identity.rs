//! Session identity produced once at startup.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sync::SyncError;

/// Who this client is and whether a remote store should be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque identity token; also keys the local cache.
    pub id: String,
    /// Application scope the shared document lives under.
    pub app_scope: String,
    /// `false` means the session runs against the local cache only.
    pub connected: bool,
}

impl Identity {
    pub fn new(id: impl Into<String>, app_scope: impl Into<String>, connected: bool) -> Self {
        Self {
            id: id.into(),
            app_scope: app_scope.into(),
            connected,
        }
    }

    /// A locally generated identity with a random id and no connectivity.
    pub fn local(app_scope: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), app_scope, false)
    }

    /// Ask `provider` for an identity, falling back to [`Identity::local`].
    pub fn resolve<P: IdentityProvider + ?Sized>(provider: &P, app_scope: &str) -> Self {
        match provider.identify() {
            Ok(identity) => {
                log::info!(
                    "Signed in as {} (scope {}, connected: {})",
                    identity.id,
                    identity.app_scope,
                    identity.connected
                );
                identity
            }
            Err(e) => {
                let identity = Self::local(app_scope);
                log::warn!(
                    "Identity provider failed ({}), continuing offline as {}",
                    e,
                    identity.id
                );
                identity
            }
        }
    }

    /// Mark the identity as having lost its remote connection.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// External authentication collaborator.
pub trait IdentityProvider {
    fn identify(&self) -> Result<Identity, SyncError>;
}

/// Provider that hands out a fixed identity.
#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

impl IdentityProvider for StaticIdentity {
    fn identify(&self) -> Result<Identity, SyncError> {
        Ok(self.0.clone())
    }
}
