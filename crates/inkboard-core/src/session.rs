//! Keeps the local drawing log and the shared remote document in step.
//!
//! The policy is whole-document last-writer-wins: every save overwrites the
//! remote document with the full local log, and every remote change replaces
//! the local log. Concurrent saves from two clients silently drop whichever
//! strokes the earlier writer added; there is no merge and no version check.

use crate::config::BoardConfig;
use crate::drawing::DrawingLog;
use crate::identity::Identity;
use crate::storage::{LocalCache, MemoryCache, cache_key};
use crate::sync::{DocumentStore, StoreEvent, Subscription, SyncError};

#[cfg(not(target_arch = "wasm32"))]
use crate::storage::FileCache;
#[cfg(target_arch = "wasm32")]
use crate::storage::WebStorageCache;
#[cfg(not(target_arch = "wasm32"))]
use crate::sync::WsDocumentStore;

/// Name of the shared board document inside an application scope.
pub const DOCUMENT_NAME: &str = "whiteboard";

/// Remote document path for an application scope.
pub fn document_path(app_scope: &str) -> String {
    format!("{}/{}", app_scope, DOCUMENT_NAME)
}

/// A live connection to the remote document.
pub struct RemoteHandle {
    store: Box<dyn DocumentStore>,
    doc: String,
    subscription: Subscription,
}

impl RemoteHandle {
    /// Path of the followed document.
    pub fn doc(&self) -> &str {
        &self.doc
    }
}

/// Where saves go, decided once at bootstrap.
///
/// A remote session can later fall back to `LocalOnly`; it never goes the
/// other way within a session.
pub enum SyncMode {
    LocalOnly,
    Remote(RemoteHandle),
}

/// Where a save ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Remote,
    LocalCache,
    /// Neither the store nor the cache accepted the write.
    Dropped,
}

/// Events produced while draining the remote subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Another client overwrote the document; replace the local log.
    DocumentReplaced(DrawingLog),
    /// The remote store was lost; the session now runs on the local cache.
    Degraded { reason: String },
}

/// Result of [`SyncClient::bootstrap`]: the client plus the hydrated log.
pub struct Bootstrapped {
    pub client: SyncClient,
    pub log: DrawingLog,
}

/// Remote sync client with local-cache fallback.
pub struct SyncClient {
    identity: Identity,
    mode: SyncMode,
    cache: Box<dyn LocalCache>,
}

impl SyncClient {
    /// Hydrate the initial log and attach to the remote document.
    ///
    /// The point read completes before the subscription is attached, so a
    /// change pushed during startup is never overwritten by a stale read.
    /// Any remote failure degrades to the local cache; nothing is returned
    /// as an error.
    pub fn bootstrap(
        mut identity: Identity,
        store: Option<Box<dyn DocumentStore>>,
        cache: Box<dyn LocalCache>,
    ) -> Bootstrapped {
        let remote = match store {
            Some(store) if identity.connected => {
                let doc = document_path(&identity.app_scope);
                match open_remote(store, doc) {
                    Ok(remote) => Some(remote),
                    Err(e) => {
                        log::warn!("Remote store unavailable ({}), using local cache", e);
                        identity.disconnect();
                        None
                    }
                }
            }
            Some(_) => {
                log::info!("Identity {} is offline, using local cache", identity.id);
                None
            }
            None => {
                if identity.connected {
                    log::info!("No document store configured, using local cache");
                    identity.disconnect();
                }
                None
            }
        };

        let (mode, log) = match remote {
            Some((handle, log)) => {
                log::info!("Joined {} with {} segments", handle.doc, log.len());
                (SyncMode::Remote(handle), log)
            }
            None => (SyncMode::LocalOnly, load_cached(cache.as_ref(), &identity)),
        };

        Bootstrapped {
            client: Self {
                identity,
                mode,
                cache,
            },
            log,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn mode(&self) -> &SyncMode {
        &self.mode
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.mode, SyncMode::Remote(_))
    }

    /// Overwrite the persisted document with the full log.
    ///
    /// Never fails: a remote write error switches the session to the local
    /// cache and the log is written there instead.
    pub fn save(&mut self, log: &DrawingLog) -> SaveTarget {
        let blob = match log.serialize() {
            Ok(blob) => blob,
            Err(e) => {
                log::warn!("Failed to serialize drawing log: {}", e);
                return SaveTarget::Dropped;
            }
        };

        let remote_result = match &mut self.mode {
            SyncMode::Remote(remote) => Some(remote.store.set(&remote.doc, &blob)),
            SyncMode::LocalOnly => None,
        };

        match remote_result {
            Some(Ok(())) => {
                log::debug!("Saved {} segments to remote store", log.len());
                SaveTarget::Remote
            }
            Some(Err(e)) => {
                self.degrade(&e.to_string());
                self.save_local(&blob)
            }
            None => self.save_local(&blob),
        }
    }

    /// Drain remote changes delivered since the last poll, in order.
    pub fn poll(&mut self) -> Vec<SyncEvent> {
        let SyncMode::Remote(remote) = &mut self.mode else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let mut failure = None;
        for event in remote.subscription.drain() {
            match event {
                StoreEvent::Changed(blob) => match DrawingLog::deserialize(&blob) {
                    Ok(log) => events.push(SyncEvent::DocumentReplaced(log)),
                    Err(e) => log::warn!("Discarding remote update: {}", e),
                },
                StoreEvent::Failed(reason) => {
                    failure = Some(reason);
                    break;
                }
            }
        }

        if let Some(reason) = failure {
            self.degrade(&reason);
            events.push(SyncEvent::Degraded { reason });
        }
        events
    }

    /// Release the subscription and end the session.
    pub fn shutdown(self) {
        if let SyncMode::Remote(remote) = self.mode {
            log::info!("Leaving {}", remote.doc);
            remote.subscription.cancel();
        }
    }

    fn degrade(&mut self, reason: &str) {
        if let SyncMode::Remote(remote) = std::mem::replace(&mut self.mode, SyncMode::LocalOnly) {
            log::warn!(
                "Lost remote store for {} ({}), continuing on local cache",
                remote.doc,
                reason
            );
            remote.subscription.cancel();
        }
        self.identity.disconnect();
    }

    fn save_local(&self, blob: &str) -> SaveTarget {
        let key = cache_key(&self.identity.id);
        match self.cache.set(&key, blob) {
            Ok(()) => SaveTarget::LocalCache,
            Err(e) => {
                log::warn!("Failed to write local cache {}: {}", key, e);
                SaveTarget::Dropped
            }
        }
    }
}

/// Connect to the configured store server, if any.
///
/// A connection failure is logged and yields `None`; bootstrap then runs the
/// session against the local cache.
#[cfg(not(target_arch = "wasm32"))]
pub fn connect_store(config: &BoardConfig) -> Option<Box<dyn DocumentStore>> {
    let url = config.server_url.as_deref()?;
    match WsDocumentStore::connect(url, config.request_timeout()) {
        Ok(store) => Some(Box::new(store)),
        Err(e) => {
            log::warn!("Could not reach document store at {}: {}", url, e);
            None
        }
    }
}

/// Open the local cache for this platform.
#[cfg(not(target_arch = "wasm32"))]
pub fn open_cache(config: &BoardConfig) -> Box<dyn LocalCache> {
    let cache = match &config.cache_dir {
        Some(dir) => FileCache::new(dir.clone()),
        None => FileCache::default_location(),
    };
    match cache {
        Ok(cache) => {
            log::debug!("Local cache at {}", cache.base_path().display());
            Box::new(cache)
        }
        Err(e) => {
            log::warn!("File cache unavailable ({}), keeping the board in memory", e);
            Box::new(MemoryCache::new())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub fn open_cache(_config: &BoardConfig) -> Box<dyn LocalCache> {
    Box::new(WebStorageCache::new())
}

fn open_remote(
    mut store: Box<dyn DocumentStore>,
    doc: String,
) -> Result<(RemoteHandle, DrawingLog), SyncError> {
    let log = match store.get(&doc)? {
        Some(blob) => DrawingLog::deserialize(&blob).unwrap_or_else(|e| {
            log::warn!("Remote document {} is unreadable, starting empty: {}", doc, e);
            DrawingLog::new()
        }),
        None => DrawingLog::new(),
    };
    let subscription = store.subscribe(&doc)?;
    Ok((
        RemoteHandle {
            store,
            doc,
            subscription,
        },
        log,
    ))
}

fn load_cached(cache: &dyn LocalCache, identity: &Identity) -> DrawingLog {
    let key = cache_key(&identity.id);
    match cache.get(&key) {
        Ok(Some(blob)) => DrawingLog::deserialize(&blob).unwrap_or_else(|e| {
            log::warn!("Local cache {} is unreadable, starting empty: {}", key, e);
            DrawingLog::new()
        }),
        Ok(None) => DrawingLog::new(),
        Err(e) => {
            log::warn!("Failed to read local cache {}: {}", key, e);
            DrawingLog::new()
        }
    }
}
