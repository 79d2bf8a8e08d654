//! Remote document store abstraction.
//!
//! A document store exposes point reads, full-document writes and change
//! subscriptions. Pushed changes arrive on a [`Subscription`] channel that
//! the owner drains when convenient; nothing calls back into the board.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod ws;

pub use memory::MemoryDocumentStore;

#[cfg(not(target_arch = "wasm32"))]
pub use ws::WsDocumentStore;

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, TryRecvError};
use thiserror::Error;

/// Remote store errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for store operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Events pushed by a store to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The document was overwritten by another client.
    Changed(String),
    /// The store can no longer be reached.
    Failed(String),
}

/// A live change feed for one document.
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) detaches
/// it from the store.
pub struct Subscription {
    doc: String,
    events: Receiver<StoreEvent>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl Subscription {
    pub fn new(
        doc: impl Into<String>,
        events: Receiver<StoreEvent>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            doc: doc.into(),
            events,
            cancel: Some(Box::new(cancel)),
            closed: false,
        }
    }

    /// Document this subscription follows.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Take every event delivered so far, in delivery order.
    ///
    /// If the store dropped its end of the channel a single
    /// [`StoreEvent::Failed`] is reported.
    pub fn drain(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        if self.closed {
            return events;
        }
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    events.push(StoreEvent::Failed("subscription closed".to_string()));
                    break;
                }
            }
        }
        events
    }

    /// Detach from the store.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            log::debug!("Releasing subscription to {}", self.doc);
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("doc", &self.doc)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Trait for remote document stores.
///
/// Writes are full overwrites with no merge and no version check. `set`
/// must not block on the network: failures that happen after the hand-off
/// are reported through the document's subscription.
pub trait DocumentStore {
    /// Read the current document, `None` if it was never written.
    fn get(&mut self, id: &str) -> SyncResult<Option<String>>;

    /// Overwrite the document.
    fn set(&mut self, id: &str, blob: &str) -> SyncResult<()>;

    /// Follow changes made by other clients.
    fn subscribe(&mut self, id: &str) -> SyncResult<Subscription>;
}

/// Messages sent to the store server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Point read of a document
    Get { doc: String },
    /// Overwrite a document
    Set { doc: String, data: String },
    /// Start receiving changes for a document
    Subscribe { doc: String },
    /// Stop receiving changes for a document
    Unsubscribe { doc: String },
}

/// Messages received from the store server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a get
    Document {
        doc: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    /// Another client overwrote a subscribed document
    Changed { doc: String, data: String },
    /// A set was stored
    Saved { doc: String },
    /// Error message
    Error { message: String },
}
