//! In-process document store.
//!
//! Several handles can share one backend to simulate independent clients
//! talking to the same remote store. A writer never receives its own change.

use super::{DocumentStore, StoreEvent, Subscription, SyncError, SyncResult};
use std::collections::HashMap;
use std::sync::mpsc::{Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};

struct Subscriber {
    id: u64,
    origin: u64,
    doc: String,
    tx: Sender<StoreEvent>,
}

#[derive(Default)]
struct Backend {
    documents: HashMap<String, String>,
    subscribers: Vec<Subscriber>,
    reachable: bool,
    next_id: u64,
}

impl Backend {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory document store for tests and single-process sessions.
pub struct MemoryDocumentStore {
    backend: Arc<Mutex<Backend>>,
    origin: u64,
}

impl MemoryDocumentStore {
    /// Create a new reachable store with no documents.
    pub fn new() -> Self {
        let backend = Backend {
            reachable: true,
            ..Backend::default()
        };
        Self {
            backend: Arc::new(Mutex::new(backend)),
            origin: 0,
        }
    }

    /// Another client's view of the same backend.
    pub fn handle(&self) -> Self {
        let origin = self.lock().map(|mut b| b.next_id()).unwrap_or_default();
        Self {
            backend: self.backend.clone(),
            origin,
        }
    }

    /// Simulate an outage (or recovery). Going down fails every live
    /// subscription.
    pub fn set_reachable(&self, reachable: bool) {
        let Ok(mut backend) = self.lock() else {
            return;
        };
        backend.reachable = reachable;
        if !reachable {
            for sub in backend.subscribers.drain(..) {
                let _ = sub.tx.send(StoreEvent::Failed("store unreachable".to_string()));
            }
        }
    }

    /// Inspect the stored blob for `id`.
    pub fn document(&self, id: &str) -> Option<String> {
        self.lock().ok()?.documents.get(id).cloned()
    }

    /// Number of live subscriptions to `id`.
    pub fn subscriber_count(&self, id: &str) -> usize {
        self.lock()
            .map(|b| b.subscribers.iter().filter(|s| s.doc == id).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Backend>> {
        self.backend
            .lock()
            .map_err(|e| SyncError::Connectivity(format!("Lock error: {}", e)))
    }

    fn reachable(&self) -> SyncResult<MutexGuard<'_, Backend>> {
        let backend = self.lock()?;
        if !backend.reachable {
            return Err(SyncError::Connectivity("store unreachable".to_string()));
        }
        Ok(backend)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&mut self, id: &str) -> SyncResult<Option<String>> {
        Ok(self.reachable()?.documents.get(id).cloned())
    }

    fn set(&mut self, id: &str, blob: &str) -> SyncResult<()> {
        let origin = self.origin;
        let mut backend = self.reachable()?;
        backend.documents.insert(id.to_string(), blob.to_string());
        // Dead receivers are pruned on the way.
        backend.subscribers.retain(|sub| {
            if sub.doc != id || sub.origin == origin {
                return true;
            }
            sub.tx.send(StoreEvent::Changed(blob.to_string())).is_ok()
        });
        Ok(())
    }

    fn subscribe(&mut self, id: &str) -> SyncResult<Subscription> {
        let (tx, rx) = channel();
        let sub_id = {
            let mut backend = self.reachable()?;
            let sub_id = backend.next_id();
            backend.subscribers.push(Subscriber {
                id: sub_id,
                origin: self.origin,
                doc: id.to_string(),
                tx,
            });
            sub_id
        };

        let backend = Arc::downgrade(&self.backend);
        Ok(Subscription::new(id, rx, move || {
            if let Some(backend) = backend.upgrade() {
                if let Ok(mut backend) = backend.lock() {
                    backend.subscribers.retain(|s| s.id != sub_id);
                }
            }
        }))
    }
}
