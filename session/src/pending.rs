//! Outstanding-write tracking for optimistic mutations.
//!
//! Every optimistic mutation registers here before its store write is
//! issued. A write that settles successfully is acknowledged and dropped; a
//! write that fails stays behind, marked dirty, with enough of the merge
//! payload to be re-issued later. This makes in-memory/store divergence
//! observable instead of silent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Identifies the stored entity a write targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub collection: String,
    pub record_id: String,
}

/// State of a tracked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// Issued, not yet settled.
    InFlight,
    /// Settled with an error; the entity is dirty.
    Failed,
}

#[derive(Debug, Clone)]
struct Entry {
    key: EntityKey,
    patch: serde_json::Value,
    state: WriteState,
}

/// The pending-write ledger.
#[derive(Debug, Default)]
pub struct PendingWrites {
    entries: Mutex<HashMap<u64, Entry>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_ticket: AtomicU64,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a write about to be issued. Returns the ticket the write
    /// task settles with.
    pub async fn register(
        &self,
        collection: &str,
        record_id: &str,
        patch: serde_json::Value,
    ) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            key: EntityKey {
                collection: collection.to_string(),
                record_id: record_id.to_string(),
            },
            patch,
            state: WriteState::InFlight,
        };
        self.entries.lock().await.insert(ticket, entry);
        ticket
    }

    /// Track the spawned write task so `flush` can await it.
    pub async fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().await.push(handle);
    }

    /// Acknowledge a successful write: the entry is dropped.
    pub async fn settle_ok(&self, ticket: u64) {
        self.entries.lock().await.remove(&ticket);
    }

    /// Record a failed write: the entry stays, marked dirty.
    pub async fn settle_failed(&self, ticket: u64) {
        if let Some(entry) = self.entries.lock().await.get_mut(&ticket) {
            entry.state = WriteState::Failed;
        }
    }

    /// Drop a settled entry (used after a successful retry).
    pub async fn remove(&self, ticket: u64) {
        self.entries.lock().await.remove(&ticket);
    }

    /// Await every outstanding write task.
    pub async fn flush(&self) {
        let handles: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            // A panicked write task settles nothing; the entry simply
            // stays in-flight, which flush callers treat as unresolved.
            let _ = handle.await;
        }
    }

    /// Entity keys whose last write failed.
    pub async fn dirty(&self) -> Vec<EntityKey> {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.state == WriteState::Failed)
            .map(|e| e.key.clone())
            .collect()
    }

    /// Failed entries with their recorded merge payloads, for retry.
    pub async fn failed_entries(&self) -> Vec<(u64, EntityKey, serde_json::Value)> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, e)| e.state == WriteState::Failed)
            .map(|(ticket, e)| (*ticket, e.key.clone(), e.patch.clone()))
            .collect()
    }

    /// True when nothing is tracked: no in-flight writes, no dirty entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
