//! Fire-and-forget append queue.
//!
//! Log appends are a side effect of business mutations whose own results
//! are already determined; a slow or failing audit write must never delay
//! or fail the caller. Entries go through a bounded channel to a single
//! writer thread, and every failure path degrades to a warning.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, TrySendError, bounded};
use tracing::{debug, warn};

use super::{NewLogEntry, TransactionLogStore};

/// Bounded submit-and-forget queue in front of a [`TransactionLogStore`].
pub struct AppendQueue {
    tx: Option<Sender<NewLogEntry>>,
    handle: Option<JoinHandle<()>>,
    store: Arc<TransactionLogStore>,
}

impl AppendQueue {
    /// Start the writer thread with the given queue capacity.
    pub fn start(store: Arc<TransactionLogStore>, capacity: usize) -> Self {
        let (tx, rx) = bounded::<NewLogEntry>(capacity.max(1));
        let worker_store = Arc::clone(&store);
        let handle = std::thread::Builder::new()
            .name("rollpoint-log-writer".to_string())
            .spawn(move || {
                for entry in rx {
                    // append() already swallows storage failures
                    worker_store.append(entry);
                }
                debug!("log writer thread draining complete");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("failed to spawn log writer thread, appends fall back to inline: {err}");
                None
            }
        };

        Self {
            tx: Some(tx),
            handle,
            store,
        }
    }

    /// Submit an entry. Never blocks and never fails the caller: a full or
    /// closed queue drops the entry with a warning.
    pub fn submit(&self, entry: NewLogEntry) {
        if self.handle.is_none() {
            // No worker thread; degrade to an inline swallowed append.
            self.store.append(entry);
            return;
        }

        let Some(tx) = &self.tx else {
            warn!("append queue already closed, dropping log entry");
            return;
        };

        match tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(
                    table = %entry.table_name,
                    "append queue full, dropping log entry"
                );
            }
            Err(TrySendError::Disconnected(entry)) => {
                warn!(
                    table = %entry.table_name,
                    "append queue disconnected, dropping log entry"
                );
            }
        }
    }

    /// Close the queue and wait for queued entries to be written.
    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        // Dropping the sender ends the worker's receive loop.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("log writer thread panicked during shutdown");
            }
        }
    }
}

impl Drop for AppendQueue {
    fn drop(&mut self) {
        self.close_inner();
    }
}

impl std::fmt::Debug for AppendQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendQueue")
            .field("worker_alive", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteConnectionManager;
    use crate::txlog::LogQuery;
    use serde_json::json;

    fn queue_with_store() -> (tempfile::TempDir, Arc<TransactionLogStore>, AppendQueue) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();
        let store = Arc::new(TransactionLogStore::new(mgr));
        let queue = AppendQueue::start(Arc::clone(&store), 64);
        (dir, store, queue)
    }

    #[test]
    fn submitted_entries_land_after_close() {
        let (_dir, store, queue) = queue_with_store();

        for i in 0..10 {
            queue.submit(NewLogEntry::create("orders", Some(i), json!({"n": i})));
        }
        queue.close();

        let page = store.query(&LogQuery::default()).unwrap();
        assert_eq!(page.total, 10);
    }

    #[test]
    fn submit_never_panics_when_queue_dropped_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SqliteConnectionManager::connect(dir.path().join("store.db")).unwrap();
        let store = Arc::new(TransactionLogStore::new(mgr));

        // Capacity of one: floods will drop entries, but must stay silent.
        let queue = AppendQueue::start(Arc::clone(&store), 1);
        for i in 0..100 {
            queue.submit(NewLogEntry::create("t", Some(i), json!({})));
        }
        queue.close();

        let total = store.query(&LogQuery::default()).unwrap().total;
        assert!(total >= 1, "at least one entry should have been written");
    }
}
