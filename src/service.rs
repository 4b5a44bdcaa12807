//! Recovery service facade.
//!
//! Wires the log store, backup manager, registry, and restorer together
//! and exposes the boundary surface: every operation returns an
//! [`Envelope`] instead of raising, and log appends are fire-and-forget.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::api::Envelope;
use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::backup::BackupManager;
use crate::config::Config;
use crate::error::Result;
use crate::registry::{
    CreateRecoveryPoint, DeleteReport, IntegrityReport, RecoveryPoint, RecoveryPointFilter,
    RecoveryPointPage, RecoveryPointRegistry,
};
use crate::restore::{ReplayRegistry, RestoreOptions, RestoreOutcome, Restorer};
use crate::store::{ConnectionManager, SqliteConnectionManager};
use crate::txlog::{AppendQueue, LogPage, LogQuery, NewLogEntry, TransactionLogStore};

/// Result of a log pruning pass.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PruneReport {
    pub deleted: u64,
    pub older_than_days: u32,
}

/// The embedded recovery subsystem, fully wired.
pub struct RecoveryService {
    root: PathBuf,
    mgr: Arc<SqliteConnectionManager>,
    txlog: Arc<TransactionLogStore>,
    registry: Arc<RecoveryPointRegistry>,
    restorer: Restorer,
    queue: AppendQueue,
    audit: Arc<dyn AuditSink>,
    retention_days: u32,
}

impl RecoveryService {
    /// Open the subsystem under `root` with default audit and replay wiring.
    pub fn open(root: &Path, config: &Config) -> Result<Self> {
        Self::open_with(root, config, Arc::new(TracingAuditSink), ReplayRegistry::new())
    }

    /// Open with a custom audit sink and replay handler registry.
    pub fn open_with(
        root: &Path,
        config: &Config,
        audit: Arc<dyn AuditSink>,
        replay: ReplayRegistry,
    ) -> Result<Self> {
        std::fs::create_dir_all(root)?;

        let mgr = SqliteConnectionManager::connect(root.join(&config.datastore.file_name))?;
        let txlog = Arc::new(TransactionLogStore::new(Arc::clone(&mgr)));
        let backup = Arc::new(BackupManager::from_config(root, config));
        let registry = Arc::new(RecoveryPointRegistry::new(
            Arc::clone(&mgr),
            Arc::clone(&txlog),
            Arc::clone(&backup),
        ));
        let conn: Arc<dyn ConnectionManager> = mgr.clone();
        let restorer = Restorer::new(
            conn,
            Arc::clone(&registry),
            Arc::clone(&txlog),
            backup,
            Arc::new(replay),
            Arc::clone(&audit),
            config.restore.critical_tables.clone(),
        );
        let queue = AppendQueue::start(Arc::clone(&txlog), config.log_queue.capacity);

        info!(root = %root.display(), "recovery service opened");
        Ok(Self {
            root: root.to_path_buf(),
            mgr,
            txlog,
            registry,
            restorer,
            queue,
            audit,
            retention_days: config.retention.log_days,
        })
    }

    // -------------------------------------------------------------------------
    // Transaction log surface
    // -------------------------------------------------------------------------

    /// Fire-and-forget append: scheduled onto the writer thread after the
    /// triggering operation's own result is already determined.
    pub fn append(&self, entry: NewLogEntry) {
        self.queue.submit(entry);
    }

    /// Fire-and-forget batch append, deduplicated at the storage layer.
    pub fn append_batch(&self, entries: Vec<NewLogEntry>) {
        self.txlog.append_batch(entries);
    }

    pub fn query_log(&self, query: &LogQuery) -> Envelope<LogPage> {
        Envelope::from_result(self.txlog.query(query))
    }

    /// Prune unpinned entries older than `days` (default: configured
    /// retention).
    pub fn prune_log(&self, days: Option<u32>) -> Envelope<PruneReport> {
        let older_than_days = days.unwrap_or(self.retention_days);
        let result = self
            .txlog
            .prune_older_than(older_than_days)
            .map(|deleted| {
                self.audit.record(&AuditEvent::LogPruned {
                    deleted,
                    older_than_days,
                });
                PruneReport {
                    deleted,
                    older_than_days,
                }
            });
        Envelope::from_result(result)
    }

    // -------------------------------------------------------------------------
    // Recovery point surface
    // -------------------------------------------------------------------------

    pub fn create_recovery_point(&self, input: CreateRecoveryPoint) -> Envelope<RecoveryPoint> {
        let result = self.registry.create(input).inspect(|point| {
            self.audit.record(&AuditEvent::RecoveryPointCreated {
                recovery_point_id: point.id,
                automatic: point.is_automatic,
                with_backup: point.backup_path.is_some(),
                user_id: point.created_by,
            });
        });
        Envelope::from_result(result)
    }

    pub fn list_recovery_points(&self, filter: &RecoveryPointFilter) -> Envelope<RecoveryPointPage> {
        Envelope::from_result(self.registry.list(filter))
    }

    pub fn get_recovery_point(&self, id: i64) -> Envelope<RecoveryPoint> {
        Envelope::from_result(self.registry.get_by_id(id))
    }

    pub fn delete_recovery_point(&self, id: i64) -> Envelope<DeleteReport> {
        let result = self.registry.delete(id).inspect(|report| {
            self.audit.record(&AuditEvent::RecoveryPointDeleted {
                recovery_point_id: report.recovery_point_id,
                backup_removed: report.backup_removed,
            });
        });
        Envelope::from_result(result)
    }

    pub fn verify_recovery_point(&self, id: i64) -> Envelope<IntegrityReport> {
        Envelope::from_result(self.registry.verify_integrity(id))
    }

    // -------------------------------------------------------------------------
    // Restore surface
    // -------------------------------------------------------------------------

    /// Restore to a recovery point. The caller must guarantee exclusion:
    /// no concurrent restore and no business mutation during the
    /// disconnect-swap-reconnect window.
    pub fn restore(&self, recovery_point_id: i64, opts: &RestoreOptions) -> Envelope<RestoreOutcome> {
        Envelope::from_result(self.restorer.restore(recovery_point_id, opts))
    }

    // -------------------------------------------------------------------------
    // Direct component access for embedding applications
    // -------------------------------------------------------------------------

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transaction_log(&self) -> &Arc<TransactionLogStore> {
        &self.txlog
    }

    pub fn registry(&self) -> &Arc<RecoveryPointRegistry> {
        &self.registry
    }

    pub fn connection(&self) -> &Arc<SqliteConnectionManager> {
        &self.mgr
    }

    /// Drain the append queue and shut down. Dropping the service does the
    /// same; this form makes the flush explicit.
    pub fn shutdown(self) {
        self.queue.close();
    }
}

impl std::fmt::Debug for RecoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryService")
            .field("root", &self.root)
            .field("retention_days", &self.retention_days)
            .finish_non_exhaustive()
    }
}
