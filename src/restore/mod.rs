//! Point-in-time restorer.
//!
//! Orchestrates the multi-step restore protocol: pre-restore safety
//! backup, target verification, datastore disconnect, file swap,
//! reconnect, replay accounting, and a diagnostic post-restore probe.
//! Failures after the swap begins trigger a best-effort rollback from the
//! pre-restore snapshot when one was taken; rollback failures are logged,
//! never raised, and the original error is what reaches the caller.

pub mod replay;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::backup::{BackupManager, Snapshot};
use crate::error::{Result, RollpointError};
use crate::registry::RecoveryPointRegistry;
use crate::store::ConnectionManager;
use crate::txlog::TransactionLogStore;

pub use replay::{ReplayHandler, ReplayRegistry, ReplaySummary};

/// Options for one restore call.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Snapshot the current datastore before touching it. Without this
    /// there is no rollback target: a failed restore can leave the store
    /// in the post-swap state. That trade-off is the caller's to make.
    pub create_backup_before_restore: bool,
    pub user_id: Option<i64>,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            create_backup_before_restore: true,
            user_id: None,
        }
    }
}

/// Steps of the restore protocol, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestoreStep {
    PreRestoreBackup,
    Verification,
    Disconnect,
    Swap,
    Reconnect,
    Replay,
}

impl std::fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PreRestoreBackup => "pre-restore backup",
            Self::Verification => "verification",
            Self::Disconnect => "disconnect",
            Self::Swap => "swap",
            Self::Reconnect => "reconnect",
            Self::Replay => "replay",
        };
        f.write_str(label)
    }
}

/// Successful restore result.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    pub recovery_point_id: i64,
    pub attempt_id: String,
    /// Timestamp of the recovery point the store was restored to.
    pub restored_timestamp: DateTime<Utc>,
    /// Count of log entries at or before the target timestamp. Entries are
    /// only reapplied for tables with a registered replay handler.
    pub records_restored: u64,
    /// Safety snapshot taken before the restore, if requested.
    pub pre_restore_backup: Option<String>,
    /// Result of the diagnostic post-restore probe. A false value does not
    /// undo the restore; the swap has already committed.
    pub probe_passed: bool,
}

/// Drives the restore protocol against a [`ConnectionManager`].
pub struct Restorer {
    conn: Arc<dyn ConnectionManager>,
    registry: Arc<RecoveryPointRegistry>,
    txlog: Arc<TransactionLogStore>,
    backup: Arc<BackupManager>,
    replay: Arc<ReplayRegistry>,
    audit: Arc<dyn AuditSink>,
    critical_tables: Vec<String>,
}

impl Restorer {
    pub fn new(
        conn: Arc<dyn ConnectionManager>,
        registry: Arc<RecoveryPointRegistry>,
        txlog: Arc<TransactionLogStore>,
        backup: Arc<BackupManager>,
        replay: Arc<ReplayRegistry>,
        audit: Arc<dyn AuditSink>,
        critical_tables: Vec<String>,
    ) -> Self {
        Self {
            conn,
            registry,
            txlog,
            backup,
            replay,
            audit,
            critical_tables,
        }
    }

    /// Restore the datastore to a recovery point.
    ///
    /// No cancellation: once started, the protocol runs to completion,
    /// either success or failure with best-effort rollback. The caller
    /// guarantees no concurrent restore or business mutation is in flight.
    pub fn restore(&self, recovery_point_id: i64, opts: &RestoreOptions) -> Result<RestoreOutcome> {
        // Step 1: lookup. Terminal failure, no side effects yet.
        let point = self.registry.get_by_id(recovery_point_id)?;

        let attempt_id = Uuid::new_v4().to_string();
        self.audit.record(&AuditEvent::RestoreStarted {
            attempt_id: attempt_id.clone(),
            recovery_point_id,
            user_id: opts.user_id,
        });

        // Step 2: optional safety net. Its path is the rollback target for
        // the rest of the protocol.
        let pre_restore = if opts.create_backup_before_restore {
            match self.backup.snapshot_pre_restore() {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    return Err(self.fail(
                        &attempt_id,
                        recovery_point_id,
                        RestoreStep::PreRestoreBackup,
                        &err,
                        None,
                        false,
                    ));
                }
            }
        } else {
            None
        };
        let pre_restore_path = pre_restore
            .as_ref()
            .map(|s| s.path.display().to_string());

        // Step 3: target verification, before any destructive action.
        let Some(backup_path) = point.backup_path.clone() else {
            self.audit.record(&AuditEvent::RestoreFailed {
                attempt_id,
                recovery_point_id,
                error: "no backup available".to_string(),
                rolled_back: false,
            });
            return Err(RollpointError::NoBackupAvailable(recovery_point_id));
        };
        match self.registry.verify_integrity(recovery_point_id) {
            Ok(report) if report.valid => {}
            Ok(report) => {
                self.audit.record(&AuditEvent::RestoreFailed {
                    attempt_id,
                    recovery_point_id,
                    error: report.message.clone(),
                    rolled_back: false,
                });
                return Err(RollpointError::IntegrityCheckFailed {
                    reason: report.message,
                    pre_restore_backup: pre_restore_path,
                });
            }
            Err(err) => {
                return Err(self.fail(
                    &attempt_id,
                    recovery_point_id,
                    RestoreStep::Verification,
                    &err,
                    pre_restore_path,
                    false,
                ));
            }
        }

        // Steps 4-8: the destructive section. Any failure here attempts a
        // rollback when a pre-restore snapshot exists.
        match self.swap_and_replay(&point.timestamp, &backup_path) {
            Ok((records_restored, probe_passed)) => {
                self.audit.record(&AuditEvent::RestoreCompleted {
                    attempt_id: attempt_id.clone(),
                    recovery_point_id,
                    records_restored,
                    probe_passed,
                });
                info!(
                    recovery_point_id,
                    records_restored, "restore completed"
                );
                Ok(RestoreOutcome {
                    recovery_point_id,
                    attempt_id,
                    restored_timestamp: point.timestamp,
                    records_restored,
                    pre_restore_backup: pre_restore_path,
                    probe_passed,
                })
            }
            Err((step, err)) => {
                let rolled_back = match &pre_restore {
                    Some(snapshot) => match self.rollback(snapshot) {
                        Ok(()) => true,
                        Err(rollback_err) => {
                            // Never masks the primary error.
                            warn!(
                                "rollback after failed restore also failed: {}",
                                RollpointError::RollbackFailed(rollback_err.to_string())
                            );
                            false
                        }
                    },
                    None => false,
                };
                Err(self.fail(
                    &attempt_id,
                    recovery_point_id,
                    step,
                    &err,
                    pre_restore_path,
                    rolled_back,
                ))
            }
        }
    }

    /// Steps 4-8: disconnect, swap, reconnect, replay accounting, probe.
    fn swap_and_replay(
        &self,
        target_ts: &DateTime<Utc>,
        backup_path: &str,
    ) -> std::result::Result<(u64, bool), (RestoreStep, RollpointError)> {
        // Step 4: release the live handle so the file can be replaced.
        self.conn
            .disconnect()
            .map_err(|err| (RestoreStep::Disconnect, err))?;

        // Step 5: the swap commits the restore.
        let live_path = self.conn.datastore_path();
        std::fs::copy(backup_path, &live_path)
            .map_err(|err| (RestoreStep::Swap, err.into()))?;

        // Step 6: reopen.
        self.conn
            .reconnect()
            .map_err(|err| (RestoreStep::Reconnect, err))?;

        // Step 7: replay accounting over the restored log.
        let entries = self
            .txlog
            .entries_up_to(*target_ts)
            .map_err(|err| (RestoreStep::Replay, err))?;
        let summary = self
            .replay
            .apply_all(&entries)
            .map_err(|err| (RestoreStep::Replay, err))?;

        // Step 8: diagnostic only. The swap has already committed; a probe
        // failure is logged, not raised.
        let probe_passed = match self.conn.probe(&self.critical_tables) {
            Ok(()) => true,
            Err(err) => {
                warn!("post-restore consistency probe failed: {err}");
                false
            }
        };

        Ok((summary.considered, probe_passed))
    }

    /// Copy the pre-restore snapshot back over the live file.
    fn rollback(&self, pre_restore: &Snapshot) -> Result<()> {
        self.conn.disconnect()?;
        std::fs::copy(&pre_restore.path, self.conn.datastore_path())?;
        self.conn.reconnect()?;
        info!(
            path = %pre_restore.path.display(),
            "restored pre-restore snapshot after failed restore"
        );
        Ok(())
    }

    fn fail(
        &self,
        attempt_id: &str,
        recovery_point_id: i64,
        step: RestoreStep,
        err: &RollpointError,
        pre_restore_backup: Option<String>,
        rolled_back: bool,
    ) -> RollpointError {
        self.audit.record(&AuditEvent::RestoreFailed {
            attempt_id: attempt_id.to_string(),
            recovery_point_id,
            error: err.to_string(),
            rolled_back,
        });
        RollpointError::RestoreFailed {
            step: step.to_string(),
            reason: err.to_string(),
            pre_restore_backup,
            rolled_back,
        }
    }
}

impl std::fmt::Debug for Restorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Restorer")
            .field("critical_tables", &self.critical_tables)
            .finish_non_exhaustive()
    }
}
