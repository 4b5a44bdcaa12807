//! Fire-and-forget audit/notification collaborator.
//!
//! Operator-visibility events (restore attempts and outcomes, point
//! lifecycle, pruning) flow through [`AuditSink::record`]. The contract is
//! one-way: implementations swallow their own failures, and [`swallow`] is
//! the wrapper every never-throws call site uses for fallible work whose
//! failure must not reach the caller.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;

/// Events recorded for operator visibility.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    RecoveryPointCreated {
        recovery_point_id: i64,
        automatic: bool,
        with_backup: bool,
        user_id: Option<i64>,
    },
    RecoveryPointDeleted {
        recovery_point_id: i64,
        backup_removed: bool,
    },
    RestoreStarted {
        attempt_id: String,
        recovery_point_id: i64,
        user_id: Option<i64>,
    },
    RestoreCompleted {
        attempt_id: String,
        recovery_point_id: i64,
        records_restored: u64,
        probe_passed: bool,
    },
    RestoreFailed {
        attempt_id: String,
        recovery_point_id: i64,
        error: String,
        rolled_back: bool,
    },
    LogPruned {
        deleted: u64,
        older_than_days: u32,
    },
}

/// Sink for audit events.
///
/// `record` is infallible by signature: implementations must not panic and
/// must swallow their own failures. A broken audit channel never makes a
/// user-visible operation fail.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Default sink: events go to the structured log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(json) => info!(target: "rollpoint::audit", event = %json),
            Err(err) => warn!("failed to serialize audit event: {err}"),
        }
    }
}

/// Sink that discards everything. Useful for embedding contexts that wire
/// their own notification channel later.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Run-and-forget wrapper: log the error, keep going.
///
/// Used at every call site whose failure must never propagate to the
/// caller (log appends, audit notifications, cleanup of orphaned files).
pub fn swallow<T>(context: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{context}: {err}");
            None
        }
    }
}
