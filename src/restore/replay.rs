//! Pluggable per-table replay.
//!
//! A generic implementation cannot know how to apply arbitrary before/after
//! images without schema-specific logic, so replay is a registered-handler
//! map keyed by table name. Entries for tables without a handler are
//! counted but not reapplied; the base snapshot is the source of truth for
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::txlog::LogEntry;

/// Schema-specific strategy for reapplying logged mutations to one table.
pub trait ReplayHandler: Send + Sync {
    fn apply(&self, entry: &LogEntry) -> Result<()>;
}

impl<F> ReplayHandler for F
where
    F: Fn(&LogEntry) -> Result<()> + Send + Sync,
{
    fn apply(&self, entry: &LogEntry) -> Result<()> {
        self(entry)
    }
}

/// Accounting for one replay pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReplaySummary {
    /// Entries in range, regardless of handler coverage. This is what
    /// `records_restored` reports.
    pub considered: u64,
    /// Entries actually handed to a registered handler.
    pub applied: u64,
}

/// Handler map keyed by table name.
#[derive(Default)]
pub struct ReplayRegistry {
    handlers: HashMap<String, Arc<dyn ReplayHandler>>,
}

impl ReplayRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, table: impl Into<String>, handler: Arc<dyn ReplayHandler>) {
        self.handlers.insert(table.into(), handler);
    }

    #[must_use]
    pub fn has_handler(&self, table: &str) -> bool {
        self.handlers.contains_key(table)
    }

    /// Run the ordered entry list through the registered handlers.
    ///
    /// A handler error aborts the pass and propagates; entries without a
    /// handler are counted only.
    pub fn apply_all(&self, entries: &[LogEntry]) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary {
            considered: entries.len() as u64,
            applied: 0,
        };

        for entry in entries {
            if let Some(handler) = self.handlers.get(&entry.table_name) {
                handler.apply(entry)?;
                summary.applied += 1;
            }
        }

        debug!(
            considered = summary.considered,
            applied = summary.applied,
            "replay pass complete"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for ReplayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayRegistry")
            .field("tables", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
