//! Recovery point registry.
//!
//! Named point-in-time markers, each optionally anchored to a checksummed
//! backup file and to the newest log entry known at that timestamp (the
//! low-water mark). Creation is atomic: a point either carries both its
//! backup reference and checksum, or neither.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, warn};

use crate::backup::BackupManager;
use crate::error::{Result, RollpointError};
use crate::store::SqliteConnectionManager;
use crate::txlog::{self, TransactionLogStore};

const COLUMNS: &str = "id, name, description, timestamp_ms, backup_path, checksum, \
                       created_by, is_automatic, transaction_log_id";

/// A point-in-time marker usable as a restore target.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryPoint {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Present only if a backup was requested at creation time, together
    /// with `checksum`.
    pub backup_path: Option<String>,
    pub checksum: Option<String>,
    pub created_by: Option<i64>,
    pub is_automatic: bool,
    /// Low-water mark: newest log entry id at or before `timestamp` when
    /// the point was created. Advisory under concurrent writers.
    pub transaction_log_id: Option<i64>,
}

/// Input for creating a recovery point.
#[derive(Debug, Clone, Default)]
pub struct CreateRecoveryPoint {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    pub create_backup: bool,
    pub created_by: Option<i64>,
    pub is_automatic: bool,
}

/// Filters and paging for listing recovery points.
#[derive(Debug, Clone)]
pub struct RecoveryPointFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub is_automatic: Option<bool>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for RecoveryPointFilter {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            is_automatic: None,
            page: 1,
            page_size: 50,
        }
    }
}

/// One page of recovery points, newest-first.
#[derive(Debug, Serialize)]
pub struct RecoveryPointPage {
    pub points: Vec<RecoveryPoint>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Outcome of a read-only integrity verification.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub recovery_point_id: i64,
    pub valid: bool,
    pub message: String,
    pub backup_path: Option<String>,
    pub checksum: Option<String>,
}

/// Outcome of a recovery point deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub recovery_point_id: i64,
    pub backup_removed: bool,
    pub entries_unpinned: u64,
}

/// Creates, lists, verifies, and deletes recovery points.
pub struct RecoveryPointRegistry {
    mgr: Arc<SqliteConnectionManager>,
    txlog: Arc<TransactionLogStore>,
    backup: Arc<BackupManager>,
}

impl RecoveryPointRegistry {
    pub fn new(
        mgr: Arc<SqliteConnectionManager>,
        txlog: Arc<TransactionLogStore>,
        backup: Arc<BackupManager>,
    ) -> Self {
        Self { mgr, txlog, backup }
    }

    /// Create a recovery point, optionally with a backup snapshot.
    ///
    /// If the snapshot fails, no row is persisted; if persisting the row
    /// fails, the orphaned snapshot file is removed again.
    pub fn create(&self, input: CreateRecoveryPoint) -> Result<RecoveryPoint> {
        let timestamp = input.timestamp.unwrap_or_else(Utc::now);
        let low_water = self.txlog.latest_id_at(timestamp)?;

        let snapshot = if input.create_backup {
            Some(self.backup.snapshot()?)
        } else {
            None
        };
        let backup_path = snapshot
            .as_ref()
            .map(|s| s.path.display().to_string());
        let checksum = snapshot.as_ref().map(|s| s.checksum.clone());

        let inserted = self.mgr.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO recovery_points \
                 (name, description, timestamp_ms, backup_path, checksum, created_by, is_automatic, transaction_log_id) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    input.name,
                    input.description,
                    timestamp.timestamp_millis(),
                    backup_path,
                    checksum,
                    input.created_by,
                    input.is_automatic,
                    low_water,
                ],
            )?;
            let id = tx.last_insert_rowid();
            let pinned = txlog::pin_entries_up_to(&tx, timestamp.timestamp_millis(), id)?;
            tx.commit()?;
            Ok((id, pinned))
        });

        let (id, pinned) = match inserted {
            Ok(pair) => pair,
            Err(err) => {
                // Creation is all-or-nothing: don't leave an orphaned copy.
                if let Some(snapshot) = &snapshot {
                    if let Err(cleanup) = std::fs::remove_file(&snapshot.path) {
                        warn!(
                            path = %snapshot.path.display(),
                            "failed to remove orphaned snapshot: {cleanup}"
                        );
                    }
                }
                return Err(err);
            }
        };

        debug!(id, pinned, "recovery point created");
        Ok(RecoveryPoint {
            id,
            name: input.name,
            description: input.description,
            timestamp,
            backup_path,
            checksum,
            created_by: input.created_by,
            is_automatic: input.is_automatic,
            transaction_log_id: low_water,
        })
    }

    /// List recovery points, newest-first.
    pub fn list(&self, filter: &RecoveryPointFilter) -> Result<RecoveryPointPage> {
        let (where_sql, values) = build_filters(filter);
        let page = filter.page.max(1);
        let page_size = filter.page_size.max(1);
        let offset = u64::from(page - 1) * u64::from(page_size);

        self.mgr.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM recovery_points{where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let mut page_values = values.clone();
            page_values.push(Value::Integer(i64::from(page_size)));
            page_values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM recovery_points{where_sql} \
                 ORDER BY timestamp_ms DESC, id DESC LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt.query_map(params_from_iter(page_values.iter()), point_from_row)?;
            let mut points = Vec::new();
            for row in rows {
                points.push(row?);
            }

            let total = total.max(0) as u64;
            let total_pages = (total.div_ceil(u64::from(page_size))).max(1) as u32;
            Ok(RecoveryPointPage {
                points,
                total,
                page,
                page_size,
                total_pages,
            })
        })
    }

    /// Fetch a recovery point by id.
    pub fn get_by_id(&self, id: i64) -> Result<RecoveryPoint> {
        let point = self.mgr.with_conn(|conn| {
            let point = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM recovery_points WHERE id = ?"),
                    [id],
                    point_from_row,
                )
                .optional()?;
            Ok(point)
        })?;
        point.ok_or(RollpointError::RecoveryPointNotFound(id))
    }

    /// Delete a recovery point, its backup file, and its entry pins.
    pub fn delete(&self, id: i64) -> Result<DeleteReport> {
        let point = self.get_by_id(id)?;

        let unpinned = self.mgr.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute("DELETE FROM recovery_points WHERE id = ?", [id])?;
            let unpinned = txlog::unpin_entries(&tx, id)?;
            tx.commit()?;
            Ok(unpinned as u64)
        })?;

        // Backup removal is best-effort: the row is already gone, and
        // orphaned files are only ever cleaned up by explicit deletion.
        let mut backup_removed = false;
        if let Some(path) = &point.backup_path {
            match std::fs::remove_file(path) {
                Ok(()) => backup_removed = true,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path, "backup file already gone");
                }
                Err(err) => warn!(path = %path, "failed to remove backup file: {err}"),
            }
        }

        Ok(DeleteReport {
            recovery_point_id: id,
            backup_removed,
            entries_unpinned: unpinned,
        })
    }

    /// Verify a recovery point's backup against the digest recorded at
    /// creation time. Read-only; safe to call repeatedly.
    ///
    /// Fails with `RecoveryPointNotFound` / `NoBackupAvailable`; integrity
    /// problems (missing file, checksum mismatch) come back as a report
    /// with `valid: false` so diagnostics can render them.
    pub fn verify_integrity(&self, id: i64) -> Result<IntegrityReport> {
        let point = self.get_by_id(id)?;

        let (Some(backup_path), Some(checksum)) = (&point.backup_path, &point.checksum) else {
            return Err(RollpointError::NoBackupAvailable(id));
        };

        let report = match self.backup.verify(Path::new(backup_path), checksum) {
            Ok(()) => IntegrityReport {
                recovery_point_id: id,
                valid: true,
                message: "backup verified".to_string(),
                backup_path: point.backup_path.clone(),
                checksum: point.checksum.clone(),
            },
            Err(
                err @ (RollpointError::MissingBackupFile(_)
                | RollpointError::ChecksumMismatch { .. }),
            ) => IntegrityReport {
                recovery_point_id: id,
                valid: false,
                message: err.to_string(),
                backup_path: point.backup_path.clone(),
                checksum: point.checksum.clone(),
            },
            Err(err) => return Err(err),
        };

        Ok(report)
    }
}

impl std::fmt::Debug for RecoveryPointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPointRegistry").finish_non_exhaustive()
    }
}

fn build_filters(filter: &RecoveryPointFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(from) = filter.from {
        clauses.push("timestamp_ms >= ?");
        values.push(Value::Integer(from.timestamp_millis()));
    }
    if let Some(to) = filter.to {
        clauses.push("timestamp_ms <= ?");
        values.push(Value::Integer(to.timestamp_millis()));
    }
    if let Some(is_automatic) = filter.is_automatic {
        clauses.push("is_automatic = ?");
        values.push(Value::Integer(i64::from(is_automatic)));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn point_from_row(row: &Row<'_>) -> rusqlite::Result<RecoveryPoint> {
    let ts_ms: i64 = row.get(3)?;
    let timestamp = DateTime::from_timestamp_millis(ts_ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Integer,
            format!("timestamp out of range: {ts_ms}").into(),
        )
    })?;

    Ok(RecoveryPoint {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        timestamp,
        backup_path: row.get(4)?,
        checksum: row.get(5)?,
        created_by: row.get(6)?,
        is_automatic: row.get(7)?,
        transaction_log_id: row.get(8)?,
    })
}
