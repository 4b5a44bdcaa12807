//! Append-only transaction log store.
//!
//! Every mutating operation in the surrounding application lands here as a
//! log entry. Appends never fail the caller: the fallible path is
//! [`TransactionLogStore::record`], and the public `append*` methods wrap it
//! in the swallow-and-warn contract the audit trail requires.

pub mod entry;
pub mod queue;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::debug;

use crate::audit::swallow;
use crate::error::Result;
use crate::store::SqliteConnectionManager;

pub use entry::{LogEntry, LogOperation, LogPage, LogQuery, NewLogEntry};
pub use queue::AppendQueue;

const COLUMNS: &str = "id, table_name, record_id, operation, user_id, \
                       before_image, after_image, recovery_point_id, timestamp_ms";

/// Store for the append-only transaction log.
///
/// Owns the `transaction_log` table exclusively: rows are appended and
/// eventually pruned, never updated (pinning aside).
#[derive(Debug, Clone)]
pub struct TransactionLogStore {
    mgr: Arc<SqliteConnectionManager>,
}

impl TransactionLogStore {
    pub fn new(mgr: Arc<SqliteConnectionManager>) -> Self {
        Self { mgr }
    }

    /// Persist one entry, returning the stored row.
    ///
    /// Idempotent: re-submitting the same logical mutation returns the
    /// already-stored entry instead of duplicating it.
    pub fn record(&self, entry: NewLogEntry) -> Result<LogEntry> {
        let timestamp = entry.timestamp.unwrap_or_else(Utc::now);
        let ts_ms = timestamp.timestamp_millis();
        let before = json_text(entry.before_image.as_ref())?;
        let after = json_text(entry.after_image.as_ref())?;

        self.mgr.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO transaction_log \
                 (table_name, record_id, operation, user_id, before_image, after_image, timestamp_ms) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    entry.table_name,
                    entry.record_id,
                    entry.operation.as_str(),
                    entry.user_id,
                    before,
                    after,
                    ts_ms,
                ],
            )?;

            let id = if inserted > 0 {
                conn.last_insert_rowid()
            } else {
                // Duplicate suppressed by the dedup index; hand back the
                // row that already represents this mutation.
                conn.query_row(
                    "SELECT id FROM transaction_log \
                     WHERE table_name = ? AND record_id IS ? AND operation = ? AND timestamp_ms = ?",
                    params![entry.table_name, entry.record_id, entry.operation.as_str(), ts_ms],
                    |row| row.get(0),
                )?
            };

            Ok(LogEntry {
                id,
                table_name: entry.table_name.clone(),
                record_id: entry.record_id,
                operation: entry.operation,
                user_id: entry.user_id,
                before_image: entry.before_image.clone(),
                after_image: entry.after_image.clone(),
                recovery_point_id: None,
                timestamp,
            })
        })
    }

    /// Persist many entries in one transaction; duplicates are suppressed.
    /// Returns the number of rows actually inserted.
    pub fn record_batch(&self, entries: &[NewLogEntry]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        self.mgr.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut inserted = 0u64;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO transaction_log \
                     (table_name, record_id, operation, user_id, before_image, after_image, timestamp_ms) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )?;
                for entry in entries {
                    let timestamp = entry.timestamp.unwrap_or_else(Utc::now);
                    let before = json_text(entry.before_image.as_ref())?;
                    let after = json_text(entry.after_image.as_ref())?;
                    inserted += stmt.execute(params![
                        entry.table_name,
                        entry.record_id,
                        entry.operation.as_str(),
                        entry.user_id,
                        before,
                        after,
                        timestamp.timestamp_millis(),
                    ])? as u64;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    /// Append one entry, swallowing failures.
    ///
    /// The invoking business operation must never fail because an
    /// audit-trail write failed; failures surface only through logging.
    pub fn append(&self, entry: NewLogEntry) {
        let table = entry.table_name.clone();
        swallow(
            &format!("transaction log append for table {table}"),
            self.record(entry),
        );
    }

    /// Append many entries, swallowing failures. Same contract as `append`.
    pub fn append_batch(&self, entries: Vec<NewLogEntry>) {
        swallow("transaction log batch append", self.record_batch(&entries));
    }

    /// Query a page of entries, newest-first, with total count metadata.
    pub fn query(&self, query: &LogQuery) -> Result<LogPage> {
        let (where_sql, values) = build_filters(query);
        let page = query.page.max(1);
        let page_size = query.page_size.max(1);
        let offset = u64::from(page - 1) * u64::from(page_size);

        self.mgr.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM transaction_log{where_sql}"),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )?;

            let mut page_values = values.clone();
            page_values.push(Value::Integer(i64::from(page_size)));
            page_values.push(Value::Integer(offset as i64));

            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM transaction_log{where_sql} \
                 ORDER BY timestamp_ms DESC, id DESC LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt.query_map(params_from_iter(page_values.iter()), entry_from_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }

            let total = total.max(0) as u64;
            let total_pages = (total.div_ceil(u64::from(page_size))).max(1) as u32;
            Ok(LogPage {
                entries,
                total,
                page,
                page_size,
                total_pages,
            })
        })
    }

    /// All entries with `timestamp <= ts`, oldest-first.
    ///
    /// This is the ordering replay depends on: for any `t' >= t`, the
    /// result for `t` is a prefix of the result for `t'`.
    pub fn entries_up_to(&self, ts: DateTime<Utc>) -> Result<Vec<LogEntry>> {
        self.range_query("timestamp_ms <= ?", ts)
    }

    /// All entries with `timestamp > ts`, oldest-first.
    pub fn entries_after(&self, ts: DateTime<Utc>) -> Result<Vec<LogEntry>> {
        self.range_query("timestamp_ms > ?", ts)
    }

    fn range_query(&self, clause: &str, ts: DateTime<Utc>) -> Result<Vec<LogEntry>> {
        self.mgr.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM transaction_log WHERE {clause} \
                 ORDER BY timestamp_ms ASC, id ASC"
            ))?;
            let rows = stmt.query_map([ts.timestamp_millis()], entry_from_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
    }

    /// Id of the newest entry with `timestamp <= ts`, if any — the
    /// low-water mark a recovery point caches at creation.
    pub fn latest_id_at(&self, ts: DateTime<Utc>) -> Result<Option<i64>> {
        self.mgr.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM transaction_log WHERE timestamp_ms <= ? \
                     ORDER BY timestamp_ms DESC, id DESC LIMIT 1",
                    [ts.timestamp_millis()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Delete entries older than `now - days`, except entries pinned to a
    /// recovery point. Returns the number deleted.
    pub fn prune_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = (Utc::now() - Duration::days(i64::from(days))).timestamp_millis();
        let deleted = self.mgr.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM transaction_log \
                 WHERE timestamp_ms < ? AND recovery_point_id IS NULL",
                [cutoff],
            )?;
            Ok(deleted as u64)
        })?;
        debug!(deleted, days, "pruned transaction log");
        Ok(deleted)
    }
}

/// Pin every not-yet-pinned entry at or before `ts_ms` to a recovery point.
/// Runs inside the registry's creation transaction.
pub(crate) fn pin_entries_up_to(
    conn: &Connection,
    ts_ms: i64,
    recovery_point_id: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE transaction_log SET recovery_point_id = ? \
         WHERE timestamp_ms <= ? AND recovery_point_id IS NULL",
        params![recovery_point_id, ts_ms],
    )
}

/// Release the entries pinned to a recovery point (on point deletion), so
/// retention can reclaim them again.
pub(crate) fn unpin_entries(conn: &Connection, recovery_point_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE transaction_log SET recovery_point_id = NULL WHERE recovery_point_id = ?",
        [recovery_point_id],
    )
}

fn build_filters(query: &LogQuery) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(from) = query.from {
        clauses.push("timestamp_ms >= ?");
        values.push(Value::Integer(from.timestamp_millis()));
    }
    if let Some(to) = query.to {
        clauses.push("timestamp_ms <= ?");
        values.push(Value::Integer(to.timestamp_millis()));
    }
    if let Some(table) = &query.table_name {
        clauses.push("table_name = ?");
        values.push(Value::Text(table.clone()));
    }
    if let Some(operation) = query.operation {
        clauses.push("operation = ?");
        values.push(Value::Text(operation.as_str().to_string()));
    }
    if let Some(user_id) = query.user_id {
        clauses.push("user_id = ?");
        values.push(Value::Integer(user_id));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

fn json_text(value: Option<&serde_json::Value>) -> Result<Option<String>> {
    value
        .map(|v| serde_json::to_string(v).map_err(Into::into))
        .transpose()
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    let operation_raw: String = row.get(3)?;
    let operation = LogOperation::parse(&operation_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown operation {operation_raw}").into(),
        )
    })?;
    let ts_ms: i64 = row.get(8)?;
    let timestamp = DateTime::from_timestamp_millis(ts_ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            Type::Integer,
            format!("timestamp out of range: {ts_ms}").into(),
        )
    })?;

    Ok(LogEntry {
        id: row.get(0)?,
        table_name: row.get(1)?,
        record_id: row.get(2)?,
        operation,
        user_id: row.get(4)?,
        before_image: parse_image(row, 5)?,
        after_image: parse_image(row, 6)?,
        recovery_point_id: row.get(7)?,
        timestamp,
    })
}

fn parse_image(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
    })
    .transpose()
}
