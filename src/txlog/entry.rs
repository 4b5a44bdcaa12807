//! Transaction log entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Operation kinds recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOperation {
    Create,
    Update,
    Delete,
}

impl LogOperation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A persisted transaction log entry. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub operation: LogOperation,
    pub user_id: Option<i64>,
    /// Row state before the mutation, as opaque JSON.
    pub before_image: Option<JsonValue>,
    /// Row state after the mutation, as opaque JSON.
    pub after_image: Option<JsonValue>,
    /// Set when the entry is pinned to a recovery point; pinned entries are
    /// exempt from age-based pruning.
    pub recovery_point_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Input for appending one transaction log entry.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub table_name: String,
    pub record_id: Option<i64>,
    pub operation: LogOperation,
    pub user_id: Option<i64>,
    pub before_image: Option<JsonValue>,
    pub after_image: Option<JsonValue>,
    /// Defaults to now when not supplied.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewLogEntry {
    #[must_use]
    pub fn create(table_name: impl Into<String>, record_id: Option<i64>, after: JsonValue) -> Self {
        Self {
            table_name: table_name.into(),
            record_id,
            operation: LogOperation::Create,
            user_id: None,
            before_image: None,
            after_image: Some(after),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn update(
        table_name: impl Into<String>,
        record_id: Option<i64>,
        before: JsonValue,
        after: JsonValue,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            record_id,
            operation: LogOperation::Update,
            user_id: None,
            before_image: Some(before),
            after_image: Some(after),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn delete(table_name: impl Into<String>, record_id: Option<i64>, before: JsonValue) -> Self {
        Self {
            table_name: table_name.into(),
            record_id,
            operation: LogOperation::Delete,
            user_id: None,
            before_image: Some(before),
            after_image: None,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn by_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Filters and paging for transaction log queries.
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub table_name: Option<String>,
    pub operation: Option<LogOperation>,
    pub user_id: Option<i64>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            table_name: None,
            operation: None,
            user_id: None,
            page: 1,
            page_size: 50,
        }
    }
}

/// One page of query results, newest-first.
#[derive(Debug, Serialize)]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}
