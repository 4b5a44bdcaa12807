//! Error handling for rollpoint.
//!
//! This module provides:
//! - [`RollpointError`]: The main error enum for all recovery operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//!
//! Propagation policy: backup and restore failures surface to the caller
//! with a human-readable message and the path of any safety backup that was
//! made; audit failures are swallowed and only observed through logging.

mod codes;

use std::io;

use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for rollpoint operations.
#[derive(Error, Debug)]
pub enum RollpointError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Recovery point not found: {0}")]
    RecoveryPointNotFound(i64),

    #[error("Datastore file does not exist: {0}")]
    NoDatastoreFile(String),

    #[error("Backup file missing: {0}")]
    MissingBackupFile(String),

    #[error("Checksum mismatch for {path}: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Recovery point {0} has no backup file to restore from")]
    NoBackupAvailable(i64),

    #[error("Integrity check failed before restore: {reason}")]
    IntegrityCheckFailed {
        reason: String,
        /// Pre-restore safety backup, if one was taken before the abort.
        pre_restore_backup: Option<String>,
    },

    #[error("Restore failed during {step}: {reason}")]
    RestoreFailed {
        step: String,
        reason: String,
        pre_restore_backup: Option<String>,
        rolled_back: bool,
    },

    #[error("Rollback failed: {0}")]
    RollbackFailed(String),

    #[error("Datastore is disconnected")]
    DatastoreDisconnected,

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Lock failed: {0}")]
    LockFailed(String),

    #[error("Operation requires approval: {0}")]
    ApprovalRequired(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl RollpointError {
    /// Get the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::RecoveryPointNotFound(_) => ErrorCode::RecoveryPointNotFound,
            Self::NoDatastoreFile(_) => ErrorCode::NoDatastoreFile,
            Self::MissingBackupFile(_) => ErrorCode::MissingBackupFile,
            Self::ChecksumMismatch { .. } => ErrorCode::ChecksumMismatch,
            Self::NoBackupAvailable(_) => ErrorCode::NoBackupAvailable,
            Self::IntegrityCheckFailed { .. } => ErrorCode::IntegrityCheckFailed,
            Self::RestoreFailed { .. } => ErrorCode::RestoreFailed,
            Self::RollbackFailed(_) => ErrorCode::RollbackFailed,
            Self::DatastoreDisconnected => ErrorCode::DatastoreDisconnected,
            Self::LockTimeout(_) => ErrorCode::LockTimeout,
            Self::LockFailed(_) => ErrorCode::LockFailed,
            Self::ApprovalRequired(_) => ErrorCode::ApprovalRequired,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Path of the pre-restore safety backup attached to this error, if any.
    ///
    /// Restore failures carry the path so an operator can recover manually
    /// even when automated rollback also failed.
    #[must_use]
    pub fn pre_restore_backup(&self) -> Option<&str> {
        match self {
            Self::IntegrityCheckFailed {
                pre_restore_backup, ..
            }
            | Self::RestoreFailed {
                pre_restore_backup, ..
            } => pre_restore_backup.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias using RollpointError.
pub type Result<T> = std::result::Result<T, RollpointError>;
