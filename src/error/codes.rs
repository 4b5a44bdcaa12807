//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Recovery point errors
//! - 2xx: Backup errors
//! - 3xx: Restore errors
//! - 4xx: Config errors
//! - 8xx: Validation/lock errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `RecoveryPointNotFound` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Recovery point errors (1xx)
    // ========================================
    /// E101: Requested recovery point does not exist
    RecoveryPointNotFound,
    /// E102: Recovery point has no backup file to restore from
    NoBackupAvailable,

    // ========================================
    // Backup errors (2xx)
    // ========================================
    /// E201: Datastore file does not exist yet, nothing to snapshot
    NoDatastoreFile,
    /// E202: Backup file is gone from disk
    MissingBackupFile,
    /// E203: Recomputed digest disagrees with the one recorded at creation
    ChecksumMismatch,

    // ========================================
    // Restore errors (3xx)
    // ========================================
    /// E301: Pre-restore integrity verification failed, nothing was touched
    IntegrityCheckFailed,
    /// E302: Restore protocol failed after the pre-checks
    RestoreFailed,
    /// E303: Undoing a failed restore also failed
    RollbackFailed,
    /// E304: Datastore connection is closed
    DatastoreDisconnected,

    // ========================================
    // Config errors (4xx)
    // ========================================
    /// E401: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Validation/lock errors (8xx)
    // ========================================
    /// E801: Validation rules failed
    ValidationFailed,
    /// E802: Operation requires explicit approval
    ApprovalRequired,
    /// E851: Failed to acquire lock within timeout
    LockTimeout,
    /// E852: Failed to acquire lock
    LockFailed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: Database operation failed
    DatabaseError,
    /// E902: Serialization/deserialization failed
    SerializationError,
    /// E903: IO operation failed
    IoError,
    /// E904: Generic not found (catch-all)
    NotFound,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `RecoveryPointNotFound` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::RecoveryPointNotFound => 101,
            Self::NoBackupAvailable => 102,

            Self::NoDatastoreFile => 201,
            Self::MissingBackupFile => 202,
            Self::ChecksumMismatch => 203,

            Self::IntegrityCheckFailed => 301,
            Self::RestoreFailed => 302,
            Self::RollbackFailed => 303,
            Self::DatastoreDisconnected => 304,

            Self::ConfigInvalid => 401,

            Self::ValidationFailed => 801,
            Self::ApprovalRequired => 802,
            Self::LockTimeout => 851,
            Self::LockFailed => 852,

            Self::DatabaseError => 901,
            Self::SerializationError => 902,
            Self::IoError => 903,
            Self::NotFound => 904,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Whether the user can typically recover from this error without
    /// operator intervention.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::RecoveryPointNotFound
            | Self::NoBackupAvailable
            | Self::NoDatastoreFile
            | Self::ConfigInvalid
            | Self::ValidationFailed
            | Self::ApprovalRequired
            | Self::LockTimeout
            | Self::LockFailed
            | Self::NotFound => true,
            Self::MissingBackupFile
            | Self::ChecksumMismatch
            | Self::IntegrityCheckFailed
            | Self::RestoreFailed
            | Self::RollbackFailed
            | Self::DatastoreDisconnected
            | Self::DatabaseError
            | Self::SerializationError
            | Self::IoError => false,
        }
    }

    /// Error category (e.g., "recovery_point", "backup").
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::RecoveryPointNotFound | Self::NoBackupAvailable => "recovery_point",
            Self::NoDatastoreFile | Self::MissingBackupFile | Self::ChecksumMismatch => "backup",
            Self::IntegrityCheckFailed
            | Self::RestoreFailed
            | Self::RollbackFailed
            | Self::DatastoreDisconnected => "restore",
            Self::ConfigInvalid => "config",
            Self::ValidationFailed | Self::ApprovalRequired => "validation",
            Self::LockTimeout | Self::LockFailed => "lock",
            Self::DatabaseError | Self::SerializationError | Self::IoError | Self::NotFound => {
                "internal"
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
