//! Uniform operation envelope.
//!
//! Every operation exposed to the boundary layer returns
//! `{success, data | error}` instead of raising across it, so transports
//! can render user-facing messages without catching anything.

use serde::Serialize;

use crate::error::{ErrorCode, RollpointError};

/// Result envelope for boundary-crossing operations.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Structured error payload inside an envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub numeric_code: u16,
    pub message: String,
    pub category: &'static str,
    pub recoverable: bool,
    /// Path of the pre-restore safety backup, when the failed operation
    /// made one; lets an operator recover manually.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_restore_backup: Option<String>,
}

impl ErrorBody {
    #[must_use]
    pub fn from_error(err: &RollpointError) -> Self {
        let code = err.code();
        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            category: code.category(),
            recoverable: code.is_recoverable(),
            pre_restore_backup: err.pre_restore_backup().map(ToString::to_string),
        }
    }
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn err(err: &RollpointError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from_error(err)),
        }
    }

    #[must_use]
    pub fn from_result(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}
