// src/error.rs

//! Error types shared by every library component
//!
//! Internal code propagates [`Error`] with `?`. Public operations convert
//! the final `Result` into an [`Outcome`], the uniform
//! `{ success, ..., message }` shape handed back to whatever adapter
//! invoked the operation.

use serde::Serialize;
use thiserror::Error;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning, merging, converting or moving images
#[derive(Error, Debug)]
pub enum Error {
    /// A required external tool or template is missing
    #[error("{0}")]
    ConfigError(String),

    /// An expected file or catalog entry is absent
    #[error("{0}")]
    NotFoundError(String),

    /// An external tool exited unsuccessfully
    #[error("{message}")]
    SubprocessError {
        program: String,
        code: Option<i32>,
        message: String,
    },

    /// Filesystem failure with added context
    #[error("{0}")]
    IoError(String),

    /// Raw filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A sheet had no usable FILE entries
    #[error("{0}")]
    ParseError(String),

    /// An HTTP fetch failed or returned a non-success status
    #[error("{0}")]
    DownloadError(String),
}

impl Error {
    /// Whether this error came from a missing tool or template
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}

/// Uniform operation result handed back to callers
///
/// Serialises as `{"success": true, <value fields>}` or
/// `{"success": false, "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            message: Some(message.into()),
        }
    }

    /// Convert back into a `Result`, turning failures into an error string
    pub fn into_result(self) -> std::result::Result<T, String> {
        match (self.success, self.value) {
            (true, Some(value)) => Ok(value),
            _ => Err(self.message.unwrap_or_else(|| "operation failed".to_string())),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
