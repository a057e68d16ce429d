//! Error types shared by every Proddle analytics crate.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the analysis pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is missing, unreadable or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inputs are inconsistent with each other (caller bug)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A clustering or search parameter is outside its legal range
    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// An input record is missing a required field or has an unusable value
    #[error("Malformed measurement record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal failure (worker pool, join errors)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed_record(index: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether the error stems from bad input data rather than a bad setting
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::MalformedRecord { .. } | Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
