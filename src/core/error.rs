//! Unified error handling for the data layer
//!
//! Every failure that can reach a caller is one of these variants. Data
//! services never hand them out directly: they end up as the message of a
//! failed `RemoteData`.

use std::fmt;

/// Unified error types for the data layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Configuration-related errors
    Configuration(String),

    /// The request never produced an HTTP response
    Network(String),

    /// Non-2xx response from the backend
    Server { status: u16, message: String },

    /// 404 from the backend
    NotFound(String),

    /// Client-side validation failures
    Validation(String),

    /// Response body could not be decoded into the expected type
    Decode(String),

    /// Operation exists on the service but is not supported
    Unsupported(String),

    /// Internal errors
    Internal(String),
}

impl DataError {
    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            DataError::Server { status, .. } => Some(*status),
            DataError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Map a non-2xx status and its body to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 404 {
            DataError::NotFound(message)
        } else {
            DataError::Server { status, message }
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            DataError::Network(msg) => write!(f, "Network error: {msg}"),
            DataError::Server { status, message } => {
                write!(f, "Server error ({status}): {message}")
            }
            DataError::NotFound(msg) => write!(f, "Resource not found: {msg}"),
            DataError::Validation(msg) => write!(f, "Validation error: {msg}"),
            DataError::Decode(msg) => write!(f, "Decode error: {msg}"),
            DataError::Unsupported(msg) => write!(f, "Unsupported operation: {msg}"),
            DataError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for DataError {
    fn from(err: validator::ValidationErrors) -> Self {
        DataError::Validation(err.to_string())
    }
}

/// Result type alias for data layer operations
pub type DataResult<T> = std::result::Result<T, DataError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> DataResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> DataResult<T> {
        self.map_err(|e| DataError::Internal(format!("{context}: {e}")))
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::DataError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::DataError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::core::DataError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::DataError::Internal(format!($fmt, $($arg)*))
    };
}
