use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the Kvora consensus service
#[derive(Debug)]
pub enum KvoraError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Consensus state machine errors
    Consensus(String),

    /// Transport layer errors
    Transport(String),

    /// API/HTTP related errors
    Api(String),

    /// Serialization/deserialization errors
    Serialization(serde_json::Error),

    /// System I/O errors
    Io(std::io::Error),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),
}

impl fmt::Display for KvoraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvoraError::Config(msg) => write!(f, "Configuration error: {}", msg),
            KvoraError::Consensus(msg) => write!(f, "Consensus error: {}", msg),
            KvoraError::Transport(msg) => write!(f, "Transport error: {}", msg),
            KvoraError::Api(msg) => write!(f, "API error: {}", msg),
            KvoraError::Serialization(err) => write!(f, "Serialization error: {}", err),
            KvoraError::Io(err) => write!(f, "I/O error: {}", err),
            KvoraError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl std::error::Error for KvoraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KvoraError::Io(err) => Some(err),
            KvoraError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, KvoraError>;

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for KvoraError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl KvoraError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            KvoraError::Config(_) => StatusCode::BAD_REQUEST,
            KvoraError::Consensus(_) => StatusCode::CONFLICT,
            KvoraError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KvoraError::Api(_) => StatusCode::BAD_REQUEST,
            KvoraError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KvoraError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KvoraError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            KvoraError::Config(_) => "configuration_error",
            KvoraError::Consensus(_) => "consensus_error",
            KvoraError::Transport(_) => "transport_error",
            KvoraError::Api(_) => "api_error",
            KvoraError::Serialization(_) => "serialization_error",
            KvoraError::Io(_) => "io_error",
            KvoraError::Concurrency(_) => "concurrency_error",
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for KvoraError {
    fn from(err: std::io::Error) -> Self {
        KvoraError::Io(err)
    }
}

impl From<serde_json::Error> for KvoraError {
    fn from(err: serde_json::Error) -> Self {
        KvoraError::Serialization(err)
    }
}

impl<T> From<std::sync::PoisonError<T>> for KvoraError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        KvoraError::Concurrency(format!("Engine lock poisoned: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::KvoraError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::KvoraError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::KvoraError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::KvoraError::Transport(format!($fmt, $($arg)*))
    };
}
