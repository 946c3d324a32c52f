//! Error types for StickLLM
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for StickLLM operations
///
/// Components raise these values at their boundaries so that the chat
/// controller never sees transport- or database-native error types.
#[derive(Error, Debug)]
pub enum StickllmError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Conversation storage errors (database unreachable or unwritable)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A session id that has no row in the store
    #[error("Session {0} not found")]
    SessionNotFound(i64),

    /// Completion server errors (connection, status, malformed body)
    #[error("Network error: {0}")]
    Network(String),

    /// Mistakes in interactive input (missing file, empty name, ...)
    #[error("{0}")]
    UserInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<rusqlite::Error> for StickllmError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for StickllmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl StickllmError {
    /// Returns true when `err` wraps a [`StickllmError::SessionNotFound`]
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<StickllmError>(),
            Some(StickllmError::SessionNotFound(_))
        )
    }
}

/// Result type alias for StickLLM operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
