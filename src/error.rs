//! Error types for walgen
//!
//! Provides a unified error type for all log generator operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for walgen operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    /// The record cannot fit even into an empty buffer.
    #[error("Log too large: {size} bytes (limit {limit})")]
    LogTooLarge { size: usize, limit: usize },

    /// The current buffer is full; switch the log and retry.
    #[error("Buffer not enough: need {needed} bytes, {available} available")]
    BufferNotEnough { needed: usize, available: usize },

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    /// Cursor or entry state is inconsistent; the generator must not be reused.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Log corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WalError {
    /// True for the one failure a caller recovers from by rotating the log
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalError::BufferNotEnough { .. })
    }

    /// True when the generator instance should be considered broken
    pub fn is_fatal(&self) -> bool {
        matches!(self, WalError::Unexpected(_) | WalError::Corruption(_))
    }
}

impl From<bincode::Error> for WalError {
    fn from(e: bincode::Error) -> Self {
        WalError::Serialization(e.to_string())
    }
}
