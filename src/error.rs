//! Error types for linkrelay
//!
//! Provides a unified error type for client, server and daemon operations.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type for linkrelay operations
#[derive(Debug, Error)]
pub enum RelayError {
    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection to {endpoint} failed: {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Exchange timed out after {0:?}")]
    Timeout(Duration),

    #[error("Exchange cancelled")]
    Cancelled,

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    // -------------------------------------------------------------------------
    // Server-side Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Handler error: {0}")]
    Handler(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`RelayError`], as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCommand,
    ConnectionFailed,
    Timeout,
    Io,
    Cancelled,
    Protocol,
    Handler,
    Config,
}

impl RelayError {
    /// Which step of an exchange failed
    ///
    /// An oversized response counts as an I/O failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::InvalidCommand(_) => ErrorKind::InvalidCommand,
            RelayError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            RelayError::Timeout(_) => ErrorKind::Timeout,
            RelayError::Cancelled => ErrorKind::Cancelled,
            RelayError::Io(_) | RelayError::ResponseTooLarge { .. } => ErrorKind::Io,
            RelayError::Protocol(_) => ErrorKind::Protocol,
            RelayError::Handler(_) => ErrorKind::Handler,
            RelayError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for I/O errors that just mean the peer went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            RelayError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
