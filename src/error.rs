//! Error types for the dinnerbell dispatch engine.
//!
//! All errors use stable string messages suitable for logs and
//! programmatic handling. Push tokens and other recipient addresses
//! never appear in error messages.

/// Top-level error type for the reminder dispatch system.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Event / user store error.
    #[error("store error: {0}")]
    Store(String),

    /// Push delivery API error.
    #[error("push error: {0}")]
    Push(String),

    /// Notification content selection or rendering error.
    #[error("content error: {0}")]
    Content(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DispatchError>;
