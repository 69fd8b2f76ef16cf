//! Error types for foreground detection.

use thiserror::Error;

/// Errors raised by platform usage-log queries.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The usage-stats permission has not been granted.
    #[error("usage access not granted - foreground app cannot be detected")]
    UsageAccessDenied,

    /// The platform query itself failed.
    #[error("usage query failed: {0}")]
    QueryFailed(String),

    /// No usage-log implementation exists for this platform.
    #[error("foreground detection is not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, ContextError>;
