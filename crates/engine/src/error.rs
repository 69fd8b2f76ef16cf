use veil_lock::PatternError;
use veil_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("engine is not running")]
    Stopped,

    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure reported by a cover surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenterError {
    #[error("cover surface unavailable: {0}")]
    Unavailable(String),
}
