use thiserror::Error;

/// Top-level error type for engine operations.
///
/// Source-level problems never appear here: adapters fold their failures
/// into `partial_failures` on the JobResult and a job with zero usable
/// sources still returns Ok.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The JobSpec is malformed. The job was not started.
    #[error("validation error: {0}")]
    Validation(String),

    /// Concurrency caps exhausted at admission.
    #[error("engine busy: {0}")]
    Busy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("AI backend error: {0}")]
    Ai(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the caller (not the engine) is at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
