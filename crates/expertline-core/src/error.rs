//! Error types for the Expertline core.

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the core: model calls, routing verdicts, configuration,
/// and the interaction log.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("LLM API error: {0}")]
    Llm(String),

    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
}
