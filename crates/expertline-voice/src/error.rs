//! Error types for the Expertline speech edge

use thiserror::Error;

/// Result type alias for speech operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors raised while transcribing or synthesizing speech
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
