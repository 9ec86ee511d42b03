//! Error types for astromech

use std::time::Duration;

use thiserror::Error;

/// Result type alias for astromech operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in astromech
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error (capture or playback)
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Wake word detection error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Sound library error (missing category, undecodable clip)
    #[error("sound library error: {0}")]
    SoundLibrary(String),

    /// A bounded call did not finish in time
    #[error("{stage} timed out after {elapsed:?}")]
    Timeout {
        /// Stage that timed out
        stage: &'static str,
        /// Configured bound
        elapsed: Duration,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
