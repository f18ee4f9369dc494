//! Error types for Recital

use thiserror::Error;

/// Result type alias for Recital operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Recital
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio output error
    #[error("audio error: {0}")]
    Audio(String),

    /// Section or resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Synthesis failed on both the remote and on-device paths
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure taxonomy for a single chunk's synthesis
///
/// Only [`SynthesisError::FallbackUnavailable`] ever reaches a user; every
/// other variant is recovered by retrying or by the on-device fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// Request exceeded its length-scaled timeout
    #[error("synthesis request timed out")]
    NetworkTimeout,

    /// Transport failure or non-2xx status
    #[error("synthesis network error: {0}")]
    Network(String),

    /// Endpoint answered `success: false`
    #[error("synthesis rejected: {0}")]
    Rejected(String),

    /// Remote path disabled for this process by the startup health probe
    #[error("remote synthesis unavailable")]
    Unavailable,

    /// On-device synthesizer is absent or failed
    #[error("on-device speech unavailable: {0}")]
    FallbackUnavailable(String),

    /// Nothing to speak
    #[error("nothing to synthesize")]
    EmptyInput,
}

impl SynthesisError {
    /// Whether this failure is terminal for the section (user-visible)
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::FallbackUnavailable(_))
    }
}
