use thiserror::Error;

/// Errors raised by the decode, framing and session layers.
///
/// Stream corruption (`InvalidChunkHeader`, `InvalidFrameHeader`,
/// `FreeFormatUnsupported`, `InvalidWavHeader`) is absorbed inside the
/// decoders and only surfaces through logs and diagnostics counters.
/// Misconfiguration is returned to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("unsupported PCM format: {0}")]
    UnsupportedPcmFormat(String),

    #[error("invalid chunk header: {0}")]
    InvalidChunkHeader(String),

    #[error("invalid MPEG frame header: {0}")]
    InvalidFrameHeader(String),

    #[error("free-format MPEG frames are not supported")]
    FreeFormatUnsupported,

    #[error("insufficient data: requested {requested} bits, {available} available")]
    InsufficientData { requested: usize, available: usize },

    #[error("invalid WAV header: {0}")]
    InvalidWavHeader(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}
