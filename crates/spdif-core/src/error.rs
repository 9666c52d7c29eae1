//! Error types for spdif-out

use thiserror::Error;

/// Main error type.
#[derive(Error, Debug)]
pub enum SpdifError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors on the streaming path.
///
/// The encoder itself is total; only session negotiation and the hardware
/// transfer collaborator can fail, and those failures are surfaced exactly
/// once to the caller, never retried internally.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedRate(u32),

    #[error("Unsupported word length: {0} bits")]
    UnsupportedWordLength(u8),

    #[error("Stream not prepared")]
    NotPrepared,

    #[error("Transfer backend: {0}")]
    Backend(String),

    #[error("Transfer submit failed: {0}")]
    SubmitFailed(String),
}

/// Result type alias for spdif-out operations.
pub type Result<T> = std::result::Result<T, SpdifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamError::UnsupportedRate(22_050);
        assert_eq!(format!("{}", err), "Unsupported sample rate: 22050 Hz");

        let err = StreamError::UnsupportedWordLength(12);
        assert_eq!(format!("{}", err), "Unsupported word length: 12 bits");
    }

    #[test]
    fn test_error_conversion() {
        let stream_err = StreamError::NotPrepared;
        let err: SpdifError = stream_err.into();
        assert!(matches!(err, SpdifError::Stream(_)));
    }
}
