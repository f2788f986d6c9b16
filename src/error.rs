//! Error types for the transcription engine

use std::fmt;

/// Custom error type for transcription processing
#[derive(Debug, Clone)]
pub enum TranscribeError {
    /// E001: Invalid configuration (FFT/hop sizes, note range, post-processor params)
    Configuration(String),
    /// E002: Invalid input buffer (empty, zero sample rate)
    Input(String),
    /// E003: Cooperative cancellation observed mid-run
    Cancelled,
    /// E004: Unexpected numeric or pipeline failure
    Internal(String),
    /// E005: Audio file I/O or format error
    AudioFile(String),
    /// E006: MIDI export error
    MidiExport(String),
}

impl fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscribeError::Configuration(msg) => {
                write!(f, "E001: Invalid configuration - {}", msg)
            }
            TranscribeError::Input(msg) => {
                write!(f, "E002: Invalid input - {}", msg)
            }
            TranscribeError::Cancelled => {
                write!(f, "E003: Transcription cancelled")
            }
            TranscribeError::Internal(msg) => {
                write!(f, "E004: Internal error - {}", msg)
            }
            TranscribeError::AudioFile(msg) => {
                write!(f, "E005: Audio file error - {}", msg)
            }
            TranscribeError::MidiExport(msg) => {
                write!(f, "E006: MIDI export error - {}", msg)
            }
        }
    }
}

impl std::error::Error for TranscribeError {}

// From implementations for collaborator error types
impl From<std::io::Error> for TranscribeError {
    fn from(err: std::io::Error) -> Self {
        TranscribeError::AudioFile(format!("File I/O error: {}", err))
    }
}

impl From<hound::Error> for TranscribeError {
    fn from(err: hound::Error) -> Self {
        TranscribeError::AudioFile(err.to_string())
    }
}

impl From<serde_json::Error> for TranscribeError {
    fn from(err: serde_json::Error) -> Self {
        TranscribeError::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Result type alias for transcription operations
pub type Result<T> = std::result::Result<T, TranscribeError>;
