//! Error handling for Reverie
//!
//! Only construction, reconfiguration and configuration parsing can fail.
//! The real-time process path is infallible by construction.

use thiserror::Error;

/// Result type alias for Reverie operations
pub type Result<T> = std::result::Result<T, ReverieError>;

/// Main error type for Reverie operations
#[derive(Error, Debug)]
pub enum ReverieError {
    // Configuration Errors
    #[error("Invalid sample rate: {sample_rate} (must be a positive number of Hz)")]
    InvalidSampleRate { sample_rate: f64 },

    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Audio Errors
    #[error("Invalid audio: {reason}")]
    InvalidAudio { reason: String },

    // Hand-off Errors
    #[error("Reverb engine is no longer attached to this controller")]
    EngineDetached,

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReverieError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ReverieError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            ReverieError::InvalidParameter { .. } => "INVALID_PARAMETER",
            ReverieError::InvalidAudio { .. } => "INVALID_AUDIO",
            ReverieError::EngineDetached => "ENGINE_DETACHED",
            ReverieError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReverieError::InvalidParameter { .. } => true,
            ReverieError::InvalidAudio { .. } => true,
            ReverieError::EngineDetached => true,
            ReverieError::Serialization(_) => true,
            ReverieError::InvalidSampleRate { .. } => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ReverieError::InvalidSampleRate { .. } => vec![
                "Pass the host's actual sampling rate (e.g. 44100 or 48000)",
                "Construct the engine only after the audio device is configured",
            ],
            ReverieError::InvalidParameter { .. } => vec![
                "Check the parameter name against the ReverbParams fields",
                "Numeric parameters must be JSON numbers, mode must be one of plate/hall/room/ambient",
            ],
            ReverieError::InvalidAudio { .. } => vec![
                "Interleaved data length must be a multiple of the channel count",
            ],
            ReverieError::EngineDetached => vec![
                "The engine was dropped or reconfigured",
                "Request a new controller from the engine",
            ],
            ReverieError::Serialization(_) => vec!["Check that the JSON document is well formed"],
        }
    }
}
