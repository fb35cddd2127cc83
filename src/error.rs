//! Error types for RetroSonic

use thiserror::Error;

/// Status code reported alongside platform failures.
///
/// Backends translate their native error kinds into these codes; see
/// [`crate::backend`] for the mapping used by each backend.
pub type PlatformStatus = i32;

#[derive(Error, Debug)]
pub enum RetroSonicError {
    #[error("Audio engine failed to start (status {status}): {message}")]
    EngineFailedToStart {
        status: PlatformStatus,
        message: String,
    },

    #[error("Failed to create audio engine (status {status}): {message}")]
    EngineFailedToCreate {
        status: PlatformStatus,
        message: String,
    },

    #[error("Failed to set output device (status {status}): {message}")]
    FailedToSetOutputDevice {
        status: PlatformStatus,
        message: String,
    },

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Resampler error: {0}")]
    Resampler(String),
}

impl RetroSonicError {
    /// Platform status code, for the variants that carry one.
    pub fn status(&self) -> Option<PlatformStatus> {
        match self {
            Self::EngineFailedToStart { status, .. }
            | Self::EngineFailedToCreate { status, .. }
            | Self::FailedToSetOutputDevice { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RetroSonicError>;
