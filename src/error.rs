use std::fmt;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    AcquireShot,
    Crop,
    Distribute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::AcquireShot => "acquire-shot",
            Stage::Crop => "crop",
            Stage::Distribute => "distribute",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ShotbotError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Image source failed: {0}")]
    ImageSourceFailed(String),

    #[error("Snapshot request failed: {0}")]
    NetworkError(String),

    #[error("Snapshot service returned HTTP {status}: {body}")]
    SnapshotStatus { status: u16, body: String },

    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    #[error("Image encode failed: {0}")]
    EncodeFailed(String),

    #[error("Posting to target '{target}' failed: {reason}")]
    DistributionFailed { target: String, reason: String },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Pipeline attempt panicked: {0}")]
    AttemptPanicked(String),

    #[error("Reached retry limit after {attempts} attempts")]
    RetriesExhausted { attempts: usize },
}

impl ShotbotError {
    /// The stage this error is reported against in logs and metrics.
    pub fn stage(&self) -> Stage {
        match self {
            ShotbotError::ImageSourceFailed(_)
            | ShotbotError::NetworkError(_)
            | ShotbotError::SnapshotStatus { .. } => Stage::AcquireShot,
            ShotbotError::DecodeFailed(_) | ShotbotError::EncodeFailed(_) => Stage::Crop,
            ShotbotError::DistributionFailed { .. } | ShotbotError::IoError(_) => {
                Stage::Distribute
            }
            ShotbotError::ConfigurationError(_)
            | ShotbotError::SerializationError(_)
            | ShotbotError::AttemptPanicked(_)
            | ShotbotError::RetriesExhausted { .. } => Stage::Setup,
        }
    }

    pub fn distribution(target: impl Into<String>, reason: impl ToString) -> Self {
        ShotbotError::DistributionFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for ShotbotError {
    fn from(err: std::io::Error) -> Self {
        ShotbotError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ShotbotError {
    fn from(err: serde_json::Error) -> Self {
        ShotbotError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ShotbotError {
    fn from(err: reqwest::Error) -> Self {
        ShotbotError::NetworkError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ShotbotError {
    fn from(err: tokio::task::JoinError) -> Self {
        ShotbotError::AttemptPanicked(err.to_string())
    }
}
