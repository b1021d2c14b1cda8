//! Classification error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while classifying an audio clip
///
/// Variants are grouped by who can fix them: `Decode` is caused by the
/// uploaded clip, everything else points at the deployment (checkpoint,
/// model graph, runtime).
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Payload is not valid base64 or not a readable audio container
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Spectrogram does not match what the loaded model expects
    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Failed to read checkpoint: {path}")]
    CheckpointRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

impl ClassifyError {
    /// Whether the caller can fix this by sending different audio
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Whether the failure means the model never became ready
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::ModelLoad(_) | Self::CheckpointRead { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
