//! JSON wire types shared by the server and the client

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// A single ranked class with its softmax probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(rename = "class")]
    pub label: String,
    /// Probability in [0, 1]
    pub confidence: f32,
}

/// `POST /inference` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Base64-encoded audio container (WAV, FLAC, MP3, ...)
    pub audio_data: String,
}

impl InferenceRequest {
    pub fn from_audio_bytes(bytes: &[u8]) -> Self {
        Self {
            audio_data: STANDARD.encode(bytes),
        }
    }
}

/// `POST /inference` success body, highest confidence first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub predictions: Vec<Prediction>,
}

/// Body returned with any non-200 status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" once the classifier is loaded, "loading" before
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub classes: usize,
}
