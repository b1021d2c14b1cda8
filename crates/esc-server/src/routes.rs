//! HTTP routes
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | `/inference` | POST | `{audio_data}` → top-3 `{predictions}` |
//! | `/health` | GET | load state, device and class count |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use esc_core::api::{ErrorResponse, HealthResponse, InferenceRequest, InferenceResponse};
use esc_core::config::ModelConfig;
use esc_core::{Classifier, ClassifyError, SharedClassifier};

/// Shared state passed to all request handlers
#[derive(Clone)]
pub struct AppState {
    classifier: Arc<SharedClassifier>,
    checkpoint: Arc<PathBuf>,
    model_config: Arc<ModelConfig>,
}

impl AppState {
    pub fn new(
        classifier: Arc<SharedClassifier>,
        checkpoint: PathBuf,
        model_config: ModelConfig,
    ) -> Self {
        Self {
            classifier,
            checkpoint: Arc::new(checkpoint),
            model_config: Arc::new(model_config),
        }
    }

    /// Loaded classifier, loading it on first use. Blocking.
    fn classifier(&self) -> Result<Arc<Classifier>, ClassifyError> {
        self.classifier
            .get_or_load(|| Classifier::load(&self.checkpoint, &self.model_config))
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/inference", post(inference))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Error response: status code plus `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if err.is_load_error() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("{} {}", self.status, self.message);
        } else {
            log::warn!("{} {}", self.status, self.message);
        }
        let body = ErrorResponse {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Handles `POST /inference`
///
/// Decoding, feature extraction and the forward pass are CPU-bound, so the
/// whole request runs on the blocking pool.
async fn inference(
    State(state): State<AppState>,
    Json(request): Json<InferenceRequest>,
) -> Result<Json<InferenceResponse>, ApiError> {
    let started = Instant::now();
    let payload_len = request.audio_data.len();

    let predictions = tokio::task::spawn_blocking(move || {
        let classifier = state.classifier()?;
        classifier.classify_base64(&request.audio_data)
    })
    .await
    .map_err(|e| ApiError::internal(format!("inference task failed: {}", e)))??;

    if let Some(best) = predictions.first() {
        log::info!(
            "Classified {} byte payload as {:?} ({:.3}) in {:?}",
            payload_len,
            best.label,
            best.confidence,
            started.elapsed()
        );
    }

    Ok(Json(InferenceResponse { predictions }))
}

/// Handles `GET /health`
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let response = match state.classifier.get() {
        Some(classifier) => HealthResponse {
            status: "ok".to_string(),
            device: Some(classifier.device().to_string()),
            classes: classifier.labels().len(),
        },
        None => HealthResponse {
            status: "loading".to_string(),
            device: None,
            classes: 0,
        },
    };
    Json(response)
}
