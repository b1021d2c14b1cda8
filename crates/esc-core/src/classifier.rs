//! Clip classification: features → forward pass → top-k predictions
//!
//! `Classifier` owns a loaded model, its class labels and the feature
//! extractor. It is immutable after construction and safe to share across
//! threads.

use std::path::Path;

use crate::api::Prediction;
use crate::audio::{self, Waveform, SAMPLE_RATE};
use crate::checkpoint::{Checkpoint, ClassLabels};
use crate::config::ModelConfig;
use crate::error::{ClassifyError, Result};
use crate::features::{FeatureExtractor, Spectrogram};
use crate::model::{AudioModel, Device, OrtModel};

/// Number of predictions returned per clip
pub const TOP_K: usize = 3;

/// Length of the silent clip pushed through the model at load time
const SELF_CHECK_SECS: f32 = 1.0;

pub struct Classifier {
    model: Box<dyn AudioModel>,
    labels: ClassLabels,
    features: FeatureExtractor,
}

impl Classifier {
    /// Load a checkpoint manifest and its ONNX graph
    ///
    /// Reads the manifest, builds the runtime session on the configured
    /// device and runs the silence check from [`Classifier::from_model`].
    ///
    /// # Arguments
    /// * `checkpoint_path` - YAML manifest with `model` and `classes`
    /// * `config` - Device and threading settings for the session
    ///
    /// # Errors
    /// `CheckpointRead` or `ModelLoad` when the manifest or weights are
    /// unusable, `Shape` when the model output width disagrees with the labels.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let classifier = Classifier::load(Path::new("/models/best_model.yaml"), &ModelConfig::default())?;
    /// let predictions = classifier.classify_base64(&request.audio_data)?;
    /// ```
    pub fn load(checkpoint_path: &Path, config: &ModelConfig) -> Result<Self> {
        let checkpoint = Checkpoint::load(checkpoint_path)?;
        let model = OrtModel::load(&checkpoint.model_path, config)?;
        Self::from_model(Box::new(model), checkpoint.labels)
    }

    /// Wrap an already loaded model
    ///
    /// Runs one forward pass on silence so a model whose input layout or
    /// output width disagrees with the labels fails here rather than on the
    /// first request.
    pub fn from_model(model: Box<dyn AudioModel>, labels: ClassLabels) -> Result<Self> {
        let classifier = Self {
            model,
            labels,
            features: FeatureExtractor::new(),
        };
        classifier.self_check()?;

        log::info!(
            "Classifier ready: model {:?} on {}, {} classes",
            classifier.model.name(),
            classifier.model.device(),
            classifier.labels.len()
        );
        Ok(classifier)
    }

    fn self_check(&self) -> Result<()> {
        let spectrogram = self.features.extract(&Waveform::silence(SELF_CHECK_SECS))?;
        let logits = self
            .model
            .forward(spectrogram.view())
            .map_err(|e| ClassifyError::Shape(format!("startup self-check failed: {}", e)))?;
        self.check_width(&logits)
    }

    fn check_width(&self, logits: &[f32]) -> Result<()> {
        if logits.len() != self.labels.len() {
            return Err(ClassifyError::Shape(format!(
                "model outputs {} logits but checkpoint lists {} classes",
                logits.len(),
                self.labels.len()
            )));
        }
        Ok(())
    }

    /// Score a spectrogram and return the top predictions, best first
    pub fn infer(&self, spectrogram: &Spectrogram) -> Result<Vec<Prediction>> {
        let [batch, channels, mels, frames] = spectrogram.shape();
        if batch != 1 || channels != 1 || mels != self.features.n_mels() || frames == 0 {
            return Err(ClassifyError::Shape(format!(
                "expected [1, 1, {}, T] spectrogram, got [{}, {}, {}, {}]",
                self.features.n_mels(),
                batch,
                channels,
                mels,
                frames
            )));
        }

        let logits = self.model.forward(spectrogram.view())?;
        self.check_width(&logits)?;

        let probs = softmax(&sanitize_logits(&logits));
        let predictions = top_k(&probs, TOP_K)
            .into_iter()
            .map(|(i, confidence)| Prediction {
                label: self
                    .labels
                    .get(i)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("class_{}", i)),
                confidence,
            })
            .collect();

        Ok(predictions)
    }

    /// Classify a mono waveform at any sample rate
    pub fn classify_waveform(&self, waveform: Waveform) -> Result<Vec<Prediction>> {
        let waveform = waveform.resampled(SAMPLE_RATE)?;
        let spectrogram = self.features.extract(&waveform)?;
        self.infer(&spectrogram)
    }

    /// Classify raw container bytes (WAV, FLAC, MP3, ...)
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Vec<Prediction>> {
        self.classify_waveform(audio::load_waveform(bytes)?)
    }

    /// Classify a base64-encoded audio container
    pub fn classify_base64(&self, payload: &str) -> Result<Vec<Prediction>> {
        self.classify_waveform(audio::decode_base64(payload)?)
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn device(&self) -> Device {
        self.model.device()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// Replace NaN and ±Inf logits with 0
pub fn sanitize_logits(logits: &[f32]) -> Vec<f32> {
    logits
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect()
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

/// Indices and values of the `k` largest probabilities, descending
///
/// Ties keep the lower index first.
pub fn top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}
