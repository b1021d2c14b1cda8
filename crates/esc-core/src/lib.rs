//! ESC Core - Audio clip classification library
//!
//! Shared by the inference server and the command-line client. A request flows
//! through three stages:
//!
//! 1. **Audio decoding** (`audio`): base64 → container bytes → mono waveform at 22050 Hz
//! 2. **Feature extraction** (`features`): waveform → `[1, 1, 128, T]` dB mel spectrogram
//! 3. **Classification** (`classifier`): ONNX forward pass → softmax → top-3 predictions
//!
//! The classifier is loaded once per process from a checkpoint manifest
//! (`checkpoint`) and shared read-only through `state::SharedClassifier`.

pub mod api;
pub mod audio;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod state;

pub use api::{InferenceRequest, InferenceResponse, Prediction};
pub use audio::{Waveform, SAMPLE_RATE};
pub use checkpoint::{Checkpoint, ClassLabels};
pub use classifier::{Classifier, TOP_K};
pub use error::{ClassifyError, Result};
pub use features::{FeatureExtractor, Spectrogram};
pub use model::{AudioModel, Device, OrtModel};
pub use state::SharedClassifier;
