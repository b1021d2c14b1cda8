//! Tensor runtime seam for the classifier
//!
//! `AudioModel` abstracts the forward pass so scoring and label decoding do
//! not depend on a particular runtime. `OrtModel` runs an exported ONNX graph
//! through ONNX Runtime on the CPU or, when built with the `cuda` feature,
//! on an NVIDIA GPU.

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use ndarray::ArrayView4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::config::ModelConfig;
use crate::error::{ClassifyError, Result};

/// Compute device the model runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn display_name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A loaded network that maps a `[1, 1, mels, frames]` spectrogram to logits
pub trait AudioModel: Send + Sync {
    /// Run one forward pass and return the raw logits of batch item 0
    fn forward(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>>;

    /// Model name for logging
    fn name(&self) -> &str;

    fn device(&self) -> Device {
        Device::Cpu
    }
}

/// ONNX Runtime model
///
/// `Session::run` needs `&mut self`, so the session sits behind a mutex:
/// concurrent requests serialise on the device, the rest of the pipeline
/// (decoding, features, scoring) runs in parallel.
pub struct OrtModel {
    session: Mutex<Session>,
    input_name: String,
    name: String,
    device: Device,
}

impl OrtModel {
    /// Build an inference session from an ONNX file
    pub fn load(model_path: &Path, config: &ModelConfig) -> Result<Self> {
        let device = select_device(config.use_gpu);

        let mut builder = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error)?;

        if config.intra_threads > 0 {
            builder = builder
                .with_intra_threads(config.intra_threads)
                .map_err(load_error)?;
        }

        #[cfg(feature = "cuda")]
        {
            if device == Device::Cuda {
                use ort::execution_providers::CUDAExecutionProvider;
                builder = builder
                    .with_execution_providers([CUDAExecutionProvider::default().build()])
                    .map_err(load_error)?;
                log::info!("CUDA execution provider registered");
            }
        }

        let session = builder.commit_from_file(model_path).map_err(|e| {
            ClassifyError::ModelLoad(format!("Failed to load ONNX model {:?}: {}", model_path, e))
        })?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| ClassifyError::ModelLoad("model declares no inputs".to_string()))?;

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        log::info!(
            "Loaded ONNX model {:?} on {} (input {:?})",
            model_path,
            device,
            input_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            name,
            device,
        })
    }
}

impl AudioModel for OrtModel {
    fn forward(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input.to_owned())
            .map_err(|e| ClassifyError::Inference(format!("tensor creation error: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifyError::Inference("model session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| ClassifyError::Inference(e.to_string()))?;

        let (_, logits_value) = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifyError::Inference("model produced no output".to_string()))?;

        let (shape, data) = logits_value
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifyError::Inference(format!("output extraction error: {}", e)))?;

        // [batch, classes]: keep batch item 0
        let dims: Vec<i64> = shape.iter().copied().collect();
        let per_item = if dims.len() >= 2 {
            dims[1..].iter().product::<i64>().max(0) as usize
        } else {
            data.len()
        };

        Ok(data[..per_item.min(data.len())].to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> Device {
        self.device
    }
}

fn load_error<E: fmt::Display>(e: E) -> ClassifyError {
    ClassifyError::ModelLoad(e.to_string())
}

/// Pick the accelerator when requested and usable, otherwise the CPU
fn select_device(use_gpu: bool) -> Device {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
        if use_gpu {
            match CUDAExecutionProvider::default().is_available() {
                Ok(true) => return Device::Cuda,
                Ok(false) => log::warn!("CUDA requested but not available, using CPU"),
                Err(e) => log::warn!("Could not query CUDA ({}), using CPU", e),
            }
        }
    }

    #[cfg(not(feature = "cuda"))]
    {
        if use_gpu {
            log::info!("Built without the `cuda` feature, using CPU");
        }
    }

    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_names() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda.display_name(), "cuda");
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cpu_without_cuda_feature() {
        assert_eq!(select_device(true), Device::Cpu);
        assert_eq!(select_device(false), Device::Cpu);
    }

    #[test]
    fn test_missing_model_file_is_load_error() {
        let config = ModelConfig::default();
        let result = OrtModel::load(Path::new("/nonexistent/model.onnx"), &config);
        assert!(matches!(result, Err(ClassifyError::ModelLoad(_))));
    }
}
