//! Checkpoint manifest loading
//!
//! A checkpoint is a small YAML manifest next to the exported ONNX graph:
//!
//! ```yaml
//! model: best_model.onnx
//! classes:
//!   - dog
//!   - rooster
//!   - rain
//! ```
//!
//! `model` is resolved relative to the manifest's directory. `classes` is
//! index-aligned with the model's output logits.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::classifier::TOP_K;
use crate::error::{ClassifyError, Result};

/// On-disk manifest layout
#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    model: PathBuf,
    classes: Vec<String>,
}

/// Ordered, fixed-size list of class labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels(Box<[String]>);

impl ClassLabels {
    /// Validate and freeze a label list
    ///
    /// Rejects empty lists, duplicate labels, and lists shorter than the
    /// number of predictions returned per request.
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.len() < TOP_K {
            return Err(ClassifyError::ModelLoad(format!(
                "checkpoint lists {} classes, at least {} required",
                labels.len(),
                TOP_K
            )));
        }

        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(ClassifyError::ModelLoad(format!(
                    "duplicate class label in checkpoint: {:?}",
                    label
                )));
            }
        }

        Ok(Self(labels.into_boxed_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

/// Loaded checkpoint: model graph location plus class labels
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub model_path: PathBuf,
    pub labels: ClassLabels,
}

impl Checkpoint {
    /// Read and validate a checkpoint manifest
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Reading checkpoint manifest {:?}", path);

        let contents =
            std::fs::read_to_string(path).map_err(|source| ClassifyError::CheckpointRead {
                path: path.to_path_buf(),
                source,
            })?;

        let manifest: Manifest = serde_yaml::from_str(&contents).map_err(|e| {
            ClassifyError::ModelLoad(format!("invalid checkpoint manifest {:?}: {}", path, e))
        })?;

        let model_path = if manifest.model.is_absolute() {
            manifest.model
        } else {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(manifest.model)
        };

        if !model_path.is_file() {
            return Err(ClassifyError::ModelLoad(format!(
                "model weights not found: {:?}",
                model_path
            )));
        }

        let labels = ClassLabels::new(manifest.classes)?;
        log::info!(
            "Checkpoint {:?}: {} classes, weights at {:?}",
            path.file_name().unwrap_or_default(),
            labels.len(),
            model_path
        );

        Ok(Self { model_path, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_resolves_relative_model_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "best_model.onnx", "not really onnx");
        let manifest = write(
            dir.path(),
            "best_model.yaml",
            "model: best_model.onnx\nclasses: [dog, rooster, rain, sea_waves]\n",
        );

        let checkpoint = Checkpoint::load(&manifest).unwrap();
        assert_eq!(checkpoint.model_path, dir.path().join("best_model.onnx"));
        assert_eq!(checkpoint.labels.len(), 4);
        assert_eq!(checkpoint.labels.get(1), Some("rooster"));
        assert_eq!(checkpoint.labels.get(4), None);
    }

    #[test]
    fn test_missing_manifest_is_read_error() {
        let err = Checkpoint::load(Path::new("/nonexistent/best_model.yaml")).unwrap_err();
        assert!(matches!(err, ClassifyError::CheckpointRead { .. }));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_missing_weights_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write(
            dir.path(),
            "ckpt.yaml",
            "model: gone.onnx\nclasses: [a, b, c]\n",
        );
        assert!(matches!(
            Checkpoint::load(&manifest),
            Err(ClassifyError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_corrupt_manifest_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write(dir.path(), "ckpt.yaml", "model: [unterminated\n");
        assert!(matches!(
            Checkpoint::load(&manifest),
            Err(ClassifyError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_too_few_classes_rejected() {
        let labels = vec!["dog".to_string(), "cat".to_string()];
        assert!(matches!(
            ClassLabels::new(labels),
            Err(ClassifyError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_duplicate_classes_rejected() {
        let labels = ["dog", "cat", "dog"].iter().map(|s| s.to_string()).collect();
        assert!(ClassLabels::new(labels).is_err());
    }
}
