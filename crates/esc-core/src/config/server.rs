//! Inference server and model runtime settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Smallest accepted request body limit (1 MiB)
const MIN_BODY_BYTES: usize = 1 << 20;
/// Largest accepted request body limit (1 GiB)
const MAX_BODY_BYTES: usize = 1 << 30;
/// Upper bound for ONNX Runtime intra-op threads
const MAX_INTRA_THREADS: usize = 64;

/// ONNX Runtime session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Use the GPU when the build and the host support it.
    /// Falls back to the CPU otherwise.
    /// Default: true
    pub use_gpu: bool,

    /// Intra-op threads for the session, 0 lets the runtime decide
    /// Default: 0
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            use_gpu: true,
            intra_threads: 0,
        }
    }
}

/// Inference server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    /// Default: 0.0.0.0
    pub bind_address: String,

    /// TCP port
    /// Default: 8000
    pub port: u16,

    /// Checkpoint manifest (YAML with `model` and `classes`)
    /// Default: /models/best_model.yaml
    pub checkpoint: PathBuf,

    /// Load the classifier before accepting connections.
    /// When false the first request triggers the load.
    /// Default: true
    pub preload: bool,

    /// Request body limit in bytes, base64 inflates audio by a third
    /// Default: 64 MiB
    pub max_body_bytes: usize,

    pub model: ModelConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            checkpoint: PathBuf::from("/models/best_model.yaml"),
            preload: true,
            max_body_bytes: 64 << 20,
            model: ModelConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Clamp out-of-range values, logging each adjustment
    pub fn validate(&mut self) {
        let clamped = self.max_body_bytes.clamp(MIN_BODY_BYTES, MAX_BODY_BYTES);
        if clamped != self.max_body_bytes {
            log::warn!(
                "max_body_bytes {} out of range, using {}",
                self.max_body_bytes,
                clamped
            );
            self.max_body_bytes = clamped;
        }

        if self.model.intra_threads > MAX_INTRA_THREADS {
            log::warn!(
                "intra_threads {} too high, using {}",
                self.model.intra_threads,
                MAX_INTRA_THREADS
            );
            self.model.intra_threads = MAX_INTRA_THREADS;
        }

        if self.bind_address.trim().is_empty() {
            log::warn!("empty bind_address, using 0.0.0.0");
            self.bind_address = "0.0.0.0".to_string();
        }
    }

    /// `host:port` string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.checkpoint, PathBuf::from("/models/best_model.yaml"));
        assert!(config.preload);
        assert_eq!(config.max_body_bytes, 64 * 1024 * 1024);
        assert!(config.model.use_gpu);
        assert_eq!(config.model.intra_threads, 0);
    }

    #[test]
    fn test_validate_clamps_limits() {
        let mut config = ServerConfig {
            max_body_bytes: 10,
            bind_address: "  ".to_string(),
            model: ModelConfig {
                use_gpu: false,
                intra_threads: 1000,
            },
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.max_body_bytes, MIN_BODY_BYTES);
        assert_eq!(config.model.intra_threads, MAX_INTRA_THREADS);
        assert_eq!(config.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_validate_keeps_sane_values() {
        let mut config = ServerConfig::default();
        let before = config.clone();
        config.validate();
        assert_eq!(config, before);
    }
}
