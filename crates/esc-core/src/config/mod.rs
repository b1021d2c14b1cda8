//! Configuration for the inference service
//!
//! - YAML config loading (missing file → defaults, bad file → error)
//! - Default config locations
//! - Server and model runtime settings
//!
//! # Usage
//!
//! ```ignore
//! use esc_core::config::{load_config, default_config_path, ServerConfig};
//!
//! let mut config: ServerConfig = load_config(&default_config_path("server.yaml"))?;
//! config.validate();
//! ```

mod io;
mod paths;
mod server;

pub use io::load_config;
pub use paths::{default_config_dir, default_config_path};
pub use server::{ModelConfig, ServerConfig};
