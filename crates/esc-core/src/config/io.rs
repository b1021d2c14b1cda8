//! YAML configuration loading

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load configuration from a YAML file
///
/// A missing file yields the default config. A file that exists but cannot
/// be read or parsed is an error.
///
/// # Arguments
/// * `path` - Path to the YAML configuration file
///
/// # Example
///
/// ```ignore
/// let config: ServerConfig = load_config(Path::new("server.yaml"))?;
/// ```
pub fn load_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("No config file at {:?}, using defaults", path);
        return Ok(T::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config = serde_yaml::from_str::<T>(&contents)
        .with_context(|| format!("Invalid config file {:?}", path))?;

    log::info!("Loaded config from {:?}", path);
    Ok(config)
}
