//! Standard config locations

use std::path::PathBuf;

/// Per-user config directory for the service
///
/// Returns: `$XDG_CONFIG_HOME/esc` (or the platform equivalent)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("esc")
}

/// Default path of a named config file, e.g. `server.yaml`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_esc() {
        assert!(default_config_dir().ends_with("esc"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        assert!(default_config_path("server.yaml").ends_with("esc/server.yaml"));
    }
}
