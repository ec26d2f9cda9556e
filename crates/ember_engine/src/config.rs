//! Engine configuration
//!
//! Window, shader and memory settings, loadable from a TOML file with
//! sensible defaults for every field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window creation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Client-area width in pixels
    pub width: i32,
    /// Client-area height in pixels
    pub height: i32,
    /// Window title (widened on the Win32 back end)
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Ember Engine".to_string(),
        }
    }
}

/// Shader source locations for the bootstrap draw program.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader source file
    pub vertex_path: String,
    /// Path to the fragment shader source file
    pub fragment_path: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex_path: "assets/shaders/quad.vert".to_string(),
            fragment_path: "assets/shaders/quad.frag".to_string(),
        }
    }
}

/// Transient-memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of the bootstrap scratch arena in bytes
    pub scratch_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            // 50 MB covers shader text with plenty of headroom for staged
            // asset bytes.
            scratch_capacity: 50 * 1024 * 1024,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Shader locations
    pub shaders: ShaderConfig,
    /// Memory settings
    pub memory: MemoryConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file is missing or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::info!(
                    "using default config ({}: {})",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.shaders.vertex_path, "assets/shaders/quad.vert");
        assert_eq!(config.memory.scratch_capacity, 50 * 1024 * 1024);
    }

    #[test]
    fn test_partial_toml_keeps_defaults_elsewhere() {
        let config: EngineConfig = toml::from_str(
            r#"
            [window]
            width = 640
            height = 480
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 480);
        assert_eq!(config.window.title, "Ember Engine");
        assert_eq!(config.shaders.fragment_path, "assets/shaders/quad.frag");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = EngineConfig::load(Path::new("/nonexistent/ember.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let path = std::env::temp_dir().join(format!("ember_config_{}.toml", std::process::id()));
        std::fs::write(&path, "window = \"not a table\"").unwrap();

        let result = EngineConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        let _ = std::fs::remove_file(&path);
    }
}
