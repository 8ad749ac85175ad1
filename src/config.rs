//! Configuration management for the object store tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (objectstore.toml)
//! - Environment variables (OBJECTSTORE__*)
//!
//! ## Example config file (objectstore.toml):
//! ```toml
//! [validation]
//! warnings_as_errors = false
//! stop_on_first_error = false
//!
//! [output]
//! format = "pretty"
//! indent = 2
//! include_declaration = true
//!
//! [logging]
//! filter = "info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main configuration for the object store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Report warnings as errors
    #[serde(default)]
    pub warnings_as_errors: bool,

    /// Stop recording issues after the first error
    #[serde(default)]
    pub stop_on_first_error: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,

    /// Spaces per indentation level in pretty output
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Emit the `<?xml ...?>` declaration
    #[serde(default = "default_true")]
    pub include_declaration: bool,
}

/// Output format for XML documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_indent() -> usize {
    2
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            indent: default_indent(),
            include_declaration: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ObjectStoreConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "objectstore.toml",
            ".objectstore.toml",
            "config/objectstore.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "objectstore") {
            let xdg_config = config_dir.config_dir().join("objectstore.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (OBJECTSTORE__*)
        builder = builder.add_source(
            Environment::with_prefix("OBJECTSTORE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObjectStoreConfig::default();
        assert!(!config.validation.warnings_as_errors);
        assert_eq!(config.output.format, OutputFormat::Pretty);
        assert_eq!(config.output.indent, 2);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_serialize_config() {
        let config = ObjectStoreConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("format = \"pretty\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[validation]\nwarnings_as_errors = true\n\n[output]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = ObjectStoreConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert!(config.validation.warnings_as_errors);
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert!(config.output.include_declaration);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ObjectStoreConfig::default();
        config.output.indent = 4;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = ObjectStoreConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.output.indent, 4);
    }
}
