//! # segfile-config
//!
//! Configuration management for segfile.
//!
//! Loads configuration from:
//! 1. `~/.segfile/config.toml` (global)
//! 2. `.segfile/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod testing;
pub mod tolerance;

pub use tolerance::{ToleranceConfig, ToleranceKey};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Default width used when reading comment areas
pub const DEFAULT_LINE_LENGTH: usize = 255;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|e| e.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|e| e.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid setting: {0}")]
    Invalid(#[from] segfile_record::KernelError),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub dsk: ToleranceConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::global_config_path().as_deref(), Path::new(".segfile/config.toml"))
    }

    /// Load from explicit global and project paths; missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: &Path) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Load global config (~/.segfile/config.toml)
        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        // 2. Load project config (.segfile/config.toml) - overrides global
        if project.exists() {
            debug!("Loading project config from {:?}", project);
            let contents = std::fs::read_to_string(project)?;
            let project_config: Config = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        // 3. Apply environment variable overrides
        config.apply_env_overrides();

        config.dsk.validate()?;
        Ok(config)
    }

    /// Global config path: ~/.segfile/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".segfile/config.toml"))
    }

    /// Merge another config (project overrides)
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.storage.line_length != defaults.storage.line_length {
            self.storage.line_length = other.storage.line_length;
        }
        if other.storage.comment_chars != defaults.storage.comment_chars {
            self.storage.comment_chars = other.storage.comment_chars;
        }
        if other.storage.pretty_json != defaults.storage.pretty_json {
            self.storage.pretty_json = other.storage.pretty_json;
        }
        if other.dsk != defaults.dsk {
            self.dsk = other.dsk;
        }
        if other.logging.level != defaults.logging.level {
            self.logging.level = other.logging.level;
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(width) = std::env::var("SEGFILE_LINE_LENGTH") {
            if let Ok(n) = width.parse() {
                self.storage.line_length = n;
            }
        }
        if let Ok(chars) = std::env::var("SEGFILE_COMMENT_CHARS") {
            if let Ok(n) = chars.parse() {
                self.storage.comment_chars = n;
            }
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Width at which comment lines are folded on read
    pub line_length: usize,
    /// Comment characters reserved when creating new files
    pub comment_chars: usize,
    /// Pretty-print JSON output
    pub pretty_json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            line_length: DEFAULT_LINE_LENGTH,
            comment_chars: 0,
            pretty_json: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.line_length, DEFAULT_LINE_LENGTH);
        assert_eq!(config.dsk, ToleranceConfig::default());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[dsk]"));
        assert!(toml_str.contains("point_membership"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.storage.line_length, parsed.storage.line_length);
        assert_eq!(config.dsk, parsed.dsk);
    }
}
