// Global configuration management

use crate::engine::{ConfigError, DEFAULT_CONTAINER, DEFAULT_FILENAME_PATTERN, OptionsModel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Container/codec pair, e.g. "MKV (h264)"
    #[serde(default = "default_container")]
    pub container: String,

    /// FFmpeg -loglevel for encodes
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Whether to overwrite existing output files
    #[serde(default)]
    pub overwrite: bool,

    /// Encoder threads (unset lets FFmpeg decide)
    #[serde(default)]
    pub threads: Option<u32>,

    /// Peak normalization target in dBFS
    #[serde(default = "default_normalization_target")]
    pub normalization_target: f64,

    /// Output name pattern. Supports: {filename}, {basename}, {ext}
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    /// Write outputs here instead of next to each source
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_loglevel() -> String {
    "warning".to_string()
}

fn default_normalization_target() -> f64 {
    -1.0
}

fn default_filename_pattern() -> String {
    DEFAULT_FILENAME_PATTERN.to_string()
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
            loglevel: default_loglevel(),
            overwrite: false,
            threads: None,
            normalization_target: default_normalization_target(),
            filename_pattern: default_filename_pattern(),
            output_dir: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("ffbatch")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("ffbatch")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            let config = Config::default();

            // Not fatal: the directory may be read-only
            if let Err(e) = config.save() {
                warn!(
                    error = %e,
                    "could not create default config file, using built-in defaults; \
                     run 'ffbatch init-config'"
                );
            }

            Ok(config)
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Options model seeded from the configured defaults.
    pub fn options_model(&self) -> Result<OptionsModel, ConfigError> {
        let mut options = OptionsModel::new();
        options.set_container(&self.defaults.container)?;
        options.set_loglevel(&self.defaults.loglevel)?;
        options.set_overwrite(self.defaults.overwrite);
        options.set_threads(self.defaults.threads);
        Ok(options)
    }
}
