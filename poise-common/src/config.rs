//! Configuration loading and config file resolution
//!
//! The bootstrap configuration is a small TOML file. Every field has a
//! built-in default, so a missing file is not an error.
//!
//! # Resolution Priority
//!
//! 1. Explicit path argument (highest priority)
//! 2. Environment variable `POISE_CONFIG`
//! 3. Platform config file (`<config_dir>/poise/config.toml`)
//! 4. Built-in defaults (fallback)
//!
//! Individual environment overrides (`POISE_FFMPEG`, `POISE_FFPROBE`) are
//! applied after the file is parsed and win over TOML values.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "POISE_CONFIG";

/// Environment override for the ffmpeg binary
pub const FFMPEG_ENV_VAR: &str = "POISE_FFMPEG";

/// Environment override for the ffprobe binary
pub const FFPROBE_ENV_VAR: &str = "POISE_FFPROBE";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External media tooling
    #[serde(default)]
    pub media: MediaConfig,

    /// Analyzer tunables
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// External media tool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// ffmpeg binary (name on PATH or absolute path)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// ffprobe binary (name on PATH or absolute path)
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    /// Directory for temporary audio artifacts (system temp dir if unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            temp_dir: None,
        }
    }
}

/// Analyzer tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Sample every Nth video frame for facial analysis
    #[serde(default = "default_frame_stride")]
    pub facial_frame_stride: u32,

    /// Sample every Nth video frame for body analysis
    #[serde(default = "default_frame_stride")]
    pub body_frame_stride: u32,

    /// PCM frames handed to the speech recognizer per chunk
    #[serde(default = "default_chunk_frames")]
    pub recognizer_chunk_frames: usize,

    /// Report recognition wall-clock time as the speech duration
    #[serde(default)]
    pub legacy_wall_clock_duration: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            facial_frame_stride: default_frame_stride(),
            body_frame_stride: default_frame_stride(),
            recognizer_chunk_frames: default_chunk_frames(),
            legacy_wall_clock_duration: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_frame_stride() -> u32 {
    30
}

fn default_chunk_frames() -> usize {
    4000
}

/// Resolve the config file path
///
/// Returns `None` when no candidate exists; callers then use defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Explicit argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("poise").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load configuration following the resolution priority
///
/// # Errors
/// Returns `Error::Config` if an explicitly named file cannot be read or
/// any resolved file fails to parse.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = read_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => {
            debug!("No config file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))
}

/// Apply per-field environment overrides
pub fn apply_env_overrides(config: &mut TomlConfig) {
    if let Some(ffmpeg) = non_empty_env(FFMPEG_ENV_VAR) {
        debug!(ffmpeg = %ffmpeg, "ffmpeg path overridden from environment");
        config.media.ffmpeg_path = ffmpeg;
    }
    if let Some(ffprobe) = non_empty_env(FFPROBE_ENV_VAR) {
        debug!(ffprobe = %ffprobe, "ffprobe path overridden from environment");
        config.media.ffprobe_path = ffprobe;
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
