//! Engine configuration
//!
//! Derived from the shared `TomlConfig` so the surrounding service and the
//! engine read one file. Values are validated once here; analyzers trust them.

use poise_common::config::{load_config, TomlConfig};
use poise_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Validated settings for one `FusionOrchestrator`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Facial analyzer samples every Nth frame
    pub facial_frame_stride: u32,
    /// Body analyzer samples every Nth frame
    pub body_frame_stride: u32,
    /// PCM frames fed to the recognizer per call
    pub recognizer_chunk_frames: usize,
    /// Report wall-clock recognition time as `duration_sec`
    pub legacy_wall_clock_duration: bool,
    /// ffmpeg binary
    pub ffmpeg_path: String,
    /// ffprobe binary
    pub ffprobe_path: String,
    /// Directory for temporary audio (system default when `None`)
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        // TomlConfig defaults always validate
        Self::from_toml(&TomlConfig::default()).unwrap_or(Self {
            facial_frame_stride: 30,
            body_frame_stride: 30,
            recognizer_chunk_frames: 4000,
            legacy_wall_clock_duration: false,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            temp_dir: None,
        })
    }
}

impl EngineConfig {
    /// Build from a parsed TOML config
    ///
    /// # Errors
    /// Returns `Error::Config` for zero strides, a zero chunk size or empty
    /// binary paths.
    pub fn from_toml(toml: &TomlConfig) -> Result<Self> {
        let analysis = &toml.analysis;
        let media = &toml.media;

        if analysis.facial_frame_stride == 0 {
            return Err(Error::Config("analysis.facial_frame_stride must be at least 1".into()));
        }
        if analysis.body_frame_stride == 0 {
            return Err(Error::Config("analysis.body_frame_stride must be at least 1".into()));
        }
        if analysis.recognizer_chunk_frames == 0 {
            return Err(Error::Config("analysis.recognizer_chunk_frames must be at least 1".into()));
        }
        if media.ffmpeg_path.trim().is_empty() || media.ffprobe_path.trim().is_empty() {
            return Err(Error::Config("media.ffmpeg_path and media.ffprobe_path must not be empty".into()));
        }
        if let Some(dir) = &media.temp_dir {
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "media.temp_dir is not a directory: {}",
                    dir.display()
                )));
            }
        }

        Ok(Self {
            facial_frame_stride: analysis.facial_frame_stride,
            body_frame_stride: analysis.body_frame_stride,
            recognizer_chunk_frames: analysis.recognizer_chunk_frames,
            legacy_wall_clock_duration: analysis.legacy_wall_clock_duration,
            ffmpeg_path: media.ffmpeg_path.clone(),
            ffprobe_path: media.ffprobe_path.clone(),
            temp_dir: media.temp_dir.clone(),
        })
    }

    /// Resolve, load and validate configuration in one step
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::from_toml(&load_config(config_path)?)
    }
}
