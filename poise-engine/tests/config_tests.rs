//! EngineConfig loading from TOML and environment
//!
//! Environment-touching tests run serially.

use poise_common::config::{CONFIG_ENV_VAR, FFMPEG_ENV_VAR, FFPROBE_ENV_VAR};
use poise_engine::{AnalysisError, EngineConfig};
use serial_test::serial;
use tempfile::TempDir;

fn clear_env() {
    std::env::remove_var(CONFIG_ENV_VAR);
    std::env::remove_var(FFMPEG_ENV_VAR);
    std::env::remove_var(FFPROBE_ENV_VAR);
}

#[test]
#[serial]
fn test_engine_config_from_file_with_env_override() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("poise.toml");
    std::fs::write(
        &path,
        format!(
            r#"
            [media]
            ffprobe_path = "/usr/local/bin/ffprobe"
            temp_dir = "{}"

            [analysis]
            body_frame_stride = 15
            recognizer_chunk_frames = 8000
            "#,
            dir.path().display()
        ),
    )
    .unwrap();

    std::env::set_var(FFMPEG_ENV_VAR, "/opt/ffmpeg/ffmpeg");
    let config = EngineConfig::load(Some(&path)).unwrap();
    clear_env();

    assert_eq!(config.ffmpeg_path, "/opt/ffmpeg/ffmpeg");
    assert_eq!(config.ffprobe_path, "/usr/local/bin/ffprobe");
    assert_eq!(config.facial_frame_stride, 30);
    assert_eq!(config.body_frame_stride, 15);
    assert_eq!(config.recognizer_chunk_frames, 8000);
    assert_eq!(config.temp_dir.as_deref(), Some(dir.path()));
}

#[test]
#[serial]
fn test_invalid_stride_is_config_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("poise.toml");
    std::fs::write(&path, "[analysis]\nfacial_frame_stride = 0\n").unwrap();

    let err = EngineConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, poise_common::Error::Config(_)));

    let err = AnalysisError::from(err);
    assert_eq!(err.code(), "CONFIG_ERROR");
}
