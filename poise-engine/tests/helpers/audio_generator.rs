//! Audio Test Fixture Generator
//!
//! Writes mono 16-bit PCM WAV files the speech analyzer can read

use std::path::Path;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    /// Tone frequency in Hz (0.0 for silence)
    pub frequency: f32,
    /// Peak amplitude (0.0-1.0)
    pub amplitude: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            sample_rate: 16_000,
            frequency: 180.0,
            amplitude: 0.4,
        }
    }
}

impl AudioConfig {
    pub fn silence(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            amplitude: 0.0,
            ..Default::default()
        }
    }
}

/// Generate a test WAV file with a steady tone
///
/// # Arguments
/// * `path` - Output file path
/// * `config` - Audio configuration
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;

    for i in 0..total_samples {
        let t = i as f32 / config.sample_rate as f32;
        let sample = config.amplitude * (2.0 * std::f32::consts::PI * config.frequency * t).sin();
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }

    writer.finalize()?;
    Ok(())
}
