//! PCM WAV loading for the speech pipeline

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Mono 16-bit PCM audio held in memory
#[derive(Debug, Clone)]
pub struct PcmAudio {
    /// Mono samples
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl PcmAudio {
    /// True signal duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }

    /// Samples normalised to [-1.0, 1.0]
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }
}

/// Read a 16-bit PCM WAV file; multi-channel input is averaged to mono
pub fn read_pcm16(path: &Path) -> Result<PcmAudio> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "Expected 16-bit integer PCM, got {:?} {} bits",
            spec.sample_format,
            spec.bits_per_sample
        );
    }

    let interleaved = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .context("Failed to read WAV samples")?;

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / channels as i32) as i16)
            .collect()
    };

    Ok(PcmAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}
