//! Audio extraction from recorded video
//!
//! Produces the mono 16 kHz 16-bit PCM WAV the speech analyzer consumes.
//!
//! Two-stage strategy:
//! 1. `FfmpegAudioExtractor` - external ffmpeg process (handles webm/opus)
//! 2. `SymphoniaAudioExtractor` - in-process decode + resample fallback
//!
//! `TwoStageAudioExtractor` raises only when both stages fail. The resulting
//! `AudioTrack` owns its temporary file; dropping the track deletes it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Sample rate expected by the speech recognizer
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Temporary mono PCM WAV extracted from the video
///
/// Deleted when dropped, on every exit path.
#[derive(Debug)]
pub struct AudioTrack {
    file: NamedTempFile,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Name of the stage that produced the track
    pub stage: &'static str,
}

impl AudioTrack {
    /// Wrap an already written temporary WAV
    pub fn from_temp_file(file: NamedTempFile, sample_rate: u32, stage: &'static str) -> Self {
        Self {
            file,
            sample_rate,
            stage,
        }
    }

    /// Path of the temporary WAV file
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Audio extraction collaborator
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Stage name for logs and telemetry
    fn name(&self) -> &'static str;

    /// Extract mono 16 kHz PCM audio from `video_path`
    async fn extract(&self, video_path: &Path) -> Result<AudioTrack>;
}

/// Create the temporary output file
fn create_temp_wav(temp_dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("poise_audio_").suffix(".wav");
    match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .context("Failed to create temporary audio file")
}

// ============================================================================
// Stage 1: ffmpeg
// ============================================================================

/// Primary stage: external ffmpeg process
#[derive(Debug, Clone)]
pub struct FfmpegAudioExtractor {
    binary_path: String,
    temp_dir: Option<PathBuf>,
}

impl FfmpegAudioExtractor {
    pub fn new(binary_path: impl Into<String>, temp_dir: Option<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            temp_dir,
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn extract(&self, video_path: &Path) -> Result<AudioTrack> {
        let file = create_temp_wav(self.temp_dir.as_deref())?;

        debug!(
            video = %video_path.display(),
            output = %file.path().display(),
            "Running ffmpeg audio extraction"
        );

        // ffmpeg -y -i <video> -vn -acodec pcm_s16le -ar 16000 -ac 1 <out.wav>
        let output = tokio::task::spawn_blocking({
            let binary = self.binary_path.clone();
            let input = video_path.to_path_buf();
            let out = file.path().to_path_buf();

            move || {
                Command::new(&binary)
                    .arg("-y")
                    .arg("-i")
                    .arg(&input)
                    .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
                    .arg(&out)
                    .output()
            }
        })
        .await
        .context("ffmpeg task join error")?
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => anyhow::anyhow!("ffmpeg binary not found: {}", self.binary_path),
            _ => anyhow::anyhow!("Failed to execute ffmpeg: {}", e),
        })?;

        if !output.status.success() {
            bail!(
                "ffmpeg exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(AudioTrack {
            file,
            sample_rate: TARGET_SAMPLE_RATE,
            stage: self.name(),
        })
    }
}

// ============================================================================
// Stage 2: in-process decode
// ============================================================================

/// Fallback stage: symphonia decode, rubato resample, hound write
#[derive(Debug, Clone, Default)]
pub struct SymphoniaAudioExtractor {
    temp_dir: Option<PathBuf>,
}

impl SymphoniaAudioExtractor {
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self { temp_dir }
    }
}

#[async_trait]
impl AudioExtractor for SymphoniaAudioExtractor {
    fn name(&self) -> &'static str {
        "symphonia"
    }

    async fn extract(&self, video_path: &Path) -> Result<AudioTrack> {
        let file = create_temp_wav(self.temp_dir.as_deref())?;
        let input = video_path.to_path_buf();
        let out = file.path().to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let (samples, source_rate) = decode_mono(&input)?;
            let resampled = resample_mono(samples, source_rate, TARGET_SAMPLE_RATE)?;
            write_pcm16_wav(&out, &resampled, TARGET_SAMPLE_RATE)
        })
        .await
        .context("Decode task join error")??;

        Ok(AudioTrack {
            file,
            sample_rate: TARGET_SAMPLE_RATE,
            stage: self.name(),
        })
    }
}

/// Decode the first audio track to mono f32 samples
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open media file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe media container")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .context("No audio track found")?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.context("Sample rate unknown")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported audio codec")?;

    let mut mono: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("Error reading packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e).context("Fatal decode error"),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        mono.extend(
            buffer
                .samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if mono.is_empty() {
        bail!("Audio track decoded to zero samples");
    }

    debug!(
        samples = mono.len(),
        sample_rate = sample_rate,
        "Decoded audio track in-process"
    );
    Ok((mono, sample_rate))
}

/// Resample mono audio with a sinc interpolator
fn resample_mono(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .context("Failed to create resampler")?;

    let output = resampler
        .process(&[samples], None)
        .context("Resampling failed")?;

    output
        .into_iter()
        .next()
        .context("Resampler produced no channels")
}

/// Write mono f32 samples as 16-bit PCM WAV
pub fn write_pcm16_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).context("Failed to create WAV writer")?;
    for &s in samples {
        writer
            .write_sample((s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .context("Failed to write sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

// ============================================================================
// Two-stage strategy
// ============================================================================

/// Primary stage with fallback
#[derive(Clone)]
pub struct TwoStageAudioExtractor {
    primary: Arc<dyn AudioExtractor>,
    fallback: Arc<dyn AudioExtractor>,
}

impl TwoStageAudioExtractor {
    pub fn new(primary: Arc<dyn AudioExtractor>, fallback: Arc<dyn AudioExtractor>) -> Self {
        Self { primary, fallback }
    }

    /// ffmpeg first, symphonia second
    pub fn standard(ffmpeg_path: impl Into<String>, temp_dir: Option<PathBuf>) -> Self {
        Self::new(
            Arc::new(FfmpegAudioExtractor::new(ffmpeg_path, temp_dir.clone())),
            Arc::new(SymphoniaAudioExtractor::new(temp_dir)),
        )
    }
}

#[async_trait]
impl AudioExtractor for TwoStageAudioExtractor {
    fn name(&self) -> &'static str {
        "two-stage"
    }

    async fn extract(&self, video_path: &Path) -> Result<AudioTrack> {
        let primary_err = match self.primary.extract(video_path).await {
            Ok(track) => {
                info!(stage = track.stage, "Audio extracted");
                return Ok(track);
            }
            Err(e) => e,
        };

        warn!(
            stage = self.primary.name(),
            error = %primary_err,
            "Primary audio extraction failed, trying fallback"
        );

        match self.fallback.extract(video_path).await {
            Ok(track) => {
                info!(stage = track.stage, "Audio extracted by fallback");
                Ok(track)
            }
            Err(fallback_err) => bail!(
                "{} failed: {:#}; {} failed: {:#}",
                self.primary.name(),
                primary_err,
                self.fallback.name(),
                fallback_err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..32_000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 32_000.0).sin() * 0.5)
            .collect();
        let out = resample_mono(samples, 32_000, 16_000).unwrap();
        // Sinc resampler output length is within a filter length of the ideal
        assert!((out.len() as i64 - 16_000).abs() < 512, "got {}", out.len());
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1f32, -0.2, 0.3];
        assert_eq!(resample_mono(samples.clone(), 16_000, 16_000).unwrap(), samples);
    }

    #[tokio::test]
    async fn test_symphonia_stage_reads_wav() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("source.wav");
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.3)
            .collect();
        write_pcm16_wav(&source, &samples, 16_000).unwrap();

        let extractor = SymphoniaAudioExtractor::new(Some(dir.path().to_path_buf()));
        let track = extractor.extract(&source).await.unwrap();

        let reader = hound::WavReader::open(track.path()).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 16_000);
    }

    #[tokio::test]
    async fn test_track_file_removed_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("source.wav");
        write_pcm16_wav(&source, &[0.0; 1600], 16_000).unwrap();

        let track = SymphoniaAudioExtractor::new(Some(dir.path().to_path_buf()))
            .extract(&source)
            .await
            .unwrap();
        let path = track.path().to_path_buf();
        assert!(path.exists());

        drop(track);
        assert!(!path.exists());
    }
}
