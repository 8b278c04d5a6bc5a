//! Video probing and frame sampling
//!
//! `VideoDecoder::open` hands out an independent cursor per call, so the
//! facial and body analyzers decode the same file without sharing state.
//!
//! The shipped implementation drives the ffmpeg command-line tools:
//! `ffprobe` for stream metadata and `ffmpeg` piping raw `rgb24` frames
//! filtered down to every Nth frame. ffmpeg applies display-matrix rotation
//! to its output, so probed dimensions are reported in display orientation.

use crate::media::frame::RgbFrame;
use crate::types::{FrameSample, VideoSource};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Stream of sampled frames; each item is one frame or a decode failure
pub type FrameStream = Box<dyn Iterator<Item = Result<FrameSample>> + Send>;

/// Video decoding collaborator
pub trait VideoDecoder: Send + Sync {
    /// Read duration, frame rate and dimensions
    fn probe(&self, path: &Path) -> Result<VideoSource>;

    /// Open a fresh cursor yielding every `stride`-th frame
    fn open(&self, video: &VideoSource, stride: u32) -> Result<FrameStream>;
}

/// ffprobe-based prober and ffmpeg-pipe frame reader
#[derive(Debug, Clone)]
pub struct FfmpegVideoDecoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegVideoDecoder {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl Default for FfmpegVideoDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

/// Subset of `ffprobe -of json` output
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

/// Legacy rotation tag (ffmpeg < 5)
#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

/// Display matrix side data (ffmpeg >= 5)
#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, side data taking precedence over tags
    fn rotation_degrees(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }

    /// Quarter turns swap width and height in ffmpeg's autorotated output
    fn is_quarter_turn(&self) -> bool {
        (self.rotation_degrees().round() as i64).rem_euclid(180) == 90
    }
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rational such as "30000/1001"
fn parse_rational(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => value.trim().parse().ok(),
    }
}

fn parse_probe_output(path: &Path, json: &str) -> Result<VideoSource> {
    let probe: ProbeOutput = serde_json::from_str(json).context("Failed to parse ffprobe output")?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .context("No video stream found")?;

    let coded_width = stream.width.context("Video width unknown")?;
    let coded_height = stream.height.context("Video height unknown")?;
    let (width, height) = if stream.is_quarter_turn() {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };
    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .filter(|r| *r > 0.0)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational))
        .filter(|r| *r > 0.0)
        .context("Frame rate unknown")?;

    // webm streams often omit per-stream duration; the container usually has it
    let duration_seconds = stream
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .format
                .and_then(|f| f.duration)
                .and_then(|d| d.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Ok(VideoSource {
        path: path.to_path_buf(),
        duration_seconds,
        frame_rate,
        width,
        height,
    })
}

impl VideoDecoder for FfmpegVideoDecoder {
    fn probe(&self, path: &Path) -> Result<VideoSource> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate,duration:stream_tags=rotate:stream_side_data=rotation:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => anyhow::anyhow!("ffprobe binary not found: {}", self.ffprobe_path),
                _ => anyhow::anyhow!("Failed to execute ffprobe: {}", e),
            })?;

        if !output.status.success() {
            bail!(
                "ffprobe failed (exit code {:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let video = parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            width = video.width,
            height = video.height,
            fps = video.frame_rate,
            duration = video.duration_seconds,
            "Probed video"
        );
        Ok(video)
    }

    fn open(&self, video: &VideoSource, stride: u32) -> Result<FrameStream> {
        let stride = stride.max(1);
        let filter = format!("select=not(mod(n\\,{}))", stride);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-i"])
            .arg(&video.path)
            .args(["-vf", &filter, "-vsync", "0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => anyhow::anyhow!("ffmpeg binary not found: {}", self.ffmpeg_path),
                _ => anyhow::anyhow!("Failed to spawn ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take().context("ffmpeg stdout not captured")?;
        let stderr = child.stderr.take().context("ffmpeg stderr not captured")?;

        // Drained on its own thread so a chatty ffmpeg never blocks on a full pipe
        let stderr_reader = std::thread::spawn(move || {
            let mut stderr = stderr;
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        });

        Ok(Box::new(FfmpegFrameStream {
            child,
            stdout,
            stderr_reader: Some(stderr_reader),
            video: video.clone(),
            stride: stride as u64,
            sampled: 0,
            finished: false,
        }))
    }
}

/// Cursor over an ffmpeg raw-video pipe; the process is reaped on drop
///
/// A non-zero ffmpeg exit surfaces as a final `Err` item carrying its stderr.
struct FfmpegFrameStream {
    child: Child,
    stdout: ChildStdout,
    stderr_reader: Option<JoinHandle<String>>,
    video: VideoSource,
    stride: u64,
    sampled: u64,
    finished: bool,
}

impl Iterator for FfmpegFrameStream {
    type Item = Result<FrameSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let frame_bytes = self.video.width as usize * self.video.height as usize * 3;
        let mut buffer = vec![0u8; frame_bytes];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finished = true;
                return self.exit_status_error().map(Err);
            }
            Err(e) => {
                self.finished = true;
                return Some(Err(e).context("Failed to read frame from ffmpeg"));
            }
        }

        let index = self.sampled * self.stride;
        self.sampled += 1;

        let image = RgbFrame::from_raw(self.video.width, self.video.height, buffer)
            .context("Frame buffer size mismatch");
        Some(image.map(|image| FrameSample {
            index,
            timestamp_seconds: self.video.timestamp_of(index),
            image,
        }))
    }
}

impl FfmpegFrameStream {
    /// Reap ffmpeg after EOF; `Some` when it exited unsuccessfully
    fn exit_status_error(&mut self) -> Option<anyhow::Error> {
        let status = match self.child.wait() {
            Ok(status) => status,
            Err(e) => return Some(anyhow::anyhow!("Failed to wait for ffmpeg: {}", e)),
        };
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if status.success() {
            return None;
        }

        warn!(
            path = %self.video.path.display(),
            exit_code = ?status.code(),
            frames = self.sampled,
            "ffmpeg frame decode failed"
        );
        Some(anyhow::anyhow!(
            "ffmpeg failed (exit code {:?}): {}",
            status.code(),
            stderr.trim()
        ))
    }
}

impl Drop for FfmpegFrameStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("30/1"), Some(30.0));
        assert!((parse_rational("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("25"), Some(25.0));
    }

    #[test]
    fn test_parse_probe_output_uses_container_duration() {
        let json = r#"{
            "streams": [{"width": 640, "height": 480, "avg_frame_rate": "0/0", "r_frame_rate": "30/1"}],
            "format": {"duration": "12.500000"}
        }"#;
        let video = parse_probe_output(Path::new("/tmp/clip.webm"), json).unwrap();
        assert_eq!(video.width, 640);
        assert_eq!(video.height, 480);
        assert_eq!(video.frame_rate, 30.0);
        assert_eq!(video.duration_seconds, 12.5);
    }

    #[test]
    fn test_parse_probe_output_swaps_dimensions_for_rotated_stream() {
        let json = r#"{
            "streams": [{
                "width": 1920, "height": 1080, "avg_frame_rate": "30/1", "duration": "8.0",
                "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]
            }]
        }"#;
        let video = parse_probe_output(Path::new("/tmp/phone.mp4"), json).unwrap();
        assert_eq!((video.width, video.height), (1080, 1920));
    }

    #[test]
    fn test_parse_probe_output_reads_legacy_rotate_tag() {
        let upside_down = r#"{"streams": [{"width": 1280, "height": 720, "r_frame_rate": "25/1",
            "tags": {"rotate": "180"}}]}"#;
        let video = parse_probe_output(Path::new("/tmp/a.mov"), upside_down).unwrap();
        assert_eq!((video.width, video.height), (1280, 720));

        let portrait = r#"{"streams": [{"width": 1280, "height": 720, "r_frame_rate": "25/1",
            "tags": {"rotate": "270"}}]}"#;
        let video = parse_probe_output(Path::new("/tmp/b.mov"), portrait).unwrap();
        assert_eq!((video.width, video.height), (720, 1280));
    }

    #[cfg(unix)]
    #[test]
    fn test_ffmpeg_nonzero_exit_is_stream_error() {
        let decoder = FfmpegVideoDecoder::new("false", "ffprobe");
        let video = VideoSource {
            path: "/tmp/missing.webm".into(),
            duration_seconds: 1.0,
            frame_rate: 30.0,
            width: 4,
            height: 4,
        };
        let items: Vec<_> = decoder.open(&video, 1).unwrap().collect();
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert!(format!("{:#}", err).contains("ffmpeg failed"));
    }

    #[test]
    fn test_parse_probe_output_without_video_stream() {
        let json = r#"{"streams": [], "format": {"duration": "3.0"}}"#;
        assert!(parse_probe_output(Path::new("/tmp/audio.wav"), json).is_err());
    }
}
