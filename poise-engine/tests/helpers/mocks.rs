//! Mock collaborators
//!
//! Deterministic stand-ins for the video decoder, audio extractor and the
//! model family so orchestration can be tested without ffmpeg or model files.

use super::audio_generator::{generate_test_wav, AudioConfig};
use anyhow::{bail, Result};
use async_trait::async_trait;
use poise_engine::analyzers::{AnalysisInput, Analyzer};
use poise_engine::media::frame::{GrayFrame, RgbFrame};
use poise_engine::media::{AudioExtractor, AudioTrack, FrameStream, VideoDecoder};
use poise_engine::models::{
    EmotionClassifier, EmotionScores, EyeDetector, FaceDetector, Landmark, LandmarkName, ModelCache,
    PoseEstimator, PoseLandmarks, RecognitionResult, SpeechModel, SpeechRecognizer,
};
use poise_engine::types::{BoundingBox, FrameSample, VideoSource, WordToken};
use poise_engine::{AnalyzerError, AnalyzerKind, AnalyzerResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Video
// ============================================================================

/// Decoder yielding `frame_count` sampled gray frames
pub struct MockVideoDecoder {
    pub duration_seconds: f64,
    pub frame_rate: f64,
    pub frame_count: usize,
    pub opens: AtomicUsize,
}

impl MockVideoDecoder {
    /// 10 seconds at 30 fps, 10 sampled frames at stride 30
    pub fn new() -> Self {
        Self {
            duration_seconds: 10.0,
            frame_rate: 30.0,
            frame_count: 10,
            opens: AtomicUsize::new(0),
        }
    }
}

impl VideoDecoder for MockVideoDecoder {
    fn probe(&self, path: &Path) -> Result<VideoSource> {
        Ok(VideoSource {
            path: path.to_path_buf(),
            duration_seconds: self.duration_seconds,
            frame_rate: self.frame_rate,
            width: 64,
            height: 48,
        })
    }

    fn open(&self, video: &VideoSource, stride: u32) -> Result<FrameStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let video = video.clone();
        let frames = (0..self.frame_count).map(move |i| {
            let index = i as u64 * stride as u64;
            Ok(FrameSample {
                index,
                timestamp_seconds: video.timestamp_of(index),
                image: RgbFrame::filled(video.width, video.height, [128, 128, 128]),
            })
        });
        Ok(Box::new(frames))
    }
}

/// Decoder that cannot read anything
pub struct UnreadableVideoDecoder;

impl VideoDecoder for UnreadableVideoDecoder {
    fn probe(&self, _path: &Path) -> Result<VideoSource> {
        bail!("moov atom not found")
    }

    fn open(&self, _video: &VideoSource, _stride: u32) -> Result<FrameStream> {
        bail!("moov atom not found")
    }
}

/// Decoder that probes fine but whose frame stream breaks
///
/// `Failing` mimics ffmpeg exiting non-zero before writing a frame;
/// `Empty` mimics a stream that ends without yielding anything.
pub enum BrokenStreamDecoder {
    Failing,
    Empty,
}

impl VideoDecoder for BrokenStreamDecoder {
    fn probe(&self, path: &Path) -> Result<VideoSource> {
        MockVideoDecoder::new().probe(path)
    }

    fn open(&self, _video: &VideoSource, _stride: u32) -> Result<FrameStream> {
        match self {
            BrokenStreamDecoder::Failing => Ok(Box::new(std::iter::once(Err(anyhow::anyhow!(
                "ffmpeg failed (exit code Some(1)): Decoder (codec av1) not found"
            ))))),
            BrokenStreamDecoder::Empty => Ok(Box::new(std::iter::empty())),
        }
    }
}

// ============================================================================
// Audio
// ============================================================================

/// Extractor writing a generated WAV into a temp file
pub struct GeneratedAudioExtractor {
    pub config: AudioConfig,
    pub temp_dir: PathBuf,
    pub last_path: Mutex<Option<PathBuf>>,
}

impl GeneratedAudioExtractor {
    pub fn new(temp_dir: &Path, config: AudioConfig) -> Self {
        Self {
            config,
            temp_dir: temp_dir.to_path_buf(),
            last_path: Mutex::new(None),
        }
    }

    /// Path of the most recently extracted track
    pub fn last_path(&self) -> Option<PathBuf> {
        self.last_path.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioExtractor for GeneratedAudioExtractor {
    fn name(&self) -> &'static str {
        "generated"
    }

    async fn extract(&self, _video_path: &Path) -> Result<AudioTrack> {
        let file = tempfile::Builder::new()
            .prefix("poise_test_")
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)?;
        generate_test_wav(file.path(), &self.config)?;
        *self.last_path.lock().unwrap() = Some(file.path().to_path_buf());
        Ok(AudioTrack::from_temp_file(file, self.config.sample_rate, self.name()))
    }
}

/// Extractor where every stage fails
pub struct FailingAudioExtractor;

#[async_trait]
impl AudioExtractor for FailingAudioExtractor {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn extract(&self, _video_path: &Path) -> Result<AudioTrack> {
        bail!("ffmpeg failed: no audio stream; symphonia failed: unsupported codec")
    }
}

// ============================================================================
// Models
// ============================================================================

pub struct FixedFaceDetector(pub Option<BoundingBox>);

impl FaceDetector for FixedFaceDetector {
    fn detect_faces(&self, _frame: &GrayFrame) -> Result<Vec<BoundingBox>> {
        Ok(self.0.into_iter().collect())
    }
}

pub struct FixedEyeDetector(pub Vec<BoundingBox>);

impl EyeDetector for FixedEyeDetector {
    fn detect_eyes(&self, _face: &GrayFrame) -> Result<Vec<BoundingBox>> {
        Ok(self.0.clone())
    }
}

pub struct FixedEmotion(pub f64, pub f64);

impl EmotionClassifier for FixedEmotion {
    fn classify(&self, _face: &RgbFrame) -> Result<EmotionScores> {
        let mut scores = BTreeMap::new();
        scores.insert("happy".to_string(), self.0);
        scores.insert("neutral".to_string(), self.1);
        scores.insert("sad".to_string(), (1.0 - self.0 - self.1).max(0.0));
        Ok(EmotionScores(scores))
    }
}

pub struct FixedPose(pub Option<PoseLandmarks>);

impl PoseEstimator for FixedPose {
    fn estimate(&self, _frame: &RgbFrame) -> Result<Option<PoseLandmarks>> {
        Ok(self.0.clone())
    }
}

/// Upright, level, open stance with hands just below the shoulders
pub fn confident_pose() -> PoseLandmarks {
    PoseLandmarks::default()
        .with(LandmarkName::Nose, Landmark::new(0.50, 0.20, 0.99))
        .with(LandmarkName::LeftShoulder, Landmark::new(0.35, 0.40, 0.99))
        .with(LandmarkName::RightShoulder, Landmark::new(0.65, 0.40, 0.99))
        .with(LandmarkName::LeftHip, Landmark::new(0.40, 0.80, 0.99))
        .with(LandmarkName::RightHip, Landmark::new(0.60, 0.80, 0.99))
        .with(LandmarkName::LeftWrist, Landmark::new(0.30, 0.45, 0.99))
        .with(LandmarkName::RightWrist, Landmark::new(0.70, 0.45, 0.99))
}

/// Speech model whose recognizer emits one fixed utterance at the end
pub struct ScriptedSpeechModel {
    pub text: String,
    pub words: Vec<WordToken>,
}

impl ScriptedSpeechModel {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            words: Vec::new(),
        }
    }
}

impl SpeechModel for ScriptedSpeechModel {
    fn recognizer(&self, _sample_rate: u32) -> Result<Box<dyn SpeechRecognizer>> {
        Ok(Box::new(ScriptedRecognizer {
            result: Some(RecognitionResult {
                text: self.text.clone(),
                words: self.words.clone(),
            }),
        }))
    }
}

struct ScriptedRecognizer {
    result: Option<RecognitionResult>,
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn accept_waveform(&mut self, _pcm: &[i16]) -> Result<bool> {
        Ok(false)
    }

    fn result(&mut self) -> RecognitionResult {
        RecognitionResult::default()
    }

    fn final_result(&mut self) -> RecognitionResult {
        self.result.take().unwrap_or_default()
    }
}

/// Options for `model_cache`
pub struct MockModels {
    pub face: Option<BoundingBox>,
    pub eyes: Vec<BoundingBox>,
    pub emotion: Option<(f64, f64)>,
    pub pose: Option<PoseLandmarks>,
    pub pose_capability: bool,
    pub transcript: String,
}

impl Default for MockModels {
    fn default() -> Self {
        Self {
            face: Some(BoundingBox::new(16, 8, 32, 32)),
            eyes: vec![BoundingBox::new(4, 8, 24, 24), BoundingBox::new(20, 8, 24, 24)],
            emotion: Some((0.7, 0.25)),
            pose: Some(confident_pose()),
            pose_capability: true,
            transcript: "I led the migration and we shipped it on time".to_string(),
        }
    }
}

/// Build a ModelCache from mock models; `loads` counts loader calls
pub fn model_cache(options: MockModels, loads: Arc<AtomicUsize>) -> ModelCache {
    let MockModels {
        face,
        eyes,
        emotion,
        pose,
        pose_capability,
        transcript,
    } = options;

    let mut builder = ModelCache::builder()
        .speech_model({
            let loads = Arc::clone(&loads);
            move || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(ScriptedSpeechModel::new(&transcript)) as Arc<dyn SpeechModel>)
            }
        })
        .face_detector({
            let loads = Arc::clone(&loads);
            move || {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(FixedFaceDetector(face)) as Arc<dyn FaceDetector>)
            }
        })
        .eye_detector(move || Ok(Arc::new(FixedEyeDetector(eyes.clone())) as Arc<dyn EyeDetector>));

    if let Some((happy, neutral)) = emotion {
        builder = builder
            .emotion_classifier(move || Ok(Arc::new(FixedEmotion(happy, neutral)) as Arc<dyn EmotionClassifier>));
    }

    if pose_capability {
        builder = builder.pose_model(move || Ok(Arc::new(FixedPose(pose.clone())) as Arc<dyn PoseEstimator>));
    }

    builder.build()
}

// ============================================================================
// Analyzers
// ============================================================================

/// Analyzer that panics mid-run
pub struct PanickingAnalyzer(pub AnalyzerKind);

impl Analyzer for PanickingAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        self.0
    }

    fn analyze(&self, _input: &AnalysisInput) -> Result<AnalyzerResult, AnalyzerError> {
        panic!("frame buffer corrupted")
    }
}

/// Analyzer that fails with an error
pub struct ErroringAnalyzer(pub AnalyzerKind);

impl Analyzer for ErroringAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        self.0
    }

    fn analyze(&self, _input: &AnalysisInput) -> Result<AnalyzerResult, AnalyzerError> {
        Err(AnalyzerError::Decode("stream ended unexpectedly".to_string()))
    }
}
