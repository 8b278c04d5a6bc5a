//! Facial confidence analysis
//!
//! Samples every Nth frame, finds the largest face and derives five
//! sub-scores from it:
//!
//! | Sub-score            | Signal                                      | Weight |
//! |----------------------|---------------------------------------------|--------|
//! | `eye_contact`        | Detected eye-region area                    | 0.35   |
//! | `facial_tension`     | Edge density inside the face                | 0.25   |
//! | `head_movement`      | Face-center displacement between samples    | 0.20   |
//! | `smile_authenticity` | Happy/neutral emotion probabilities         | 0.10   |
//! | `blink_rate`         | Eye-closure events per minute               | 0.10   |
//!
//! Per-frame scores are averaged over the frames where a face was found.
//! A frame whose detection or classification fails is skipped.

use crate::analyzers::{AnalysisInput, Analyzer, DecodeTracker};
use crate::error::AnalyzerError;
use crate::media::video::VideoDecoder;
use crate::models::{EmotionClassifier, EmotionScores, EyeDetector, FaceDetector, ModelCache};
use crate::scoring::{round2, BandTable, MeanAccumulator, WeightSet, NEUTRAL_SCORE};
use crate::types::{
    AnalyzerKind, AnalyzerResult, AnalyzerStatus, BoundingBox, FrameSample, SubScore, VideoSource,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Internal weights of the facial composite
pub const FACIAL_WEIGHTS: WeightSet = WeightSet::new(&[
    ("eye_contact", 0.35),
    ("facial_tension", 0.25),
    ("head_movement", 0.20),
    ("smile_authenticity", 0.10),
    ("blink_rate", 0.10),
]);

/// Mean area (px²) of the two largest eye regions
pub const EYE_CONTACT_BANDS: BandTable =
    BandTable::at_least("eye_contact", &[(500.0, 90.0), (300.0, 75.0), (150.0, 60.0)], 40.0);

/// Eye contact when only one eye is visible
pub const ONE_EYE_SCORE: f64 = 30.0;

/// Eye contact when no eye is visible
pub const NO_EYE_SCORE: f64 = 10.0;

/// Sobel edge density inside the face region
pub const TENSION_BANDS: BandTable = BandTable::below(
    "facial_tension",
    &[(0.05, 90.0), (0.10, 75.0), (0.15, 55.0), (0.20, 40.0)],
    20.0,
);

/// Face-center displacement in pixels since the previous sampled face
pub const HEAD_MOVEMENT_BANDS: BandTable = BandTable::below(
    "head_movement",
    &[(5.0, 95.0), (10.0, 80.0), (20.0, 60.0), (30.0, 40.0)],
    25.0,
);

/// Blink rate (per minute) scored 100 inside this inclusive band
pub const OPTIMAL_BLINK_BAND: (f64, f64) = (15.0, 25.0);

/// Blink rate the distance penalty is measured from
pub const OPTIMAL_BLINK_RATE: f64 = 20.0;

/// Points lost per blink/minute away from the optimum
pub const BLINK_PENALTY_PER_UNIT: f64 = 2.0;

/// Facial confidence analyzer
pub struct FacialConfidenceAnalyzer {
    models: Arc<ModelCache>,
    decoder: Arc<dyn VideoDecoder>,
    frame_stride: u32,
}

impl FacialConfidenceAnalyzer {
    pub fn new(models: Arc<ModelCache>, decoder: Arc<dyn VideoDecoder>, frame_stride: u32) -> Self {
        Self {
            models,
            decoder,
            frame_stride: frame_stride.max(1),
        }
    }

    /// Score facial behaviour over a video
    ///
    /// # Errors
    /// Fails when a required detector cannot be loaded, or the video cannot
    /// be opened or decodes to nothing. Individual frame failures are skipped.
    pub fn analyze_video(&self, video: &VideoSource) -> Result<AnalyzerResult, AnalyzerError> {
        let face_detector = self.models.face_detector()?;
        let eye_detector = self.models.eye_detector()?;
        let emotion = self.models.emotion_classifier();

        let frames = self
            .decoder
            .open(video, self.frame_stride)
            .map_err(|e| AnalyzerError::Decode(format!("{:#}", e)))?;

        let detectors = Detectors {
            face: face_detector.as_ref(),
            eyes: eye_detector.as_ref(),
            emotion: emotion.as_deref(),
        };

        let mut tally = FacialTally::default();
        let mut decode = DecodeTracker::default();
        let mut frames_sampled: u64 = 0;

        for item in frames {
            frames_sampled += 1;
            let Some(frame) = decode.accept(item) else {
                continue;
            };

            match detectors.observe(&frame, tally.previous_center) {
                Ok(Some(observation)) => tally.record(observation),
                Ok(None) => {}
                Err(e) => debug!(frame = frame.index, error = %e, "Skipping frame after detection failure"),
            }
        }

        decode.finish()?;

        let duration_minutes = sampled_duration_seconds(video, frames_sampled, self.frame_stride) / 60.0;
        let result = tally.finish(duration_minutes);

        info!(
            analyzer = "facial",
            frames_sampled,
            frames_analyzed = tally.frames_analyzed(),
            score = result.composite_score,
            "Facial analysis complete"
        );

        Ok(result.with_metric("frames_sampled", frames_sampled))
    }
}

impl Analyzer for FacialConfidenceAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Facial
    }

    fn analyze(&self, input: &AnalysisInput) -> Result<AnalyzerResult, AnalyzerError> {
        self.analyze_video(&input.video)
    }
}

/// Video duration, or an estimate from the sampled frame count when unknown
fn sampled_duration_seconds(video: &VideoSource, frames_sampled: u64, stride: u32) -> f64 {
    if video.duration_seconds > 0.0 {
        video.duration_seconds
    } else if video.frame_rate > 0.0 {
        (frames_sampled * stride as u64) as f64 / video.frame_rate
    } else {
        0.0
    }
}

struct Detectors<'a> {
    face: &'a dyn FaceDetector,
    eyes: &'a dyn EyeDetector,
    emotion: Option<&'a dyn EmotionClassifier>,
}

/// Per-frame measurements for a frame with a face
#[derive(Debug, Clone, PartialEq)]
struct FrameObservation {
    eye_contact: f64,
    tension: f64,
    head_movement: f64,
    smile: f64,
    eyes_detected: usize,
    center: (f64, f64),
}

impl Detectors<'_> {
    /// Measure one frame; `Ok(None)` when no face is present
    fn observe(
        &self,
        frame: &FrameSample,
        previous_center: Option<(f64, f64)>,
    ) -> anyhow::Result<Option<FrameObservation>> {
        let gray = frame.image.to_gray();
        let faces = self.face.detect_faces(&gray)?;
        let Some(face) = largest(&faces) else {
            return Ok(None);
        };

        let face_gray = gray.crop(&face);
        let eyes = self.eyes.detect_eyes(&face_gray)?;

        let smile = match self.emotion {
            Some(classifier) => smile_score(&classifier.classify(&frame.image.crop(&face))?),
            None => NEUTRAL_SCORE,
        };

        let center = face.center();
        Ok(Some(FrameObservation {
            eye_contact: eye_contact_score(&eyes),
            tension: TENSION_BANDS.score(face_gray.edge_density()),
            head_movement: head_movement_score(previous_center, center),
            smile,
            eyes_detected: eyes.len(),
            center,
        }))
    }
}

fn largest(boxes: &[BoundingBox]) -> Option<BoundingBox> {
    boxes.iter().copied().max_by_key(|b| b.area())
}

/// Eye-contact score from the detected eye regions
pub fn eye_contact_score(eyes: &[BoundingBox]) -> f64 {
    match eyes.len() {
        0 => NO_EYE_SCORE,
        1 => ONE_EYE_SCORE,
        _ => {
            let mut areas: Vec<u64> = eyes.iter().map(|e| e.area()).collect();
            areas.sort_unstable_by(|a, b| b.cmp(a));
            let mean_area = (areas[0] + areas[1]) as f64 / 2.0;
            EYE_CONTACT_BANDS.score(mean_area)
        }
    }
}

/// Head-stability score; the first sampled face is neutral
pub fn head_movement_score(previous: Option<(f64, f64)>, current: (f64, f64)) -> f64 {
    match previous {
        None => NEUTRAL_SCORE,
        Some((px, py)) => {
            let displacement = ((current.0 - px).powi(2) + (current.1 - py).powi(2)).sqrt();
            HEAD_MOVEMENT_BANDS.score(displacement)
        }
    }
}

/// Smile-authenticity score from an emotion distribution
///
/// The top tier needs a clearly happy face that still carries some neutral
/// expression; a purely happy reading is treated as a posed smile.
pub fn smile_score(emotions: &EmotionScores) -> f64 {
    let emotions = emotions.normalized();
    let happy = emotions.probability("happy");
    let neutral = emotions.probability("neutral");

    if happy >= 0.6 && neutral >= 0.2 {
        85.0
    } else if happy >= 0.6 {
        70.0
    } else if happy >= 0.3 {
        60.0
    } else if happy >= 0.1 {
        45.0
    } else {
        30.0
    }
}

/// Blink-rate score: 100 inside the optimal band, linear penalty outside
pub fn blink_rate_score(blinks_per_minute: f64) -> f64 {
    let (low, high) = OPTIMAL_BLINK_BAND;
    if (low..=high).contains(&blinks_per_minute) {
        100.0
    } else {
        (100.0 - BLINK_PENALTY_PER_UNIT * (blinks_per_minute - OPTIMAL_BLINK_RATE).abs()).max(0.0)
    }
}

/// Counts eye-closure events over consecutive analyzed frames
///
/// A run of frames with fewer than two eyes is one event, however long.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlinkCounter {
    events: u32,
    eyes_closed: bool,
}

impl BlinkCounter {
    pub fn observe(&mut self, eyes_detected: usize) {
        if eyes_detected < 2 {
            if !self.eyes_closed {
                self.events += 1;
                self.eyes_closed = true;
            }
        } else {
            self.eyes_closed = false;
        }
    }

    pub fn events(&self) -> u32 {
        self.events
    }
}

#[derive(Debug, Default)]
struct FacialTally {
    eye_contact: MeanAccumulator,
    tension: MeanAccumulator,
    head_movement: MeanAccumulator,
    smile: MeanAccumulator,
    blinks: BlinkCounter,
    previous_center: Option<(f64, f64)>,
}

impl FacialTally {
    fn record(&mut self, observation: FrameObservation) {
        self.eye_contact.push(observation.eye_contact);
        self.tension.push(observation.tension);
        self.head_movement.push(observation.head_movement);
        self.smile.push(observation.smile);
        self.blinks.observe(observation.eyes_detected);
        self.previous_center = Some(observation.center);
    }

    fn frames_analyzed(&self) -> usize {
        self.eye_contact.count()
    }

    fn finish(&self, duration_minutes: f64) -> AnalyzerResult {
        let frames_analyzed = self.frames_analyzed();
        if frames_analyzed == 0 {
            let zeros = FACIAL_WEIGHTS
                .entries
                .iter()
                .map(|(name, _)| SubScore::new(*name, 0.0))
                .collect();
            return AnalyzerResult::scored(AnalyzerKind::Facial, zeros)
                .with_status(AnalyzerStatus::NoSubjectDetected)
                .with_metric("frames_analyzed", 0)
                .with_metric("blink_count", 0)
                .with_metric("blinks_per_minute", 0.0);
        }

        let blink_count = self.blinks.events();
        let blinks_per_minute = if duration_minutes > 0.0 {
            blink_count as f64 / duration_minutes
        } else {
            0.0
        };

        AnalyzerResult::scored(
            AnalyzerKind::Facial,
            vec![
                SubScore::new("eye_contact", self.eye_contact.mean_or(0.0)),
                SubScore::new("facial_tension", self.tension.mean_or(0.0)),
                SubScore::new("head_movement", self.head_movement.mean_or(NEUTRAL_SCORE)),
                SubScore::new("smile_authenticity", self.smile.mean_or(NEUTRAL_SCORE)),
                SubScore::new("blink_rate", blink_rate_score(blinks_per_minute)),
            ],
        )
        .with_metric("frames_analyzed", frames_analyzed as u64)
        .with_metric("blink_count", blink_count)
        .with_metric("blinks_per_minute", round2(blinks_per_minute))
    }
}
