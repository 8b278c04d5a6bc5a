//! Body-language confidence analysis
//!
//! Samples every Nth frame and runs pose estimation. Four landmark
//! heuristics are averaged over the frames where their landmarks are
//! visible:
//!
//! | Sub-score            | Signal                                        | Weight |
//! |----------------------|-----------------------------------------------|--------|
//! | `posture`            | Shoulder/hip midline offset + head-forward    | 0.40   |
//! | `hand_gestures`      | Wrist height relative to shoulders            | 0.25   |
//! | `body_openness`      | Shoulder width / hip width                    | 0.20   |
//! | `shoulder_alignment` | Vertical shoulder difference                  | 0.15   |
//!
//! When the pose capability is unavailable the analyzer short-circuits to a
//! neutral result without touching the video.

use crate::analyzers::{AnalysisInput, Analyzer, DecodeTracker};
use crate::error::AnalyzerError;
use crate::media::video::VideoDecoder;
use crate::models::{LandmarkName, ModelCache, PoseLandmarks};
use crate::scoring::{BandTable, MeanAccumulator, WeightSet, NEUTRAL_SCORE};
use crate::types::{AnalyzerKind, AnalyzerResult, AnalyzerStatus, SubScore, VideoSource};
use std::sync::Arc;
use tracing::{debug, info};

/// Internal weights of the body composite
pub const BODY_WEIGHTS: WeightSet = WeightSet::new(&[
    ("posture", 0.40),
    ("hand_gestures", 0.25),
    ("body_openness", 0.20),
    ("shoulder_alignment", 0.15),
]);

/// Combined horizontal offset (normalised units) of hips and nose from the shoulder midline
pub const POSTURE_BANDS: BandTable = BandTable::below(
    "posture",
    &[(0.05, 90.0), (0.10, 75.0), (0.15, 60.0), (0.25, 40.0)],
    20.0,
);

/// Shoulder y minus mean wrist y; positive means hands above shoulders
pub const GESTURE_BANDS: BandTable = BandTable::at_least(
    "hand_gestures",
    &[(0.0, 85.0), (-0.1, 70.0), (-0.2, 55.0), (-0.3, 40.0)],
    25.0,
);

/// Shoulder width divided by hip width
pub const OPENNESS_BANDS: BandTable = BandTable::at_least(
    "body_openness",
    &[(1.3, 90.0), (1.15, 75.0), (1.0, 60.0), (0.85, 40.0)],
    25.0,
);

/// Absolute vertical difference between the shoulders
pub const ALIGNMENT_BANDS: BandTable = BandTable::below(
    "shoulder_alignment",
    &[(0.02, 90.0), (0.04, 75.0), (0.07, 55.0), (0.10, 40.0)],
    25.0,
);

/// Body confidence analyzer
pub struct BodyConfidenceAnalyzer {
    models: Arc<ModelCache>,
    decoder: Arc<dyn VideoDecoder>,
    frame_stride: u32,
}

impl BodyConfidenceAnalyzer {
    pub fn new(models: Arc<ModelCache>, decoder: Arc<dyn VideoDecoder>, frame_stride: u32) -> Self {
        Self {
            models,
            decoder,
            frame_stride: frame_stride.max(1),
        }
    }

    /// Fixed neutral report used when pose estimation is unavailable
    pub fn unavailable_result() -> AnalyzerResult {
        AnalyzerResult::neutral(AnalyzerKind::Body, AnalyzerStatus::CapabilityUnavailable)
            .with_metric("frames_analyzed", 0)
            .with_metric("pose_available", false)
    }

    /// Score body language over a video
    ///
    /// # Errors
    /// Fails when the video cannot be opened or decodes to nothing.
    pub fn analyze_video(&self, video: &VideoSource) -> Result<AnalyzerResult, AnalyzerError> {
        let Some(pose) = self.models.pose_model() else {
            debug!("Pose estimation unavailable, returning neutral body result");
            return Ok(Self::unavailable_result());
        };

        let frames = self
            .decoder
            .open(video, self.frame_stride)
            .map_err(|e| AnalyzerError::Decode(format!("{:#}", e)))?;

        let mut tally = BodyTally::default();
        let mut decode = DecodeTracker::default();
        for item in frames {
            let Some(frame) = decode.accept(item) else {
                continue;
            };

            match pose.estimate(&frame.image) {
                Ok(Some(landmarks)) => tally.record(&landmarks),
                Ok(None) => {}
                Err(e) => debug!(frame = frame.index, error = %e, "Skipping frame after pose failure"),
            }
        }

        decode.finish()?;

        let result = tally.finish();
        info!(
            analyzer = "body",
            frames_analyzed = tally.frames_analyzed,
            score = result.composite_score,
            "Body analysis complete"
        );
        Ok(result)
    }
}

impl Analyzer for BodyConfidenceAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Body
    }

    fn analyze(&self, input: &AnalysisInput) -> Result<AnalyzerResult, AnalyzerError> {
        self.analyze_video(&input.video)
    }
}

fn midpoint(a: crate::models::Landmark, b: crate::models::Landmark) -> (f64, f64) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Posture score; needs both shoulders and both hips, nose optional
pub fn posture_score(pose: &PoseLandmarks) -> Option<f64> {
    let shoulders = midpoint(
        pose.get(LandmarkName::LeftShoulder)?,
        pose.get(LandmarkName::RightShoulder)?,
    );
    let hips = midpoint(pose.get(LandmarkName::LeftHip)?, pose.get(LandmarkName::RightHip)?);

    let lean = (shoulders.0 - hips.0).abs();
    let head_forward = pose
        .get(LandmarkName::Nose)
        .map(|nose| (nose.x - shoulders.0).abs())
        .unwrap_or(0.0);

    Some(POSTURE_BANDS.score(lean + head_forward))
}

/// Hand-gesture score; needs both shoulders and at least one wrist
pub fn gesture_score(pose: &PoseLandmarks) -> Option<f64> {
    let shoulder_y = midpoint(
        pose.get(LandmarkName::LeftShoulder)?,
        pose.get(LandmarkName::RightShoulder)?,
    )
    .1;

    let wrists: Vec<f64> = [LandmarkName::LeftWrist, LandmarkName::RightWrist]
        .into_iter()
        .filter_map(|name| pose.get(name))
        .map(|w| w.y)
        .collect();
    if wrists.is_empty() {
        return None;
    }
    let wrist_y = wrists.iter().sum::<f64>() / wrists.len() as f64;

    // Image y grows downwards
    Some(GESTURE_BANDS.score(shoulder_y - wrist_y))
}

/// Openness score; needs both shoulders and both hips
pub fn openness_score(pose: &PoseLandmarks) -> Option<f64> {
    let shoulder_width = (pose.get(LandmarkName::LeftShoulder)?.x - pose.get(LandmarkName::RightShoulder)?.x).abs();
    let hip_width = (pose.get(LandmarkName::LeftHip)?.x - pose.get(LandmarkName::RightHip)?.x).abs();
    if hip_width <= f64::EPSILON {
        return None;
    }
    Some(OPENNESS_BANDS.score(shoulder_width / hip_width))
}

/// Shoulder alignment score; needs both shoulders
pub fn alignment_score(pose: &PoseLandmarks) -> Option<f64> {
    let left = pose.get(LandmarkName::LeftShoulder)?;
    let right = pose.get(LandmarkName::RightShoulder)?;
    Some(ALIGNMENT_BANDS.score((left.y - right.y).abs()))
}

#[derive(Debug, Default)]
struct BodyTally {
    posture: MeanAccumulator,
    gestures: MeanAccumulator,
    openness: MeanAccumulator,
    alignment: MeanAccumulator,
    frames_analyzed: u64,
}

impl BodyTally {
    fn record(&mut self, pose: &PoseLandmarks) {
        self.frames_analyzed += 1;
        if let Some(score) = posture_score(pose) {
            self.posture.push(score);
        }
        if let Some(score) = gesture_score(pose) {
            self.gestures.push(score);
        }
        if let Some(score) = openness_score(pose) {
            self.openness.push(score);
        }
        if let Some(score) = alignment_score(pose) {
            self.alignment.push(score);
        }
    }

    fn finish(&self) -> AnalyzerResult {
        if self.frames_analyzed == 0 {
            return AnalyzerResult::neutral(AnalyzerKind::Body, AnalyzerStatus::NoSubjectDetected)
                .with_metric("frames_analyzed", 0)
                .with_metric("pose_available", true);
        }

        AnalyzerResult::scored(
            AnalyzerKind::Body,
            vec![
                SubScore::new("posture", self.posture.mean_or(NEUTRAL_SCORE)),
                SubScore::new("hand_gestures", self.gestures.mean_or(NEUTRAL_SCORE)),
                SubScore::new("body_openness", self.openness.mean_or(NEUTRAL_SCORE)),
                SubScore::new("shoulder_alignment", self.alignment.mean_or(NEUTRAL_SCORE)),
            ],
        )
        .with_metric("frames_analyzed", self.frames_analyzed)
        .with_metric("pose_available", true)
    }
}
