//! Model collaborator interfaces
//!
//! Heavyweight models (speech recognition, detection, pose) live outside this
//! crate. The engine talks to them through these traits and shares one
//! instance of each through `ModelCache`.
//!
//! All calls are synchronous and CPU-bound; analyzers invoke them from
//! blocking worker threads.

pub mod cache;

pub use cache::{ModelCache, ModelCacheBuilder};

use crate::media::frame::{GrayFrame, RgbFrame};
use crate::types::{BoundingBox, WordToken};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Speech
// ============================================================================

/// Loaded speech model; creates one streaming recognizer per request
pub trait SpeechModel: Send + Sync {
    /// Open a recognizer session for PCM at `sample_rate`
    fn recognizer(&self, sample_rate: u32) -> Result<Box<dyn SpeechRecognizer>>;
}

/// Streaming recognizer session
pub trait SpeechRecognizer: Send {
    /// Feed one chunk of 16-bit PCM
    ///
    /// Returns `true` when an utterance was finalised and `result()` holds it.
    fn accept_waveform(&mut self, pcm: &[i16]) -> Result<bool>;

    /// Take the most recently finalised utterance
    fn result(&mut self) -> RecognitionResult;

    /// Flush and take whatever is left after the last chunk
    fn final_result(&mut self) -> RecognitionResult;
}

/// Text and optional word timings for one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "result")]
    pub words: Vec<WordToken>,
}

// ============================================================================
// Face
// ============================================================================

/// Finds faces in a grayscale frame
pub trait FaceDetector: Send + Sync {
    fn detect_faces(&self, frame: &GrayFrame) -> Result<Vec<BoundingBox>>;
}

/// Finds eyes in a grayscale face region; boxes are relative to the region
pub trait EyeDetector: Send + Sync {
    fn detect_eyes(&self, face: &GrayFrame) -> Result<Vec<BoundingBox>>;
}

/// Emotion labels every classifier reports over
pub const EMOTION_LABELS: [&str; 7] = ["angry", "disgust", "fear", "happy", "sad", "surprise", "neutral"];

/// Probability distribution over `EMOTION_LABELS`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores(pub BTreeMap<String, f64>);

impl EmotionScores {
    /// Project onto `EMOTION_LABELS` and scale so the values sum to 1.0
    ///
    /// Classifiers report either fractions or percentages; both normalise
    /// to the same distribution. Keys are matched case-insensitively, unknown
    /// labels are dropped and missing ones read as 0.0. An all-zero input
    /// stays all-zero.
    pub fn normalized(&self) -> EmotionScores {
        let mut known: BTreeMap<String, f64> =
            EMOTION_LABELS.iter().map(|label| (label.to_string(), 0.0)).collect();
        for (label, value) in &self.0 {
            if let Some(slot) = known.get_mut(&label.to_lowercase()) {
                if value.is_finite() && *value > 0.0 {
                    *slot += value;
                }
            }
        }

        let total: f64 = known.values().sum();
        if total > 0.0 {
            known.values_mut().for_each(|v| *v /= total);
        }
        EmotionScores(known)
    }

    /// Probability for one label (0.0 when absent)
    pub fn probability(&self, label: &str) -> f64 {
        self.0.get(label).copied().unwrap_or(0.0)
    }
}

/// Classifies the emotion shown on a face crop
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, face: &RgbFrame) -> Result<EmotionScores>;
}

// ============================================================================
// Pose
// ============================================================================

/// Body landmarks used by posture heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkName {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftWrist,
    RightWrist,
}

/// Minimum visibility for a landmark to be trusted
pub const MIN_LANDMARK_VISIBILITY: f64 = 0.5;

/// One landmark in normalised image coordinates (0..1, y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }
}

/// Landmarks found on one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarks(pub HashMap<LandmarkName, Landmark>);

impl PoseLandmarks {
    /// Landmark if present and visible enough
    pub fn get(&self, name: LandmarkName) -> Option<Landmark> {
        self.0
            .get(&name)
            .copied()
            .filter(|l| l.visibility >= MIN_LANDMARK_VISIBILITY)
    }

    /// Insert a landmark (builder style)
    pub fn with(mut self, name: LandmarkName, landmark: Landmark) -> Self {
        self.0.insert(name, landmark);
        self
    }
}

/// Estimates body pose on an RGB frame; `None` means no person detected
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, frame: &RgbFrame) -> Result<Option<PoseLandmarks>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_percentages_normalise() {
        let mut raw = BTreeMap::new();
        raw.insert("happy".to_string(), 60.0);
        raw.insert("neutral".to_string(), 30.0);
        raw.insert("sad".to_string(), 10.0);
        let scores = EmotionScores(raw).normalized();
        assert!((scores.probability("happy") - 0.6).abs() < 1e-9);
        assert!((scores.probability("neutral") - 0.3).abs() < 1e-9);
        assert_eq!(scores.probability("fear"), 0.0);
    }

    #[test]
    fn test_emotion_labels_are_case_insensitive() {
        let mut raw = BTreeMap::new();
        raw.insert("Happy".to_string(), 3.0);
        raw.insert("NEUTRAL".to_string(), 1.0);
        raw.insert("contempt".to_string(), 4.0);
        let scores = EmotionScores(raw).normalized();
        assert!((scores.probability("happy") - 0.75).abs() < 1e-9);
        assert!((scores.probability("neutral") - 0.25).abs() < 1e-9);
        assert_eq!(scores.probability("contempt"), 0.0);
        assert_eq!(scores.0.len(), EMOTION_LABELS.len());
    }

    #[test]
    fn test_all_zero_emotions_still_lowercased() {
        let mut raw = BTreeMap::new();
        raw.insert("Happy".to_string(), 0.0);
        raw.insert("Sad".to_string(), f64::NAN);
        let scores = EmotionScores(raw).normalized();
        assert!(scores.0.contains_key("happy"));
        assert!(!scores.0.contains_key("Happy"));
        assert!(scores.0.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_invisible_landmark_is_ignored() {
        let pose = PoseLandmarks::default()
            .with(LandmarkName::Nose, Landmark::new(0.5, 0.2, 0.9))
            .with(LandmarkName::LeftHip, Landmark::new(0.4, 0.8, 0.1));
        assert!(pose.get(LandmarkName::Nose).is_some());
        assert!(pose.get(LandmarkName::LeftHip).is_none());
        assert!(pose.get(LandmarkName::RightHip).is_none());
    }

    #[test]
    fn test_recognition_result_parses_word_array() {
        let json = r#"{"text": "hello there", "result": [
            {"word": "hello", "start": 0.1, "end": 0.4, "conf": 0.9},
            {"word": "there", "start": 0.5, "end": 0.8}
        ]}"#;
        let parsed: RecognitionResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text, "hello there");
        assert_eq!(parsed.words.len(), 2);
        assert_eq!(parsed.words[1].confidence, 1.0);
    }
}
