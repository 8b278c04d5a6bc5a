//! Core types for the scoring engine
//!
//! Entities are created per request and dropped once the report is returned.
//! Nothing here is shared between requests.

use crate::media::frame::RgbFrame;
use crate::scoring::{clamp_score, round2, WeightSet, NEUTRAL_SCORE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// Inputs
// ============================================================================

/// Recorded video under analysis (read-only, owned by the request)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    /// Path to the video file
    pub path: PathBuf,
    /// Duration in seconds (0.0 when the container does not report it)
    pub duration_seconds: f64,
    /// Frames per second
    pub frame_rate: f64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl VideoSource {
    /// Timestamp of a frame index in seconds
    pub fn timestamp_of(&self, frame_index: u64) -> f64 {
        if self.frame_rate > 0.0 {
            frame_index as f64 / self.frame_rate
        } else {
            0.0
        }
    }
}

/// One decoded frame picked by the sampling stride
///
/// Ephemeral: created during a single analyzer pass and dropped per frame.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Frame index in the source video
    pub index: u64,
    /// Presentation time in seconds
    pub timestamp_seconds: f64,
    /// RGB pixel data
    pub image: RgbFrame,
}

/// Recognized word with timing, produced by the speech recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    /// Word text
    pub word: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Recognizer confidence (0.0-1.0)
    #[serde(default = "default_word_confidence", alias = "conf")]
    pub confidence: f64,
}

fn default_word_confidence() -> f64 {
    1.0
}

/// Axis-aligned region in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Area in pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Center point in pixels
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// The three analysis pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Facial,
    Speech,
    Body,
}

impl AnalyzerKind {
    /// Stable name used in logs, events and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Facial => "facial",
            AnalyzerKind::Speech => "speech",
            AnalyzerKind::Body => "body",
        }
    }

    /// Internal weight set of this analyzer
    pub fn weights(&self) -> &'static WeightSet {
        match self {
            AnalyzerKind::Facial => &crate::analyzers::facial::FACIAL_WEIGHTS,
            AnalyzerKind::Speech => &crate::analyzers::speech::SPEECH_WEIGHTS,
            AnalyzerKind::Body => &crate::analyzers::body::BODY_WEIGHTS,
        }
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named confidence indicator, always within [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub name: String,
    pub value: f64,
}

impl SubScore {
    /// Create a sub-score, clamping the value into [0, 100]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: clamp_score(value),
        }
    }
}

/// How an analyzer result came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerStatus {
    /// Normal scoring run
    Scored,
    /// Analyzer ran but never found its subject (no face / no pose)
    NoSubjectDetected,
    /// Optional capability missing at startup (pose estimation)
    CapabilityUnavailable,
    /// Analyzer failed internally; neutral defaults substituted
    Degraded,
}

/// Output of one analyzer pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    /// Which pipeline produced this result
    pub analyzer: AnalyzerKind,
    /// Weighted sum of the sub-scores, within [0, 100]
    pub composite_score: f64,
    /// Sub-score name → value
    pub breakdown: BTreeMap<String, f64>,
    /// Raw measurements (frame counts, rates, transcript, ...)
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Result provenance
    pub status: AnalyzerStatus,
    /// True when neutral defaults replaced a failed run
    pub degraded: bool,
    /// Failure description for degraded results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl AnalyzerResult {
    /// Build a scored result from sub-scores using the analyzer's weights
    pub fn scored(analyzer: AnalyzerKind, sub_scores: Vec<SubScore>) -> Self {
        let breakdown: BTreeMap<String, f64> = sub_scores
            .into_iter()
            .map(|s| (s.name, s.value))
            .collect();
        let composite_score = analyzer.weights().combine(&breakdown);

        Self {
            analyzer,
            composite_score,
            breakdown,
            metrics: BTreeMap::new(),
            status: AnalyzerStatus::Scored,
            degraded: false,
            degraded_reason: None,
        }
    }

    /// Every sub-score at the neutral 50
    pub fn neutral(analyzer: AnalyzerKind, status: AnalyzerStatus) -> Self {
        let breakdown = analyzer
            .weights()
            .entries
            .iter()
            .map(|(name, _)| (name.to_string(), NEUTRAL_SCORE))
            .collect();

        Self {
            analyzer,
            composite_score: NEUTRAL_SCORE,
            breakdown,
            metrics: BTreeMap::new(),
            status,
            degraded: false,
            degraded_reason: None,
        }
    }

    /// Neutral result flagged as degraded
    pub fn degraded(analyzer: AnalyzerKind, reason: impl Into<String>) -> Self {
        let mut result = Self::neutral(analyzer, AnalyzerStatus::Degraded);
        result.degraded = true;
        result.degraded_reason = Some(reason.into());
        result
    }

    /// Override the status
    pub fn with_status(mut self, status: AnalyzerStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach a raw metric
    pub fn with_metric(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(key.to_string(), value.into());
        self
    }

    /// Look up a sub-score by name
    pub fn sub_score(&self, name: &str) -> Option<f64> {
        self.breakdown.get(name).copied()
    }

    /// Look up a numeric metric by name
    pub fn metric_f64(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(|v| v.as_f64())
    }

    /// Copy with scores rounded to two decimals
    pub fn rounded(mut self) -> Self {
        self.composite_score = round2(self.composite_score);
        for value in self.breakdown.values_mut() {
            *value = round2(*value);
        }
        self
    }
}
