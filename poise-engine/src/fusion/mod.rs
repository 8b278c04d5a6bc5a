// Fusion layer
//
// Joins the three analyzer results into one ConfidenceReport with fixed
// weights. Degraded analyzers still contribute their neutral composite.

pub mod events;
pub mod orchestrator;

pub use events::AnalysisEvent;
pub use orchestrator::FusionOrchestrator;

use crate::scoring::{clamp_score, round2, WeightSet};
use crate::types::{AnalyzerKind, AnalyzerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Weights applied to the analyzer composites
pub const FUSION_WEIGHTS: WeightSet = WeightSet::new(&[("facial", 0.4), ("speech", 0.4), ("body", 0.2)]);

/// Wall-clock timings for one request (milliseconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub audio_extraction_ms: u64,
    pub facial_ms: u64,
    pub speech_ms: u64,
    pub body_ms: u64,
    pub total_ms: u64,
    /// Extraction stage that produced the audio track
    pub extraction_stage: String,
}

/// Final output of `FusionOrchestrator::score`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub request_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    /// Fused confidence score, within [0, 100]
    pub score: f64,
    pub facial: AnalyzerResult,
    pub speech: AnalyzerResult,
    pub body: AnalyzerResult,
    /// Analyzer name → fusion weight
    pub weights: BTreeMap<String, f64>,
    /// Analyzer name → weight × composite
    pub contributions: BTreeMap<String, f64>,
    /// True when any analyzer was replaced by neutral defaults
    pub degraded: bool,
    pub telemetry: Telemetry,
}

impl ConfidenceReport {
    /// Fuse three analyzer results into a report
    ///
    /// Scores are rounded to two decimals; the fused score is computed from
    /// the unrounded composites.
    pub fn assemble(
        request_id: Uuid,
        facial: AnalyzerResult,
        speech: AnalyzerResult,
        body: AnalyzerResult,
        telemetry: Telemetry,
    ) -> Self {
        let composites: BTreeMap<String, f64> = [&facial, &speech, &body]
            .iter()
            .map(|r| (r.analyzer.as_str().to_string(), r.composite_score))
            .collect();

        let score = FUSION_WEIGHTS.combine(&composites);

        let weights = FUSION_WEIGHTS
            .entries
            .iter()
            .map(|(name, w)| (name.to_string(), *w))
            .collect();

        let contributions = FUSION_WEIGHTS
            .entries
            .iter()
            .map(|(name, w)| {
                let composite = composites.get(*name).copied().unwrap_or_default();
                (name.to_string(), round2(clamp_score(composite) * w))
            })
            .collect();

        let degraded = facial.degraded || speech.degraded || body.degraded;

        Self {
            request_id,
            analyzed_at: Utc::now(),
            score: round2(score),
            facial: facial.rounded(),
            speech: speech.rounded(),
            body: body.rounded(),
            weights,
            contributions,
            degraded,
            telemetry,
        }
    }

    /// Result for one analyzer
    pub fn analyzer(&self, kind: AnalyzerKind) -> &AnalyzerResult {
        match kind {
            AnalyzerKind::Facial => &self.facial,
            AnalyzerKind::Speech => &self.speech,
            AnalyzerKind::Body => &self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::WEIGHT_SUM_TOLERANCE;
    use crate::types::{AnalyzerStatus, SubScore};

    #[test]
    fn test_fusion_weights_sum_to_one() {
        assert!((FUSION_WEIGHTS.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_assemble_weights_composites() {
        let facial = AnalyzerResult::scored(
            AnalyzerKind::Facial,
            crate::analyzers::facial::FACIAL_WEIGHTS
                .entries
                .iter()
                .map(|(name, _)| SubScore::new(*name, 100.0))
                .collect(),
        );
        let speech = AnalyzerResult::degraded(AnalyzerKind::Speech, "recognizer crashed");
        let body = AnalyzerResult::neutral(AnalyzerKind::Body, AnalyzerStatus::CapabilityUnavailable);

        let report = ConfidenceReport::assemble(Uuid::new_v4(), facial, speech, body, Telemetry::default());

        // 0.4*100 + 0.4*50 + 0.2*50
        assert_eq!(report.score, 70.0);
        assert_eq!(report.contributions["facial"], 40.0);
        assert_eq!(report.contributions["speech"], 20.0);
        assert_eq!(report.contributions["body"], 10.0);
        assert_eq!(report.weights["body"], 0.2);
        assert!(report.degraded);
        assert!(report.analyzer(AnalyzerKind::Speech).degraded);
    }

    #[test]
    fn test_report_serializes() {
        let report = ConfidenceReport::assemble(
            Uuid::nil(),
            AnalyzerResult::neutral(AnalyzerKind::Facial, AnalyzerStatus::Scored),
            AnalyzerResult::neutral(AnalyzerKind::Speech, AnalyzerStatus::Scored),
            AnalyzerResult::neutral(AnalyzerKind::Body, AnalyzerStatus::Scored),
            Telemetry::default(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["score"], 50.0);
        assert_eq!(json["facial"]["status"], "scored");
        assert_eq!(json["degraded"], false);
    }
}
