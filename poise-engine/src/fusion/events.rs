//! Progress events emitted while a recording is scored

use crate::types::AnalyzerKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analysis progress events for the surrounding service (SSE, logs, UI)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// Request accepted, video probed
    AnalysisStarted {
        request_id: Uuid,
        /// Path of the video being scored
        video_path: String,
        /// Unix timestamp (seconds since epoch)
        timestamp: i64,
    },

    /// Temporary audio track is ready
    AudioExtracted {
        request_id: Uuid,
        /// Extraction stage that succeeded ("ffmpeg" or "symphonia")
        stage: String,
        elapsed_ms: u64,
    },

    /// One analyzer finished (possibly degraded)
    AnalyzerCompleted {
        request_id: Uuid,
        analyzer: AnalyzerKind,
        /// Composite score, rounded to two decimals
        score: f64,
        degraded: bool,
        elapsed_ms: u64,
    },

    /// Final report assembled
    ReportReady {
        request_id: Uuid,
        score: f64,
        degraded: bool,
        total_ms: u64,
    },

    /// Request failed with a top-level error
    Failed {
        request_id: Uuid,
        /// Machine-readable error code
        code: String,
        message: String,
    },
}
