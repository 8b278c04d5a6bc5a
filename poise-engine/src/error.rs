//! Error types for poise-engine
//!
//! Two layers:
//! - `AnalysisError` is what callers of `score()` see. Only input problems,
//!   total audio-extraction failure and fusion-level failures surface here.
//! - `AnalyzerError` stays inside the engine. The orchestrator turns it into a
//!   degraded `AnalyzerResult` instead of propagating it.

use serde_json::json;
use thiserror::Error;

/// Top-level analysis error returned to the surrounding service
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing or unreadable video
    #[error("Input error: {0}")]
    Input(String),

    /// Both the primary and the fallback audio extraction failed
    #[error("Audio extraction failed: {0}")]
    Extraction(String),

    /// Unexpected failure during fusion, no report produced
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// poise-common error (configuration, I/O)
    #[error("Common error: {0}")]
    Common(#[from] poise_common::Error),
}

impl AnalysisError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::Input(_) => "INPUT_ERROR",
            AnalysisError::Extraction(_) => "EXTRACTION_ERROR",
            AnalysisError::Fatal(_) => "FATAL_ERROR",
            AnalysisError::Common(poise_common::Error::Config(_)) => "CONFIG_ERROR",
            AnalysisError::Common(_) => "INTERNAL_ERROR",
        }
    }

    /// Structured error body for the surrounding service
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

/// Result type for engine entry points
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Analyzer-internal failure
///
/// Never crosses the orchestrator boundary.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// A required model could not be loaded
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Video could not be opened or decoded
    #[error("Video decode error: {0}")]
    Decode(String),

    /// Audio artifact could not be read
    #[error("Audio read error: {0}")]
    Audio(String),

    /// Speech recognizer failed before producing any output
    #[error("Recognizer error: {0}")]
    Recognizer(String),
}
