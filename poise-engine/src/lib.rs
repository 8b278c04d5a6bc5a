//! poise-engine: interview confidence scoring
//!
//! Turns a recorded interview video into a confidence score by fusing three
//! analyzers (facial, speech, body) that run concurrently over the same
//! recording.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use poise_engine::{EngineConfig, FusionOrchestrator, ModelCache};
//! # async fn run(models: ModelCache) -> Result<(), poise_engine::AnalysisError> {
//! let config = EngineConfig::load(None)?;
//! let orchestrator = FusionOrchestrator::new(&config, Arc::new(models));
//! let report = orchestrator.score(std::path::Path::new("interview.webm")).await?;
//! println!("{}", report.score);
//! # Ok(())
//! # }
//! ```

pub mod analyzers;
pub mod config;
pub mod error;
pub mod fusion;
pub mod media;
pub mod models;
pub mod scoring;
pub mod types;

pub use crate::config::EngineConfig;
pub use crate::error::{AnalysisError, AnalysisResult, AnalyzerError};
pub use crate::fusion::{AnalysisEvent, ConfidenceReport, FusionOrchestrator, Telemetry, FUSION_WEIGHTS};
pub use crate::models::{ModelCache, ModelCacheBuilder};
pub use crate::types::{AnalyzerKind, AnalyzerResult, AnalyzerStatus, SubScore, VideoSource, WordToken};
