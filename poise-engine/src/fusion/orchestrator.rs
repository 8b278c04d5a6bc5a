//! Request orchestration
//!
//! One `score()` call:
//! 1. Validate and probe the video
//! 2. Extract a temporary PCM track (ffmpeg, then in-process fallback)
//! 3. Run facial, speech and body analyzers concurrently on blocking threads
//! 4. Join all three, degrade failures to neutral results, fuse
//!
//! The temporary audio track is owned by this scope and removed when it
//! ends, whether scoring succeeds or fails.

use crate::analyzers::{
    AnalysisInput, Analyzer, BodyConfidenceAnalyzer, FacialConfidenceAnalyzer, SpeechConfidenceAnalyzer,
};
use crate::config::EngineConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::fusion::{AnalysisEvent, ConfidenceReport, Telemetry};
use crate::media::{AudioExtractor, FfmpegVideoDecoder, TwoStageAudioExtractor, VideoDecoder};
use crate::models::ModelCache;
use crate::scoring::round2;
use crate::types::{AnalyzerKind, AnalyzerResult, VideoSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Scores recorded interview videos
///
/// Cheap to clone; clones share models and collaborators.
#[derive(Clone)]
pub struct FusionOrchestrator {
    decoder: Arc<dyn VideoDecoder>,
    extractor: Arc<dyn AudioExtractor>,
    facial: Arc<dyn Analyzer>,
    speech: Arc<dyn Analyzer>,
    body: Arc<dyn Analyzer>,
    event_tx: Option<mpsc::Sender<AnalysisEvent>>,
}

impl FusionOrchestrator {
    /// Create an orchestrator using the ffmpeg-backed media collaborators
    pub fn new(config: &EngineConfig, models: Arc<ModelCache>) -> Self {
        let decoder: Arc<dyn VideoDecoder> = Arc::new(FfmpegVideoDecoder::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
        ));
        let extractor: Arc<dyn AudioExtractor> = Arc::new(TwoStageAudioExtractor::standard(
            config.ffmpeg_path.clone(),
            config.temp_dir.clone(),
        ));
        Self::with_collaborators(config, models, decoder, extractor)
    }

    /// Create an orchestrator with explicit media collaborators
    pub fn with_collaborators(
        config: &EngineConfig,
        models: Arc<ModelCache>,
        decoder: Arc<dyn VideoDecoder>,
        extractor: Arc<dyn AudioExtractor>,
    ) -> Self {
        let facial = Arc::new(FacialConfidenceAnalyzer::new(
            Arc::clone(&models),
            Arc::clone(&decoder),
            config.facial_frame_stride,
        ));
        let speech = Arc::new(
            SpeechConfidenceAnalyzer::new(Arc::clone(&models), config.recognizer_chunk_frames)
                .with_legacy_wall_clock_duration(config.legacy_wall_clock_duration),
        );
        let body = Arc::new(BodyConfidenceAnalyzer::new(
            models,
            Arc::clone(&decoder),
            config.body_frame_stride,
        ));

        Self {
            decoder,
            extractor,
            facial,
            speech,
            body,
            event_tx: None,
        }
    }

    /// Replace the pipeline for `analyzer.kind()`
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        match analyzer.kind() {
            AnalyzerKind::Facial => self.facial = analyzer,
            AnalyzerKind::Speech => self.speech = analyzer,
            AnalyzerKind::Body => self.body = analyzer,
        }
        self
    }

    /// Attach an event channel for progress reporting
    pub fn with_events(mut self, event_tx: mpsc::Sender<AnalysisEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Score one recorded video
    ///
    /// # Arguments
    /// * `video_path` - Path to the recording
    ///
    /// # Returns
    /// * `Ok(ConfidenceReport)` - Possibly degraded report
    /// * `Err(AnalysisError::Input)` - Video missing or unreadable
    /// * `Err(AnalysisError::Extraction)` - No audio could be extracted
    /// * `Err(AnalysisError::Fatal)` - Fusion-level failure
    pub async fn score(&self, video_path: &Path) -> AnalysisResult<ConfidenceReport> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        match self.run(request_id, video_path, started).await {
            Ok(report) => {
                info!(
                    request_id = %request_id,
                    score = report.score,
                    degraded = report.degraded,
                    total_ms = report.telemetry.total_ms,
                    "Confidence report ready"
                );
                self.emit(AnalysisEvent::ReportReady {
                    request_id,
                    score: report.score,
                    degraded: report.degraded,
                    total_ms: report.telemetry.total_ms,
                });
                Ok(report)
            }
            Err(e) => {
                warn!(request_id = %request_id, code = e.code(), error = %e, "Scoring failed");
                self.emit(AnalysisEvent::Failed {
                    request_id,
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, request_id: Uuid, video_path: &Path, started: Instant) -> AnalysisResult<ConfidenceReport> {
        let video = self.probe(video_path).await?;
        info!(
            request_id = %request_id,
            path = %video_path.display(),
            duration = video.duration_seconds,
            fps = video.frame_rate,
            "Scoring video"
        );
        self.emit(AnalysisEvent::AnalysisStarted {
            request_id,
            video_path: video_path.display().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        });

        // Dropping the track removes the temporary file on every path below
        let extraction_started = Instant::now();
        let track = self
            .extractor
            .extract(video_path)
            .await
            .map_err(|e| AnalysisError::Extraction(format!("{:#}", e)))?;
        let audio_extraction_ms = extraction_started.elapsed().as_millis() as u64;
        debug!(stage = track.stage, path = %track.path().display(), "Audio track ready");
        self.emit(AnalysisEvent::AudioExtracted {
            request_id,
            stage: track.stage.to_string(),
            elapsed_ms: audio_extraction_ms,
        });

        let input = Arc::new(AnalysisInput {
            video,
            audio_path: track.path().to_path_buf(),
        });

        let ((facial, facial_ms), (speech, speech_ms), (body, body_ms)) = tokio::join!(
            self.run_analyzer(request_id, Arc::clone(&self.facial), Arc::clone(&input)),
            self.run_analyzer(request_id, Arc::clone(&self.speech), Arc::clone(&input)),
            self.run_analyzer(request_id, Arc::clone(&self.body), Arc::clone(&input)),
        );

        let telemetry = Telemetry {
            audio_extraction_ms,
            facial_ms,
            speech_ms,
            body_ms,
            total_ms: started.elapsed().as_millis() as u64,
            extraction_stage: track.stage.to_string(),
        };
        drop(track);

        Ok(ConfidenceReport::assemble(request_id, facial, speech, body, telemetry))
    }

    /// Validate the path and read stream metadata
    async fn probe(&self, video_path: &Path) -> AnalysisResult<VideoSource> {
        if !video_path.is_file() {
            return Err(AnalysisError::Input(format!(
                "Video file not found: {}",
                video_path.display()
            )));
        }

        let decoder = Arc::clone(&self.decoder);
        let path = video_path.to_path_buf();
        tokio::task::spawn_blocking(move || decoder.probe(&path))
            .await
            .map_err(|e| AnalysisError::Fatal(format!("Video probe task failed: {}", e)))?
            .map_err(|e| AnalysisError::Input(format!("Unreadable video {}: {:#}", video_path.display(), e)))
    }

    /// Run one analyzer on a blocking thread; failures become degraded results
    async fn run_analyzer(
        &self,
        request_id: Uuid,
        analyzer: Arc<dyn Analyzer>,
        input: Arc<AnalysisInput>,
    ) -> (AnalyzerResult, u64) {
        let kind = analyzer.kind();
        let started = Instant::now();

        let joined = tokio::task::spawn_blocking(move || analyzer.analyze(&input)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(request_id = %request_id, analyzer = %kind, error = %e, "Analyzer failed, using neutral defaults");
                AnalyzerResult::degraded(kind, e.to_string())
            }
            Err(e) => {
                warn!(request_id = %request_id, analyzer = %kind, error = %e, "Analyzer task aborted, using neutral defaults");
                AnalyzerResult::degraded(kind, format!("Analyzer task aborted: {}", e))
            }
        };

        self.emit(AnalysisEvent::AnalyzerCompleted {
            request_id,
            analyzer: kind,
            score: round2(result.composite_score),
            degraded: result.degraded,
            elapsed_ms,
        });

        (result, elapsed_ms)
    }

    /// Emit an event without ever blocking scoring
    fn emit(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!(error = %e, "Dropped analysis event");
            }
        }
    }
}
