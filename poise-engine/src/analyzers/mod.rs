// Analyzer pipelines
//
// Three independent pipelines score one recording: facial/gaze behaviour,
// vocal delivery and body posture. Each runs on a blocking worker thread and
// only reports failure through `AnalyzerError`; the orchestrator owns the
// degradation policy.

use crate::error::AnalyzerError;
use crate::types::{AnalyzerKind, AnalyzerResult, FrameSample, VideoSource};
use std::path::PathBuf;
use tracing::debug;

pub mod body;
pub mod facial;
pub mod speech;

pub use body::BodyConfidenceAnalyzer;
pub use facial::FacialConfidenceAnalyzer;
pub use speech::SpeechConfidenceAnalyzer;

/// Everything an analyzer may read for one request
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    /// Probed video
    pub video: VideoSource,
    /// Extracted mono 16-bit PCM WAV
    pub audio_path: PathBuf,
}

/// Analyzer trait - all three pipelines implement this
pub trait Analyzer: Send + Sync {
    /// Which pipeline this is
    fn kind(&self) -> AnalyzerKind;

    /// Score one request
    ///
    /// # Arguments
    /// * `input` - Probed video and extracted audio for the request
    ///
    /// # Returns
    /// * `Ok(AnalyzerResult)` - Scored (or no-subject / capability) result
    /// * `Err(_)` - Analyzer failed as a whole (orchestrator degrades it)
    fn analyze(&self, input: &AnalysisInput) -> Result<AnalyzerResult, AnalyzerError>;
}

/// Tracks decode health across one frame stream
///
/// Single undecodable frames are skipped. A stream that yields no frame at
/// all, or whose last item is an error (the decoder died), fails the analyzer.
#[derive(Debug, Default)]
pub(crate) struct DecodeTracker {
    decoded: u64,
    last_error: Option<String>,
    ended_with_error: bool,
}

impl DecodeTracker {
    /// Unwrap one stream item, recording failures
    pub(crate) fn accept(&mut self, item: anyhow::Result<FrameSample>) -> Option<FrameSample> {
        match item {
            Ok(frame) => {
                self.decoded += 1;
                self.ended_with_error = false;
                Some(frame)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                debug!(error = %message, "Skipping undecodable frame");
                self.last_error = Some(message);
                self.ended_with_error = true;
                None
            }
        }
    }

    /// Verdict once the stream is exhausted
    pub(crate) fn finish(self) -> Result<u64, AnalyzerError> {
        if self.ended_with_error || self.decoded == 0 {
            let reason = self
                .last_error
                .unwrap_or_else(|| "video stream yielded no frames".to_string());
            return Err(AnalyzerError::Decode(reason));
        }
        Ok(self.decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::DecodeTracker;
    use crate::error::AnalyzerError;
    use crate::media::frame::RgbFrame;
    use crate::scoring::WEIGHT_SUM_TOLERANCE;
    use crate::types::{AnalyzerKind, FrameSample};

    fn frame(index: u64) -> anyhow::Result<FrameSample> {
        Ok(FrameSample {
            index,
            timestamp_seconds: index as f64 / 30.0,
            image: RgbFrame::filled(2, 2, [0, 0, 0]),
        })
    }

    #[test]
    fn test_decode_tracker_skips_isolated_bad_frame() {
        let mut tracker = DecodeTracker::default();
        for item in [frame(0), Err(anyhow::anyhow!("corrupt packet")), frame(60)] {
            tracker.accept(item);
        }
        assert_eq!(tracker.finish().unwrap(), 2);
    }

    #[test]
    fn test_decode_tracker_fails_on_empty_stream() {
        let err = DecodeTracker::default().finish().unwrap_err();
        assert!(matches!(err, AnalyzerError::Decode(msg) if msg.contains("no frames")));
    }

    #[test]
    fn test_decode_tracker_fails_when_stream_ends_in_error() {
        let mut tracker = DecodeTracker::default();
        tracker.accept(frame(0));
        tracker.accept(Err(anyhow::anyhow!("ffmpeg failed (exit code Some(1))")));
        let err = tracker.finish().unwrap_err();
        assert!(matches!(err, AnalyzerError::Decode(msg) if msg.contains("exit code")));
    }

    #[test]
    fn test_internal_weights_sum_to_one() {
        for kind in [AnalyzerKind::Facial, AnalyzerKind::Speech, AnalyzerKind::Body] {
            let total = kind.weights().total();
            assert!(
                (total - 1.0).abs() < WEIGHT_SUM_TOLERANCE,
                "{} weights sum to {}",
                kind,
                total
            );
        }
    }
}
