//! Speech confidence analysis
//!
//! Streams the extracted PCM through the speech recognizer, then scores the
//! transcript and the signal:
//!
//! | Sub-score    | Signal                                        | Weight |
//! |--------------|-----------------------------------------------|--------|
//! | `hesitation` | Fillers, long pauses, triple repeats          | 0.3    |
//! | `tone`       | Pitch and energy stability                    | 0.3    |
//! | `clarity`    | Spectral centroid and zero-crossing rate      | 0.2    |
//! | `pace`       | Words per minute against a 120-160 band       | 0.2    |
//!
//! No step aborts the pipeline: a failing feature falls back to its default.

pub mod acoustics;
pub mod hesitation;

use crate::analyzers::{AnalysisInput, Analyzer};
use crate::error::AnalyzerError;
use crate::media::wav::{read_pcm16, PcmAudio};
use crate::models::{ModelCache, SpeechRecognizer};
use crate::scoring::{round2, WeightSet, NEUTRAL_SCORE};
use crate::types::{AnalyzerKind, AnalyzerResult, SubScore, WordToken};
use hesitation::{normalize_words, HesitationIndicators};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Internal weights of the speech composite
pub const SPEECH_WEIGHTS: WeightSet = WeightSet::new(&[
    ("hesitation", 0.3),
    ("tone", 0.3),
    ("clarity", 0.2),
    ("pace", 0.2),
]);

/// Transcript reported when nothing was recognised
pub const EMPTY_TRANSCRIPT_PLACEHOLDER: &str = "[No clear speech detected]";

/// Words-per-minute band scored 100
pub const IDEAL_PACE_WPM: (f64, f64) = (120.0, 160.0);

/// Pace score for a speaking rate
///
/// * 120-160 wpm: 100
/// * 100-120: rises from 80 to 100
/// * 160-180: falls from 100 to 80
/// * otherwise: 100 - 2 * |wpm - 140|, floored at 0
pub fn pace_score(wpm: f64) -> f64 {
    let (low, high) = IDEAL_PACE_WPM;
    if (low..=high).contains(&wpm) {
        100.0
    } else if (100.0..low).contains(&wpm) {
        80.0 + (wpm - 100.0)
    } else if wpm > high && wpm <= 180.0 {
        100.0 - (wpm - high)
    } else {
        (100.0 - 2.0 * (wpm - 140.0).abs()).max(0.0)
    }
}

/// Recognised text and word timings for a whole recording
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcription {
    pub text: String,
    pub words: Vec<WordToken>,
    /// True when the recognizer failed part-way and the text is partial
    pub interrupted: bool,
}

impl Transcription {
    fn append(&mut self, text: &str, words: Vec<WordToken>) {
        let text = text.trim();
        if !text.is_empty() {
            if !self.text.is_empty() {
                self.text.push(' ');
            }
            self.text.push_str(text);
        }
        self.words.extend(words);
    }
}

/// Feed PCM to a recognizer in fixed-size chunks
///
/// A recognizer error mid-stream stops feeding; whatever was recognised so
/// far is kept and the final result is still flushed.
pub fn transcribe(recognizer: &mut dyn SpeechRecognizer, samples: &[i16], chunk_frames: usize) -> Transcription {
    let mut transcription = Transcription::default();

    for (index, chunk) in samples.chunks(chunk_frames.max(1)).enumerate() {
        match recognizer.accept_waveform(chunk) {
            Ok(true) => {
                let result = recognizer.result();
                transcription.append(&result.text, result.words);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(chunk = index, error = %e, "Recognizer failed mid-stream, keeping partial transcript");
                transcription.interrupted = true;
                break;
            }
        }
    }

    let last = recognizer.final_result();
    transcription.append(&last.text, last.words);
    transcription
}

/// Speech confidence analyzer
pub struct SpeechConfidenceAnalyzer {
    models: Arc<ModelCache>,
    chunk_frames: usize,
    legacy_wall_clock_duration: bool,
}

impl SpeechConfidenceAnalyzer {
    pub fn new(models: Arc<ModelCache>, chunk_frames: usize) -> Self {
        Self {
            models,
            chunk_frames: chunk_frames.max(1),
            legacy_wall_clock_duration: false,
        }
    }

    /// Report recognition wall-clock time as `duration_sec`
    pub fn with_legacy_wall_clock_duration(mut self, enabled: bool) -> Self {
        self.legacy_wall_clock_duration = enabled;
        self
    }

    /// Score speech delivery in an extracted PCM WAV
    ///
    /// # Errors
    /// Fails when the audio cannot be read or the recognizer cannot be
    /// created. Feature failures fall back to defaults.
    pub fn analyze_audio(&self, audio_path: &Path) -> Result<AnalyzerResult, AnalyzerError> {
        let audio = read_pcm16(audio_path).map_err(|e| AnalyzerError::Audio(format!("{:#}", e)))?;

        let model = self.models.speech_model()?;
        let mut recognizer = model
            .recognizer(audio.sample_rate)
            .map_err(|e| AnalyzerError::Recognizer(format!("{:#}", e)))?;

        let started = Instant::now();
        let transcription = transcribe(recognizer.as_mut(), &audio.samples, self.chunk_frames);
        let recognition_sec = started.elapsed().as_secs_f64();

        let result = self.score_transcription(&audio, &transcription, recognition_sec);
        info!(
            analyzer = "speech",
            words = result.metric_f64("words_spoken").unwrap_or(0.0),
            score = result.composite_score,
            interrupted = transcription.interrupted,
            "Speech analysis complete"
        );
        Ok(result)
    }

    /// Score a finished transcription against its audio
    pub fn score_transcription(
        &self,
        audio: &PcmAudio,
        transcription: &Transcription,
        recognition_sec: f64,
    ) -> AnalyzerResult {
        let duration_sec = if self.legacy_wall_clock_duration {
            recognition_sec
        } else {
            audio.duration_seconds()
        };

        let words = normalize_words(&transcription.text);
        let words_spoken = words.len();
        let wpm = if duration_sec > 0.0 {
            words_spoken as f64 / duration_sec * 60.0
        } else {
            0.0
        };

        let indicators = HesitationIndicators::detect(&words, &transcription.words);
        let hesitation = indicators.score(words.is_empty());

        let samples = audio.to_f32();
        let tone = acoustics::tone_score(&samples, audio.sample_rate).unwrap_or_else(|e| {
            debug!(error = %e, "Tone features unavailable, using neutral score");
            NEUTRAL_SCORE
        });
        let clarity = acoustics::clarity_score(&samples, audio.sample_rate).unwrap_or_else(|e| {
            debug!(error = %e, "Clarity features unavailable, using neutral score");
            NEUTRAL_SCORE
        });

        let transcript = if transcription.text.trim().is_empty() {
            EMPTY_TRANSCRIPT_PLACEHOLDER.to_string()
        } else {
            transcription.text.trim().to_string()
        };

        AnalyzerResult::scored(
            AnalyzerKind::Speech,
            vec![
                SubScore::new("hesitation", hesitation),
                SubScore::new("tone", tone),
                SubScore::new("clarity", clarity),
                SubScore::new("pace", pace_score(wpm)),
            ],
        )
        .with_metric("transcript", transcript)
        .with_metric("words_spoken", words_spoken as u64)
        .with_metric("duration_sec", round2(duration_sec))
        .with_metric("wpm", round2(wpm))
        .with_metric("recognition_sec", round2(recognition_sec))
        .with_metric("transcript_interrupted", transcription.interrupted)
        .with_metric(
            "hesitation_indicators",
            serde_json::to_value(indicators).unwrap_or_default(),
        )
    }
}

impl Analyzer for SpeechConfidenceAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Speech
    }

    fn analyze(&self, input: &AnalysisInput) -> Result<AnalyzerResult, AnalyzerError> {
        self.analyze_audio(&input.audio_path)
    }
}
