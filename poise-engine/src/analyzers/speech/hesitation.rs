//! Hesitation indicators: filler words, long pauses, stuttered repeats

use crate::types::WordToken;
use serde::{Deserialize, Serialize};

/// Single-word fillers (matched case-insensitively)
pub const FILLER_WORDS: &[&str] = &[
    "um", "uh", "umm", "uhm", "er", "ah", "hmm", "like", "basically", "actually", "literally",
];

/// Two-word filler phrases
pub const FILLER_PHRASES: &[(&str, &str)] = &[
    ("you", "know"),
    ("i", "mean"),
    ("kind", "of"),
    ("sort", "of"),
];

/// Silence between two words longer than this counts as a pause
pub const PAUSE_THRESHOLD_SECONDS: f64 = 1.0;

pub const FILLER_PENALTY: f64 = 5.0;
pub const PAUSE_PENALTY: f64 = 3.0;
pub const REPETITION_PENALTY: f64 = 4.0;

/// Counted hesitation evidence for one transcript
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HesitationIndicators {
    pub filler_words: u32,
    pub pauses: u32,
    pub repetitions: u32,
}

impl HesitationIndicators {
    /// Count all indicators
    ///
    /// # Arguments
    /// * `words` - Normalised transcript words (see `normalize_words`)
    /// * `tokens` - Recognizer word timings (may be empty)
    pub fn detect(words: &[String], tokens: &[WordToken]) -> Self {
        Self {
            filler_words: count_fillers(words),
            pauses: count_pauses(tokens),
            repetitions: count_repetitions(words),
        }
    }

    pub fn penalty(&self) -> f64 {
        FILLER_PENALTY * self.filler_words as f64
            + PAUSE_PENALTY * self.pauses as f64
            + REPETITION_PENALTY * self.repetitions as f64
    }

    /// Hesitation sub-score
    ///
    /// An empty transcript scores 0: no speech is not evidence of fluency.
    pub fn score(&self, transcript_empty: bool) -> f64 {
        if transcript_empty {
            0.0
        } else {
            (100.0 - self.penalty()).max(0.0)
        }
    }
}

/// Lower-case words with surrounding punctuation stripped
pub fn normalize_words(transcript: &str) -> Vec<String> {
    transcript
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Count single-word fillers and two-word filler phrases
pub fn count_fillers(words: &[String]) -> u32 {
    let singles = words
        .iter()
        .filter(|w| FILLER_WORDS.contains(&w.as_str()))
        .count();

    let phrases = words
        .windows(2)
        .filter(|pair| {
            FILLER_PHRASES
                .iter()
                .any(|(a, b)| pair[0] == *a && pair[1] == *b)
        })
        .count();

    (singles + phrases) as u32
}

/// Count inter-word gaps longer than `PAUSE_THRESHOLD_SECONDS`
pub fn count_pauses(tokens: &[WordToken]) -> u32 {
    tokens
        .windows(2)
        .filter(|pair| pair[1].start - pair[0].end > PAUSE_THRESHOLD_SECONDS)
        .count() as u32
}

/// Count immediate triple repeats ("I I I")
///
/// Each window of three identical consecutive words counts once, so four
/// repeats in a row count twice.
pub fn count_repetitions(words: &[String]) -> u32 {
    words
        .windows(3)
        .filter(|w| w[0] == w[1] && w[1] == w[2])
        .count() as u32
}
