//! Score arithmetic shared by all analyzers
//!
//! Heuristic sub-scores are driven by named threshold tables (`BandTable`)
//! and combined with fixed weight sets (`WeightSet`). Tables and weights are
//! plain constants so they can be tested and tuned without touching the
//! analyzer control flow.

use std::collections::BTreeMap;

/// Neutral score used for defaults and degraded results
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Tolerance when checking that a weight set sums to 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Clamp a score into [0, 100]; NaN maps to 0
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Round to two decimals (report presentation)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// How a band threshold is compared against the measured value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandDirection {
    /// `value >= threshold` selects the band (larger is better)
    AtLeast,
    /// `value < threshold` selects the band (smaller is better)
    Below,
}

/// Ordered threshold table mapping a raw measurement to a score
///
/// Bands are checked top to bottom; the first match wins. Values matching
/// no band get `otherwise`.
#[derive(Debug, Clone, Copy)]
pub struct BandTable {
    /// Table name for diagnostics
    pub name: &'static str,
    /// Comparison direction
    pub direction: BandDirection,
    /// `(threshold, score)` pairs, checked in order
    pub bands: &'static [(f64, f64)],
    /// Score when no band matches
    pub otherwise: f64,
}

impl BandTable {
    /// Table where larger measurements score higher
    pub const fn at_least(name: &'static str, bands: &'static [(f64, f64)], otherwise: f64) -> Self {
        Self {
            name,
            direction: BandDirection::AtLeast,
            bands,
            otherwise,
        }
    }

    /// Table where smaller measurements score higher
    pub const fn below(name: &'static str, bands: &'static [(f64, f64)], otherwise: f64) -> Self {
        Self {
            name,
            direction: BandDirection::Below,
            bands,
            otherwise,
        }
    }

    /// Score a raw measurement
    pub fn score(&self, value: f64) -> f64 {
        for &(threshold, score) in self.bands {
            let hit = match self.direction {
                BandDirection::AtLeast => value >= threshold,
                BandDirection::Below => value < threshold,
            };
            if hit {
                return score;
            }
        }
        self.otherwise
    }
}

/// Fixed set of named weights
#[derive(Debug, Clone, Copy)]
pub struct WeightSet {
    /// `(sub-score name, weight)` pairs
    pub entries: &'static [(&'static str, f64)],
}

impl WeightSet {
    /// Create a weight set
    pub const fn new(entries: &'static [(&'static str, f64)]) -> Self {
        Self { entries }
    }

    /// Sum of all weights (1.0 for every set the engine ships)
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Weight for a named component
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, w)| *w)
    }

    /// Weighted combination of named scores, clamped to [0, 100]
    ///
    /// A component absent from `scores` contributes the neutral score.
    pub fn combine(&self, scores: &BTreeMap<String, f64>) -> f64 {
        let sum: f64 = self
            .entries
            .iter()
            .map(|(name, weight)| {
                let score = scores.get(*name).copied().unwrap_or(NEUTRAL_SCORE);
                clamp_score(score) * weight
            })
            .sum();
        clamp_score(sum)
    }
}

/// Running mean accumulator for per-frame sub-scores
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    /// Add one observation
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Number of observations
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean, or `default` when empty
    pub fn mean_or(&self, default: f64) -> f64 {
        if self.count == 0 {
            default
        } else {
            self.sum / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGHER: BandTable = BandTable::at_least("higher", &[(10.0, 90.0), (5.0, 60.0)], 20.0);
    const LOWER: BandTable = BandTable::below("lower", &[(1.0, 95.0), (2.0, 70.0)], 10.0);
    const WEIGHTS: WeightSet = WeightSet::new(&[("a", 0.75), ("b", 0.25)]);

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-5.0), 0.0);
        assert_eq!(clamp_score(150.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(50.0), 50.0);
    }

    #[test]
    fn test_at_least_band_edges() {
        assert_eq!(HIGHER.score(10.0), 90.0);
        assert_eq!(HIGHER.score(9.99), 60.0);
        assert_eq!(HIGHER.score(5.0), 60.0);
        assert_eq!(HIGHER.score(4.0), 20.0);
    }

    #[test]
    fn test_below_band_edges() {
        assert_eq!(LOWER.score(0.5), 95.0);
        assert_eq!(LOWER.score(1.0), 70.0);
        assert_eq!(LOWER.score(2.0), 10.0);
    }

    #[test]
    fn test_weight_set_combine() {
        let mut scores = BTreeMap::new();
        scores.insert("a".to_string(), 100.0);
        scores.insert("b".to_string(), 0.0);
        assert!((WEIGHTS.combine(&scores) - 75.0).abs() < 1e-9);
        assert!((WEIGHTS.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert_eq!(WEIGHTS.weight("b"), Some(0.25));
        assert_eq!(WEIGHTS.weight("c"), None);
    }

    #[test]
    fn test_weight_set_missing_component_is_neutral() {
        let mut scores = BTreeMap::new();
        scores.insert("a".to_string(), 50.0);
        assert!((WEIGHTS.combine(&scores) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_accumulator() {
        let mut acc = MeanAccumulator::default();
        assert_eq!(acc.mean_or(50.0), 50.0);
        acc.push(80.0);
        acc.push(40.0);
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.mean_or(0.0), 60.0);
    }
}
