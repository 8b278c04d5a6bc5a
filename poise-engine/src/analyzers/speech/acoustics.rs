//! Frame-level acoustic features for tone and clarity
//!
//! Works on mono f32 samples in [-1, 1]. Frames below `SILENCE_RMS` are
//! ignored so leading/trailing silence does not dominate the contours.

use anyhow::{bail, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Analysis frame length in samples
pub const FRAME_SIZE: usize = 1024;

/// Hop between analysis frames
pub const HOP_SIZE: usize = 512;

/// RMS below which a frame counts as silence
pub const SILENCE_RMS: f32 = 0.01;

/// Pitch search range (Hz)
pub const MIN_PITCH_HZ: f32 = 75.0;
pub const MAX_PITCH_HZ: f32 = 400.0;

/// Normalised autocorrelation peak needed to call a frame voiced
pub const VOICING_THRESHOLD: f32 = 0.3;

/// Spectral centroid mapped to a clarity of 1.0
pub const CENTROID_REFERENCE_HZ: f32 = 4000.0;

/// Zero-crossing rate mapped to a clarity penalty of 1.0
pub const ZCR_REFERENCE: f32 = 0.3;

/// Calculate RMS (Root Mean Square) energy
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Calculate Zero-Crossing Rate (crossings per sample)
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();

    crossings as f32 / samples.len() as f32
}

/// Estimate the fundamental frequency of one frame by autocorrelation
///
/// Returns `None` for unvoiced frames.
pub fn estimate_pitch(frame: &[f32], sample_rate: u32) -> Option<f32> {
    let sr = sample_rate as f32;
    let min_lag = (sr / MAX_PITCH_HZ).floor() as usize;
    let max_lag = ((sr / MIN_PITCH_HZ).ceil() as usize).min(frame.len().saturating_sub(1));
    if min_lag == 0 || min_lag >= max_lag {
        return None;
    }

    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy <= f32::EPSILON {
        return None;
    }

    let (best_lag, best_corr) = (min_lag..=max_lag)
        .map(|lag| {
            let corr: f32 = frame[..frame.len() - lag]
                .iter()
                .zip(&frame[lag..])
                .map(|(a, b)| a * b)
                .sum();
            (lag, corr / energy)
        })
        .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    (best_corr >= VOICING_THRESHOLD).then(|| sr / best_lag as f32)
}

/// Spectral centroid (Hz) of one frame using a Hann-windowed FFT
fn spectral_centroid(fft: &dyn rustfft::Fft<f32>, window: &[f32], frame: &[f32], sample_rate: u32) -> Option<f32> {
    let mut buffer: Vec<Complex<f32>> = frame
        .iter()
        .zip(window)
        .map(|(s, w)| Complex::new(s * w, 0.0))
        .collect();
    buffer.resize(FRAME_SIZE, Complex::new(0.0, 0.0));
    fft.process(&mut buffer);

    let bin_hz = sample_rate as f32 / FRAME_SIZE as f32;
    let (weighted, total) = buffer[..FRAME_SIZE / 2 + 1]
        .iter()
        .enumerate()
        .fold((0.0f32, 0.0f32), |(weighted, total), (bin, x)| {
            let magnitude = x.norm();
            (weighted + bin as f32 * bin_hz * magnitude, total + magnitude)
        });

    (total > f32::EPSILON).then(|| weighted / total)
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32).cos())
        .collect()
}

/// Non-silent analysis frames
fn voiced_frames(samples: &[f32]) -> impl Iterator<Item = &[f32]> {
    let starts = if samples.len() >= FRAME_SIZE {
        (samples.len() - FRAME_SIZE) / HOP_SIZE + 1
    } else {
        0
    };
    (0..starts)
        .map(move |i| &samples[i * HOP_SIZE..i * HOP_SIZE + FRAME_SIZE])
        .filter(|frame| rms_energy(frame) >= SILENCE_RMS)
}

/// Coefficient of variation (std / mean)
fn coefficient_of_variation(values: &[f32]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt() / mean)
}

/// Tone score from pitch and energy stability
///
/// Each stability is `100 - CV*100`; the two are averaged and clamped.
///
/// # Errors
/// Fails when there are fewer than two voiced frames.
pub fn tone_score(samples: &[f32], sample_rate: u32) -> Result<f64> {
    let mut pitches = Vec::new();
    let mut energies = Vec::new();
    for frame in voiced_frames(samples) {
        energies.push(rms_energy(frame));
        if let Some(pitch) = estimate_pitch(frame, sample_rate) {
            pitches.push(pitch);
        }
    }

    let Some(pitch_cv) = coefficient_of_variation(&pitches) else {
        bail!("Not enough voiced frames for a pitch contour ({})", pitches.len());
    };
    let Some(energy_cv) = coefficient_of_variation(&energies) else {
        bail!("Not enough frames for an energy contour ({})", energies.len());
    };

    let pitch_stability = 100.0 - pitch_cv * 100.0;
    let energy_stability = 100.0 - energy_cv * 100.0;
    Ok(((pitch_stability + energy_stability) / 2.0).clamp(0.0, 100.0))
}

/// Clarity score from mean spectral centroid and inverse zero-crossing rate
///
/// # Errors
/// Fails when the signal has no non-silent frame.
pub fn clarity_score(samples: &[f32], sample_rate: u32) -> Result<f64> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let window = hann_window(FRAME_SIZE);

    let mut centroids = Vec::new();
    let mut zcrs = Vec::new();
    for frame in voiced_frames(samples) {
        if let Some(centroid) = spectral_centroid(fft.as_ref(), &window, frame, sample_rate) {
            centroids.push(centroid);
        }
        zcrs.push(zero_crossing_rate(frame));
    }

    if centroids.is_empty() {
        bail!("No audible frames for clarity analysis");
    }

    let mean_centroid = centroids.iter().sum::<f32>() / centroids.len() as f32;
    let mean_zcr = zcrs.iter().sum::<f32>() / zcrs.len() as f32;

    let centroid_norm = (mean_centroid / CENTROID_REFERENCE_HZ).min(1.0) as f64;
    let zcr_norm = (mean_zcr / ZCR_REFERENCE).min(1.0) as f64;

    Ok((100.0 * (0.5 * centroid_norm + 0.5 * (1.0 - zcr_norm))).clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16_000;

    fn sine(freq: f32, seconds: f32, amplitude: f32) -> Vec<f32> {
        let n = (SR as f32 * seconds) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn test_rms_energy_silence() {
        assert_eq!(rms_energy(&[0.0; 1000]), 0.0);
        assert_eq!(rms_energy(&[1.0; 1000]), 1.0);
    }

    #[test]
    fn test_zero_crossing_rate_dc() {
        assert_eq!(zero_crossing_rate(&[0.5; 1000]), 0.0);
        let alternating: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((zero_crossing_rate(&alternating) - 0.999).abs() < 0.01);
    }

    #[test]
    fn test_pitch_of_sine() {
        let tone = sine(200.0, 0.1, 0.5);
        let pitch = estimate_pitch(&tone[..FRAME_SIZE], SR).unwrap();
        assert!((pitch - 200.0).abs() < 5.0, "pitch was {}", pitch);
    }

    #[test]
    fn test_steady_tone_is_stable() {
        let score = tone_score(&sine(180.0, 1.0, 0.4), SR).unwrap();
        assert!(score > 90.0, "score was {}", score);
    }

    #[test]
    fn test_silence_has_no_tone() {
        assert!(tone_score(&vec![0.0; SR as usize], SR).is_err());
        assert!(clarity_score(&vec![0.0; SR as usize], SR).is_err());
    }

    #[test]
    fn test_clarity_in_range() {
        let score = clarity_score(&sine(1000.0, 0.5, 0.5), SR).unwrap();
        assert!((0.0..=100.0).contains(&score));
        // 1 kHz sine: centroid ~1000 Hz (0.25), zcr ~0.125 (0.417)
        assert!((score - 41.7).abs() < 5.0, "score was {}", score);
    }
}
