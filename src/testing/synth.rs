//! Deterministic signal synthesis for tests and the simulate command.
//!
//! Everything here is reproducible: noise is drawn from a seeded `StdRng`
//! so a failing test replays the exact same input.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::PI;

/// `len` samples of a sine at `frequency_hz` with peak `amplitude`
pub fn sine(frequency_hz: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
    let step = 2.0 * PI * frequency_hz / sample_rate as f32;
    (0..len).map(|i| amplitude * (step * i as f32).sin()).collect()
}

/// Tone with overtones: `weights[k]` is the relative level of partial `k + 1`
///
/// Weights are normalized so the peak never exceeds `amplitude`.
pub fn harmonic_tone(
    frequency_hz: f32,
    sample_rate: u32,
    len: usize,
    amplitude: f32,
    weights: &[f32],
) -> Vec<f32> {
    let total: f32 = weights.iter().map(|w| w.abs()).sum();
    if total <= 0.0 {
        return vec![0.0; len];
    }
    let step = 2.0 * PI * frequency_hz / sample_rate as f32;
    (0..len)
        .map(|i| {
            let phase = step * i as f32;
            weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * (phase * (k + 1) as f32).sin())
                .sum::<f32>()
                * amplitude
                / total
        })
        .collect()
}

/// Guitar-like pluck: harmonic tone under an exponential decay
///
/// `decay_per_second` is the amplitude lost per second in nepers.
pub fn plucked(
    frequency_hz: f32,
    sample_rate: u32,
    len: usize,
    amplitude: f32,
    decay_per_second: f32,
) -> Vec<f32> {
    let mut tone = harmonic_tone(
        frequency_hz,
        sample_rate,
        len,
        amplitude,
        &[1.0, 0.5, 0.33, 0.25],
    );
    let per_sample = decay_per_second / sample_rate as f32;
    for (i, sample) in tone.iter_mut().enumerate() {
        *sample *= (-per_sample * i as f32).exp();
    }
    tone
}

/// Uniform white noise in [-amplitude, amplitude)
///
/// A zero, negative or NaN amplitude yields silence.
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    if amplitude.is_nan() || amplitude <= 0.0 {
        return vec![0.0; len];
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

/// Sample-wise sum of several signals, as long as the longest one
pub fn mix(signals: &[Vec<f32>]) -> Vec<f32> {
    let len = signals.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![0.0; len];
    for signal in signals {
        for (acc, &s) in out.iter_mut().zip(signal) {
            *acc += s;
        }
    }
    out
}
