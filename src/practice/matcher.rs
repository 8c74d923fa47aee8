//! Pitch acceptance tests for expected notes.
//!
//! Strict: an observed frequency within ±`strict_band_semitones` of the target,
//! also accepted one octave up or down since both extractors occasionally
//! report the wrong octave on low strings.
//!
//! Follow: any fresh attack counts (a strum hits every pending note), and
//! without an attack anything within `follow_span_octaves` of the target.

use crate::analysis::{PitchEstimate, PitchPeak};
use crate::config::MatchConfig;

/// Everything heard in one tick, from both extractors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    pub frequencies: Vec<f32>,
    pub attack: bool,
}

impl Observations {
    pub fn new(estimate: Option<&PitchEstimate>, peaks: &[PitchPeak]) -> Self {
        let frequencies = estimate
            .map(|e| e.frequency_hz)
            .into_iter()
            .chain(peaks.iter().map(|p| p.frequency_hz))
            .collect();
        Self {
            frequencies,
            attack: estimate.is_some_and(|e| e.is_attack),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty() && !self.attack
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    strict_low: f32,
    strict_high: f32,
    follow_low: f32,
    follow_high: f32,
}

impl Matcher {
    pub fn from_config(config: &MatchConfig) -> Self {
        let strict = 2f32.powf(config.strict_band_semitones / 12.0);
        let follow = 2f32.powf(config.follow_span_octaves);
        Self {
            strict_low: 1.0 / strict,
            strict_high: strict,
            follow_low: 1.0 / follow,
            follow_high: follow,
        }
    }

    fn in_strict_band(&self, ratio: f32) -> bool {
        ratio > self.strict_low && ratio < self.strict_high
    }

    /// Within the strict band, directly or one octave off
    pub fn strict_match(&self, observed_hz: f32, target_hz: f32) -> bool {
        if target_hz <= 0.0 || observed_hz <= 0.0 {
            return false;
        }
        let ratio = observed_hz / target_hz;
        self.in_strict_band(ratio)
            || self.in_strict_band(ratio * 2.0)
            || self.in_strict_band(ratio * 0.5)
    }

    pub fn follow_match(&self, observed_hz: f32, target_hz: f32) -> bool {
        if target_hz <= 0.0 || observed_hz <= 0.0 {
            return false;
        }
        let ratio = observed_hz / target_hz;
        ratio >= self.follow_low && ratio <= self.follow_high
    }

    /// Whether anything in `observations` satisfies the active policy
    pub fn matches(&self, follow_mode: bool, target_hz: f32, observations: &Observations) -> bool {
        if follow_mode {
            observations.attack
                || observations
                    .frequencies
                    .iter()
                    .any(|&f| self.follow_match(f, target_hz))
        } else {
            observations
                .frequencies
                .iter()
                .any(|&f| self.strict_match(f, target_hz))
        }
    }
}
