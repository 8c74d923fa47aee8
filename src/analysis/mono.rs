// Monophonic pitch extraction - one fundamental per window plus a pluck flag
//
// Pipeline per window:
// 1. Volume gate on mean absolute amplitude (silence is "no detection")
// 2. YIN: difference function -> cumulative mean normalized difference ->
//    absolute threshold with descent to the local minimum -> parabolic
//    interpolation of the period
// 3. Range check on the resulting frequency
// 4. Attack check on the volume jump against the previous window

use serde::{Deserialize, Serialize};

use crate::audio::capture::{rms_db, AnalysisWindow};
use crate::config::PitchConfig;

use super::note;

/// Single fundamental-frequency estimate for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    pub frequency_hz: f32,
    pub midi: i32,
    /// Note name including octave
    pub note: String,
    pub cents: f32,
    /// Fresh pluck rather than the sustained ring of an earlier one
    pub is_attack: bool,
    /// Milliseconds since the session clock started
    pub timestamp_ms: u64,
    /// 1 - aperiodicity of the chosen period
    pub confidence: f32,
    /// RMS level of the window in dBFS
    pub level_db: f32,
}

/// Raw YIN result before range checks and naming
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YinResult {
    pub frequency_hz: f32,
    /// Normalized difference at the chosen period (0 = perfectly periodic)
    pub aperiodicity: f32,
}

/// Mean absolute amplitude, the volume measure used by the gate and attacks
pub fn mean_abs_volume(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

/// Run YIN over `signal`
///
/// Lags are searched from 2 samples up to the period of `min_frequency_hz`
/// (bounded by half the window). Returns None when no lag qualifies: nothing
/// dips under `threshold` and the deepest dip is above `max_aperiodicity`.
pub fn yin(
    signal: &[f32],
    sample_rate: u32,
    min_frequency_hz: f32,
    threshold: f32,
    max_aperiodicity: f32,
) -> Option<YinResult> {
    let half = signal.len() / 2;
    let tau_max = ((sample_rate as f32 / min_frequency_hz).ceil() as usize + 2).min(half);
    if tau_max < 4 {
        return None;
    }
    let integration = signal.len() - tau_max;

    // Difference function
    let mut cmnd = vec![0.0f32; tau_max];
    for (tau, slot) in cmnd.iter_mut().enumerate().skip(1) {
        *slot = signal[..integration]
            .iter()
            .zip(&signal[tau..tau + integration])
            .map(|(a, b)| {
                let delta = a - b;
                delta * delta
            })
            .sum();
    }

    // Cumulative mean normalized difference
    cmnd[0] = 1.0;
    let mut running_sum = 0.0f32;
    for tau in 1..tau_max {
        running_sum += cmnd[tau];
        cmnd[tau] = if running_sum > 0.0 {
            cmnd[tau] * tau as f32 / running_sum
        } else {
            1.0
        };
    }

    // Absolute threshold, then walk down to the bottom of the dip
    let mut chosen = None;
    let mut tau = 2;
    while tau < tau_max {
        if cmnd[tau] < threshold {
            while tau + 1 < tau_max && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            chosen = Some(tau);
            break;
        }
        tau += 1;
    }

    let tau = match chosen {
        Some(tau) => tau,
        None => {
            let (best, value) = cmnd[2..]
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, &v)| (i + 2, v))?;
            if value > max_aperiodicity {
                return None;
            }
            best
        }
    };

    let period = if tau + 1 < tau_max {
        let (y1, y2, y3) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
        let denominator = y1 - 2.0 * y2 + y3;
        if denominator.abs() > f32::EPSILON {
            tau as f32 + (y1 - y3) / (2.0 * denominator)
        } else {
            tau as f32
        }
    } else {
        tau as f32
    };

    let frequency_hz = sample_rate as f32 / period;
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    Some(YinResult {
        frequency_hz,
        aperiodicity: cmnd[tau].clamp(0.0, 1.0),
    })
}

/// Flags a fresh pluck from the window-to-window volume jump
///
/// The previous volume tracks every window, voiced or not, so a note struck
/// out of silence always counts as a jump. Only voiced windows can raise the
/// flag; raising it starts the debounce interval.
#[derive(Debug)]
pub struct AttackDetector {
    ratio: f32,
    debounce_ms: u64,
    prev_volume: f32,
    last_attack_ms: Option<u64>,
}

impl AttackDetector {
    pub fn new(ratio: f32, debounce_ms: u64) -> Self {
        Self {
            ratio,
            debounce_ms,
            prev_volume: 0.0,
            last_attack_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.prev_volume = 0.0;
        self.last_attack_ms = None;
    }

    pub fn process(&mut self, volume: f32, now_ms: u64, voiced: bool) -> bool {
        let rising = volume >= self.prev_volume * self.ratio;
        self.prev_volume = volume;

        if !voiced || !rising {
            return false;
        }
        if let Some(last) = self.last_attack_ms {
            if now_ms.saturating_sub(last) < self.debounce_ms {
                return false;
            }
        }
        self.last_attack_ms = Some(now_ms);
        true
    }
}

/// Monophonic extractor holding the attack state between windows
pub struct MonoExtractor {
    config: PitchConfig,
    attack: AttackDetector,
}

impl MonoExtractor {
    pub fn new(config: PitchConfig) -> Self {
        let attack = AttackDetector::new(config.attack_ratio, config.attack_debounce_ms);
        Self { config, attack }
    }

    pub fn reset(&mut self) {
        self.attack.reset();
    }

    /// Estimate the fundamental of `window`
    ///
    /// None is the normal outcome for silence, noise and out-of-range pitch.
    pub fn process(&mut self, window: &AnalysisWindow, now_ms: u64) -> Option<PitchEstimate> {
        let volume = mean_abs_volume(&window.samples);
        if volume < self.config.volume_gate {
            self.attack.process(volume, now_ms, false);
            return None;
        }

        let found = yin(
            &window.samples,
            window.sample_rate,
            self.config.min_frequency_hz,
            self.config.yin_threshold,
            self.config.max_aperiodicity,
        )
        .filter(|r| {
            (self.config.min_frequency_hz..=self.config.max_frequency_hz)
                .contains(&r.frequency_hz)
        });

        let is_attack = self.attack.process(volume, now_ms, found.is_some());
        let result = found?;
        let info = note::describe(result.frequency_hz)?;

        Some(PitchEstimate {
            frequency_hz: result.frequency_hz,
            midi: info.midi,
            note: info.name,
            cents: info.cents,
            is_attack,
            timestamp_ms: now_ms,
            confidence: 1.0 - result.aperiodicity,
            level_db: rms_db(&window.samples),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synth;

    const SR: u32 = 44_100;
    const N: usize = 4096;

    fn window(samples: Vec<f32>) -> AnalysisWindow {
        AnalysisWindow::new(samples, SR)
    }

    #[test]
    fn test_detects_a4() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        let estimate = extractor
            .process(&window(synth::sine(440.0, SR, N, 0.5)), 0)
            .expect("A4 should be detected");

        assert!((estimate.frequency_hz - 440.0).abs() < 1.0, "{}", estimate.frequency_hz);
        assert_eq!(estimate.note, "A4");
        assert!(estimate.confidence > 0.9);
    }

    #[test]
    fn test_detects_low_e_with_overtones() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        let tone = synth::harmonic_tone(82.41, SR, N, 0.4, &[1.0, 0.6, 0.4, 0.25]);
        let estimate = extractor.process(&window(tone), 0).expect("E2 detected");

        assert_eq!(estimate.note, "E2");
        assert!(estimate.cents.abs() < 10.0, "cents {}", estimate.cents);
    }

    #[test]
    fn test_quiet_window_is_gated_regardless_of_content() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        // mean |x| of a sine is 2A/π ≈ 0.0032 here
        let quiet = synth::sine(440.0, SR, N, 0.005);
        assert!(mean_abs_volume(&quiet) < 0.01);
        assert!(extractor.process(&window(quiet), 0).is_none());
    }

    #[test]
    fn test_out_of_range_frequencies_discarded() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        assert!(extractor
            .process(&window(synth::sine(3_000.0, SR, N, 0.5)), 0)
            .is_none());
        assert!(extractor
            .process(&window(synth::sine(30.0, SR, N, 0.5)), 100)
            .is_none());
    }

    #[test]
    fn test_noise_yields_no_estimate() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        let noise = synth::white_noise(N, 0.5, 7);
        assert!(extractor.process(&window(noise), 0).is_none());
    }

    #[test]
    fn test_attack_requires_volume_jump() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        let soft = synth::sine(196.0, SR, N, 0.1);
        let loud = synth::sine(196.0, SR, N, 0.4);

        // Out of silence: first voiced window is a pluck
        assert!(extractor.process(&window(soft.clone()), 0).unwrap().is_attack);
        // Sustained ring at the same level
        assert!(!extractor.process(&window(soft.clone()), 200).unwrap().is_attack);
        // Re-pluck: 4x louder, well past the debounce
        assert!(extractor.process(&window(loud), 400).unwrap().is_attack);
    }

    #[test]
    fn test_attack_debounce() {
        let mut extractor = MonoExtractor::new(PitchConfig::default());
        let soft = synth::sine(196.0, SR, N, 0.05);
        let loud = synth::sine(196.0, SR, N, 0.4);

        assert!(extractor.process(&window(loud.clone()), 1_000).unwrap().is_attack);
        assert!(!extractor.process(&window(soft.clone()), 1_016).unwrap().is_attack);
        // Jump again only 50ms after the last flagged attack
        assert!(!extractor.process(&window(loud.clone()), 1_050).unwrap().is_attack);
        assert!(!extractor.process(&window(soft), 1_120).unwrap().is_attack);
        assert!(extractor.process(&window(loud), 1_200).unwrap().is_attack);
    }

    #[test]
    fn test_attack_detector_ignores_unvoiced_windows() {
        let mut detector = AttackDetector::new(1.5, 100);
        assert!(!detector.process(0.3, 0, false));
        // Same volume as the unvoiced window: no jump
        assert!(!detector.process(0.3, 500, true));
        assert!(detector.process(0.6, 600, true));
    }
}
