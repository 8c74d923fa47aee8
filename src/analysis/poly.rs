// Polyphonic pitch extraction - several simultaneous notes from one spectrum
//
// 1. Peak picking: local maxima above an absolute floor inside the guitar
//    range, refined by parabolic interpolation over three bins (in dB)
// 2. Relative filter against the loudest peak
// 3. Greedy harmonic resolution, loudest first: overtones of an accepted
//    fundamental are discarded, and a quieter candidate whose multiple was
//    accepted replaces it (missing-fundamental correction)
// 4. Naming, loudest first

use serde::{Deserialize, Serialize};

use crate::audio::capture::AnalysisWindow;
use crate::config::PolyphonyConfig;

use super::note;
use super::spectrum::{Spectrum, SpectrumAnalyzer};

/// Spectral peak before naming
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPeak {
    pub frequency_hz: f32,
    pub magnitude_db: f32,
}

impl RawPeak {
    pub fn new(frequency_hz: f32, magnitude_db: f32) -> Self {
        Self {
            frequency_hz,
            magnitude_db,
        }
    }
}

/// One resolved pitch candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchPeak {
    pub frequency_hz: f32,
    pub magnitude_db: f32,
    pub midi: i32,
    pub note: String,
    pub cents: f32,
}

/// True when `frequency` sits within `tolerance` of an integer multiple (≥ 2)
/// of `base`
pub fn is_harmonic(frequency: f32, base: f32, tolerance: f32) -> bool {
    if base <= 0.0 || frequency <= 0.0 {
        return false;
    }
    let ratio = frequency / base;
    let n = ratio.round();
    n >= 2.0 && (ratio / n - 1.0).abs() <= tolerance
}

/// Local maxima of `spectrum` inside the configured band and above the floor
pub fn pick_peaks(spectrum: &Spectrum, config: &PolyphonyConfig) -> Vec<RawPeak> {
    let mags = &spectrum.magnitudes_db;
    if mags.len() < 3 || spectrum.bin_hz <= 0.0 {
        return Vec::new();
    }
    let first = ((config.min_frequency_hz / spectrum.bin_hz).floor() as usize).max(1);
    let last = ((config.max_frequency_hz / spectrum.bin_hz).ceil() as usize).min(mags.len() - 2);

    let mut peaks = Vec::new();
    for i in first..=last {
        let (a, b, c) = (mags[i - 1], mags[i], mags[i + 1]);
        if b < config.peak_floor_db || b <= a || b < c {
            continue;
        }
        let denominator = a - 2.0 * b + c;
        let p = if denominator.abs() > f32::EPSILON {
            (0.5 * (a - c) / denominator).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let frequency_hz = spectrum.bin_frequency(i as f32 + p);
        if frequency_hz < config.min_frequency_hz || frequency_hz > config.max_frequency_hz {
            continue;
        }
        peaks.push(RawPeak::new(frequency_hz, b - 0.25 * (a - c) * p));
    }
    peaks
}

/// Reduce raw peaks to at most `max_polyphony` fundamentals, loudest first
pub fn resolve_peaks(peaks: &[RawPeak], config: &PolyphonyConfig) -> Vec<RawPeak> {
    let tolerance = config.harmonic_tolerance;
    let mut pool: Vec<RawPeak> = peaks.to_vec();
    pool.sort_by(|a, b| b.magnitude_db.total_cmp(&a.magnitude_db));

    let Some(loudest) = pool.first().map(|p| p.magnitude_db) else {
        return Vec::new();
    };
    pool.retain(|p| p.magnitude_db >= loudest - config.relative_floor_db);

    let mut accepted: Vec<RawPeak> = Vec::new();
    while !pool.is_empty() && accepted.len() < config.max_polyphony {
        let candidate = pool.remove(0);

        if accepted
            .iter()
            .any(|a| is_harmonic(candidate.frequency_hz, a.frequency_hz, tolerance))
        {
            continue;
        }

        match accepted
            .iter()
            .position(|a| is_harmonic(a.frequency_hz, candidate.frequency_hz, tolerance))
        {
            Some(index) => {
                accepted[index] = candidate;
                // Other accepted overtones of the new fundamental go too
                let mut i = 0;
                accepted.retain(|a| {
                    let keep = i == index
                        || !is_harmonic(a.frequency_hz, candidate.frequency_hz, tolerance);
                    i += 1;
                    keep
                });
            }
            None => accepted.push(candidate),
        }

        pool.retain(|p| !is_harmonic(p.frequency_hz, candidate.frequency_hz, tolerance));
    }

    accepted.sort_by(|a, b| b.magnitude_db.total_cmp(&a.magnitude_db));
    accepted
}

/// Polyphonic extractor owning its FFT plan
pub struct PolyExtractor {
    config: PolyphonyConfig,
    analyzer: SpectrumAnalyzer,
}

impl PolyExtractor {
    pub fn new(config: PolyphonyConfig, fft_size: usize) -> Self {
        Self {
            config,
            analyzer: SpectrumAnalyzer::new(fft_size),
        }
    }

    pub fn process(&self, window: &AnalysisWindow) -> Vec<PitchPeak> {
        let spectrum = self.analyzer.analyze(&window.samples, window.sample_rate);
        self.process_spectrum(&spectrum)
    }

    pub fn process_spectrum(&self, spectrum: &Spectrum) -> Vec<PitchPeak> {
        let raw = pick_peaks(spectrum, &self.config);
        resolve_peaks(&raw, &self.config)
            .into_iter()
            .filter_map(|peak| {
                note::describe(peak.frequency_hz).map(|info| PitchPeak {
                    frequency_hz: peak.frequency_hz,
                    magnitude_db: peak.magnitude_db,
                    midi: info.midi,
                    note: info.name,
                    cents: info.cents,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synth;

    fn freqs(peaks: &[RawPeak]) -> Vec<f32> {
        peaks.iter().map(|p| p.frequency_hz).collect()
    }

    #[test]
    fn test_harmonic_ratio() {
        assert!(is_harmonic(220.0, 110.0, 0.03));
        assert!(is_harmonic(332.0, 110.0, 0.03));
        assert!(!is_harmonic(110.0, 110.0, 0.03));
        assert!(!is_harmonic(165.0, 110.0, 0.03));
        assert!(!is_harmonic(240.0, 110.0, 0.03));
    }

    #[test]
    fn test_overtone_suppressed() {
        let peaks = [RawPeak::new(110.0, -10.0), RawPeak::new(220.0, -12.0)];
        let resolved = resolve_peaks(&peaks, &PolyphonyConfig::default());
        assert_eq!(freqs(&resolved), vec![110.0]);
    }

    #[test]
    fn test_missing_fundamental_correction() {
        let peaks = [RawPeak::new(220.0, -5.0), RawPeak::new(110.0, -8.0)];
        let resolved = resolve_peaks(&peaks, &PolyphonyConfig::default());
        assert_eq!(freqs(&resolved), vec![110.0]);
        assert_eq!(resolved[0].magnitude_db, -8.0);
    }

    #[test]
    fn test_correction_drops_every_overtone_of_new_fundamental() {
        // 220 and 330 both accepted before their common fundamental shows up
        let peaks = [
            RawPeak::new(220.0, -4.0),
            RawPeak::new(330.0, -5.0),
            RawPeak::new(110.0, -9.0),
        ];
        let resolved = resolve_peaks(&peaks, &PolyphonyConfig::default());
        assert_eq!(freqs(&resolved), vec![110.0]);
    }

    #[test]
    fn test_relative_floor() {
        let peaks = [RawPeak::new(110.0, -10.0), RawPeak::new(147.0, -35.0)];
        let resolved = resolve_peaks(&peaks, &PolyphonyConfig::default());
        assert_eq!(freqs(&resolved), vec![110.0]);
    }

    #[test]
    fn test_polyphony_cap_and_order() {
        let peaks = [
            RawPeak::new(146.83, -14.0),
            RawPeak::new(110.0, -10.0),
            RawPeak::new(196.0, -12.0),
            RawPeak::new(123.47, -11.0),
            RawPeak::new(261.63, -13.0),
        ];
        let resolved = resolve_peaks(&peaks, &PolyphonyConfig::default());
        assert_eq!(resolved.len(), 4);
        assert_eq!(freqs(&resolved), vec![110.0, 123.47, 196.0, 261.63]);
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve_peaks(&[], &PolyphonyConfig::default()).is_empty());
    }

    #[test]
    fn test_two_note_dyad_from_audio() {
        let sr = 44_100;
        let a2 = synth::sine(110.0, sr, 4096, 0.3);
        let e3 = synth::sine(164.81, sr, 4096, 0.25);
        let mixed: Vec<f32> = a2.iter().zip(&e3).map(|(a, b)| a + b).collect();

        let extractor = PolyExtractor::new(PolyphonyConfig::default(), 4096);
        let peaks = extractor.process(&AnalysisWindow::new(mixed, sr));
        let names: Vec<&str> = peaks.iter().map(|p| p.note.as_str()).collect();

        assert_eq!(names, vec!["A2", "E3"]);
        assert!((peaks[0].frequency_hz - 110.0).abs() < 2.0);
    }

    #[test]
    fn test_guitar_tone_reports_only_fundamental() {
        let sr = 44_100;
        let tone = synth::harmonic_tone(110.0, sr, 4096, 0.5, &[1.0, 0.5, 0.3]);
        let extractor = PolyExtractor::new(PolyphonyConfig::default(), 4096);
        let peaks = extractor.process(&AnalysisWindow::new(tone, sr));

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].note, "A2");
    }

    #[test]
    fn test_silence_has_no_peaks() {
        let extractor = PolyExtractor::new(PolyphonyConfig::default(), 1024);
        assert!(extractor
            .process(&AnalysisWindow::new(vec![0.0; 1024], 44_100))
            .is_empty());
    }
}
