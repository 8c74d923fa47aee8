// Analysis module - pitch extraction pipeline
//
// Every tick the same window feeds both extractors:
// - MonoExtractor: one YIN fundamental plus the attack flag
// - PolyExtractor: up to max_polyphony fundamentals from the spectrum
// Both outputs go to the matcher unchanged; the stabilizer only debounces
// them for display.

pub mod mono;
pub mod note;
pub mod poly;
pub mod spectrum;
pub mod stabilizer;

use serde::{Deserialize, Serialize};

use crate::audio::capture::AnalysisWindow;
use crate::config::AppConfig;

pub use mono::{MonoExtractor, PitchEstimate};
pub use note::NoteInfo;
pub use poly::{PitchPeak, PolyExtractor};
pub use spectrum::{Spectrum, SpectrumAnalyzer};
pub use stabilizer::{NoteStabilizer, StableNote};

/// Everything extracted from one window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frame: u64,
    pub estimate: Option<PitchEstimate>,
    pub peaks: Vec<PitchPeak>,
    /// Debounced notes for display, loudest first
    pub display: Vec<StableNote>,
}

/// Mono + poly extraction followed by display stabilization
pub struct PitchPipeline {
    mono: MonoExtractor,
    poly: PolyExtractor,
    stabilizer: NoteStabilizer,
    frame: u64,
}

impl PitchPipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mono: MonoExtractor::new(config.pitch.clone()),
            poly: PolyExtractor::new(config.polyphony.clone(), config.capture.window_size),
            stabilizer: NoteStabilizer::new(config.stabilizer.clone()),
            frame: 0,
        }
    }

    /// Clear attack history and stabilizer state for a new session
    pub fn reset(&mut self) {
        self.mono.reset();
        self.stabilizer.reset();
        self.frame = 0;
    }

    pub fn process(&mut self, window: &AnalysisWindow, now_ms: u64) -> FrameAnalysis {
        let frame = self.frame;
        self.frame += 1;

        let estimate = self.mono.process(window, now_ms);
        let peaks = self.poly.process(window);

        let observations = estimate
            .iter()
            .map(|e| StableNote::from_estimate(e, &peaks))
            .chain(peaks.iter().map(StableNote::from))
            .collect::<Vec<_>>();
        let display = self.stabilizer.update(frame, observations);

        FrameAnalysis {
            frame,
            estimate,
            peaks,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synth;

    #[test]
    fn test_steady_tone_confirmed_on_second_frame() {
        let config = AppConfig::default();
        let mut pipeline = PitchPipeline::new(&config);
        let window = AnalysisWindow::new(synth::sine(146.83, 44_100, 4096, 0.4), 44_100);

        let first = pipeline.process(&window, 0);
        assert_eq!(first.frame, 0);
        assert_eq!(first.estimate.as_ref().map(|e| e.note.as_str()), Some("D3"));
        assert!(first.display.is_empty());

        let second = pipeline.process(&window, 16);
        assert_eq!(second.display.len(), 1);
        assert_eq!(second.display[0].note, "D3");
    }

    #[test]
    fn test_mono_and_poly_magnitudes_share_a_scale() {
        let window = AnalysisWindow::new(synth::sine(220.0, 44_100, 4096, 0.4), 44_100);
        let mut pipeline = PitchPipeline::new(&AppConfig::default());
        let frame = pipeline.process(&window, 0);

        let estimate = frame.estimate.as_ref().unwrap();
        let peak = frame.peaks.iter().find(|p| p.midi == estimate.midi).unwrap();
        // 0.4 amplitude is about -8 dB on the peak scale
        let lifted = estimate.level_db + stabilizer::SINE_CREST_DB;
        assert!((lifted - peak.magnitude_db).abs() < 1.5, "{} vs {}", lifted, peak.magnitude_db);
        assert!((lifted - 20.0 * 0.4f32.log10()).abs() < 0.5);
    }

    #[test]
    fn test_silence_produces_nothing() {
        let mut pipeline = PitchPipeline::new(&AppConfig::default());
        let window = AnalysisWindow::new(vec![0.0; 4096], 44_100);
        let frame = pipeline.process(&window, 0);

        assert!(frame.estimate.is_none());
        assert!(frame.peaks.is_empty());
        assert!(frame.display.is_empty());
    }
}
