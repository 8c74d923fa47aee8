//! Configuration management for runtime parameter tuning
//!
//! Every threshold in the pipeline was tuned by ear rather than derived, so
//! all of them live here and can be overridden from a JSON file without
//! recompiling. Missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PracticeError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub pitch: PitchConfig,
    pub polyphony: PolyphonyConfig,
    pub stabilizer: StabilizerConfig,
    pub matching: MatchConfig,
}

/// Microphone capture and conditioning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Lower high-pass cutoff, add a low shelf and request raw input
    pub bass_boost: bool,
    /// Analysis window length in samples
    pub window_size: usize,
    /// Preferred device sample rate in Hz
    pub target_sample_rate: u32,
    /// Length of the conditioned-signal ring buffer in seconds
    pub ring_seconds: f32,
    /// Number of blocks circulating between audio callback and tick
    pub buffer_pool_size: usize,
    /// Capacity of each circulating block in samples
    pub block_size: usize,
    pub highpass_hz: f32,
    pub bass_boost_highpass_hz: f32,
    pub low_shelf_hz: f32,
    pub low_shelf_gain_db: f32,
    pub lowpass_hz: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            bass_boost: false,
            // 4096 @ 44.1kHz ≈ 93ms, enough bins to separate low E (82Hz) from F
            window_size: 4096,
            target_sample_rate: 44_100,
            ring_seconds: 5.0,
            buffer_pool_size: 32,
            block_size: 1024,
            highpass_hz: 50.0,
            bass_boost_highpass_hz: 30.0,
            low_shelf_hz: 120.0,
            low_shelf_gain_db: 6.0,
            lowpass_hz: 5_000.0,
        }
    }
}

/// Monophonic extractor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Mean absolute amplitude below which a window counts as silence
    pub volume_gate: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    /// YIN absolute threshold on the normalized difference function
    pub yin_threshold: f32,
    /// Highest aperiodicity accepted when no dip crosses the threshold
    pub max_aperiodicity: f32,
    /// Volume jump over the previous window that flags a new pluck
    pub attack_ratio: f32,
    /// Minimum spacing between two flagged attacks
    pub attack_debounce_ms: u64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            volume_gate: 0.01,
            min_frequency_hz: 50.0,
            max_frequency_hz: 2_000.0,
            yin_threshold: 0.15,
            max_aperiodicity: 0.5,
            attack_ratio: 1.5,
            attack_debounce_ms: 100,
        }
    }
}

/// Polyphonic extractor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyphonyConfig {
    pub max_polyphony: usize,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    /// Absolute floor for a bin to count as a peak
    pub peak_floor_db: f32,
    /// Peaks quieter than the loudest by more than this are dropped
    pub relative_floor_db: f32,
    /// Relative tolerance when testing for integer frequency ratios
    pub harmonic_tolerance: f32,
}

impl Default for PolyphonyConfig {
    fn default() -> Self {
        Self {
            max_polyphony: 4,
            min_frequency_hz: 70.0,
            max_frequency_hz: 2_000.0,
            peak_floor_db: -70.0,
            relative_floor_db: 20.0,
            harmonic_tolerance: 0.03,
        }
    }
}

/// Display debounce parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Consecutive frames before a note is shown (2 ≈ 33ms at 60Hz)
    pub stability_threshold: u32,
    /// Frames a shown note survives without being seen (4 ≈ 66ms at 60Hz)
    pub decay_frames: u64,
    /// Maximum notes reported per pitch update
    pub display_cap: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 2,
            decay_frames: 4,
            display_cap: 3,
        }
    }
}

/// Matching policy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Attack-gated, octave-wide matching with automatic cursor advance
    pub follow_mode_enabled: bool,
    /// Half-width of the strict acceptance band in semitones
    pub strict_band_semitones: f32,
    /// Half-width of the follow-mode acceptance band in octaves
    pub follow_span_octaves: f32,
    pub ticks_per_quarter: i64,
    /// Distance from a note's start tick still judged as perfect
    pub timing_window_ticks: i64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            follow_mode_enabled: false,
            strict_band_semitones: 0.6,
            follow_span_octaves: 1.0,
            ticks_per_quarter: 960,
            // a sixteenth note either side of the start tick
            timing_window_ticks: 240,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults when the file is missing or
    /// malformed (a warning is logged in that case).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/practice_config.json")
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), PracticeError> {
        fn invalid(field: &str, reason: &str) -> PracticeError {
            PracticeError::InvalidConfig {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.capture.window_size < 256 {
            return Err(invalid("capture.window_size", "must be at least 256"));
        }
        if self.capture.block_size == 0 || self.capture.buffer_pool_size == 0 {
            return Err(invalid(
                "capture.block_size",
                "block size and pool size must be greater than 0",
            ));
        }
        if self.capture.ring_seconds <= 0.0 {
            return Err(invalid("capture.ring_seconds", "must be positive"));
        }
        if self.pitch.min_frequency_hz <= 0.0
            || self.pitch.max_frequency_hz <= self.pitch.min_frequency_hz
        {
            return Err(invalid("pitch.frequency range", "must be positive and ordered"));
        }
        if !(self.pitch.volume_gate.is_finite() && self.pitch.volume_gate >= 0.0) {
            return Err(invalid("pitch.volume_gate", "must be finite and non-negative"));
        }
        if !(self.pitch.max_aperiodicity > 0.0 && self.pitch.max_aperiodicity <= 1.0) {
            return Err(invalid("pitch.max_aperiodicity", "must be in (0, 1]"));
        }
        if self.pitch.attack_ratio < 1.0 {
            return Err(invalid("pitch.attack_ratio", "must be at least 1.0"));
        }
        if self.polyphony.max_polyphony == 0 {
            return Err(invalid("polyphony.max_polyphony", "must be greater than 0"));
        }
        if self.polyphony.max_frequency_hz <= self.polyphony.min_frequency_hz {
            return Err(invalid("polyphony.frequency range", "must be ordered"));
        }
        if !(0.0..0.5).contains(&self.polyphony.harmonic_tolerance) {
            return Err(invalid("polyphony.harmonic_tolerance", "must be in [0, 0.5)"));
        }
        if self.stabilizer.stability_threshold == 0 {
            return Err(invalid(
                "stabilizer.stability_threshold",
                "must be greater than 0",
            ));
        }
        if self.stabilizer.decay_frames == 0 {
            return Err(invalid("stabilizer.decay_frames", "must be greater than 0"));
        }
        if self.matching.strict_band_semitones <= 0.0 || self.matching.follow_span_octaves <= 0.0
        {
            return Err(invalid("matching bands", "must be positive"));
        }
        if self.matching.ticks_per_quarter <= 0 || self.matching.timing_window_ticks < 0 {
            return Err(invalid("matching ticks", "must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.capture.bass_boost);
        assert!(!config.matching.follow_mode_enabled);
        assert_eq!(config.polyphony.max_polyphony, 4);
        assert_eq!(config.stabilizer.stability_threshold, 2);
        assert_eq!(config.stabilizer.decay_frames, 4);
        assert_eq!(config.matching.timing_window_ticks, 240);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.pitch.volume_gate, config.pitch.volume_gate);
        assert_eq!(
            parsed.stabilizer.display_cap,
            config.stabilizer.display_cap
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "capture": { "bass_boost": true }, "matching": { "follow_mode_enabled": true } }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();

        assert!(parsed.capture.bass_boost);
        assert!(parsed.matching.follow_mode_enabled);
        assert_eq!(parsed.capture.window_size, 4096);
        assert_eq!(parsed.polyphony.max_polyphony, 4);
    }

    #[test]
    fn test_bundled_asset_is_valid() {
        let parsed: AppConfig =
            serde_json::from_str(include_str!("../assets/practice_config.json")).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.capture.lowpass_hz, AppConfig::default().capture.lowpass_hz);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/practice_config.json");
        assert_eq!(config.pitch.attack_debounce_ms, 100);
    }

    #[test]
    fn test_default_location_is_bundled_asset() {
        // Tests run from the package root, where the asset lives
        let config = AppConfig::load();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.timing_window_ticks, 240);
    }

    fn rejected_field(config: &AppConfig) -> String {
        match config.validate() {
            Err(PracticeError::InvalidConfig { field, .. }) => field,
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_bad_volume_gate() {
        let mut config = AppConfig::default();
        for gate in [-0.01, f32::NAN, f32::INFINITY] {
            config.pitch.volume_gate = gate;
            assert_eq!(rejected_field(&config), "pitch.volume_gate");
        }
        // A zero gate only disables silence detection
        config.pitch.volume_gate = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds_max_aperiodicity() {
        let mut config = AppConfig::default();
        for value in [0.0, -0.2, 1.5, f32::NAN] {
            config.pitch.max_aperiodicity = value;
            assert_eq!(rejected_field(&config), "pitch.max_aperiodicity");
        }
        config.pitch.max_aperiodicity = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_decay() {
        let mut config = AppConfig::default();
        config.stabilizer.decay_frames = 0;
        match config.validate() {
            Err(PracticeError::InvalidConfig { field, .. }) => {
                assert_eq!(field, "stabilizer.decay_frames")
            }
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }
}
