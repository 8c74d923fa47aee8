//! Display debounce for per-frame detections.
//!
//! A note must be seen in `stability_threshold` consecutive frames before it
//! is shown, and stays shown until it has gone unseen for more than
//! `decay_frames`. Once confirmed, a short dropout inside the decay window
//! does not reset the confirmation. Only the UI reads this; matching works on
//! the raw extractor output.
//!
//! Magnitudes are on the spectrum's peak-amplitude scale (a full-scale sine
//! reads 0 dB), so mono and poly reports of one note compare fairly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::StabilizerConfig;

use super::mono::PitchEstimate;
use super::poly::PitchPeak;

/// Note as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableNote {
    pub note: String,
    pub cents: f32,
    pub frequency_hz: f32,
    pub magnitude_db: f32,
}

impl From<&PitchPeak> for StableNote {
    fn from(peak: &PitchPeak) -> Self {
        Self {
            note: peak.note.clone(),
            cents: peak.cents,
            frequency_hz: peak.frequency_hz,
            magnitude_db: peak.magnitude_db,
        }
    }
}

/// Peak amplitude of a sine sits this far above its RMS level
pub const SINE_CREST_DB: f32 = 3.010_3;

impl StableNote {
    /// Display entry for a monophonic estimate
    ///
    /// Takes the spectral height of a peak naming the same note when the
    /// polyphonic extractor saw one. Otherwise the window's RMS level is
    /// lifted by [`SINE_CREST_DB`] onto the spectral scale.
    pub fn from_estimate(estimate: &PitchEstimate, peaks: &[PitchPeak]) -> Self {
        let magnitude_db = peaks
            .iter()
            .find(|peak| peak.midi == estimate.midi)
            .map_or(estimate.level_db + SINE_CREST_DB, |peak| peak.magnitude_db);
        Self {
            note: estimate.note.clone(),
            cents: estimate.cents,
            frequency_hz: estimate.frequency_hz,
            magnitude_db,
        }
    }
}

/// Per-note tracking state
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerEntry {
    pub consecutive_frames: u32,
    pub last_seen_frame: u64,
    pub last_peak: StableNote,
}

#[derive(Debug)]
pub struct NoteStabilizer {
    config: StabilizerConfig,
    entries: HashMap<String, StabilizerEntry>,
}

impl NoteStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn entry(&self, note: &str) -> Option<&StabilizerEntry> {
        self.entries.get(note)
    }

    fn is_confirmed(&self, entry: &StabilizerEntry) -> bool {
        entry.consecutive_frames >= self.config.stability_threshold
    }

    /// Feed one frame of detections and return the notes to display
    ///
    /// A note reported twice in the same frame (e.g. by both extractors)
    /// counts once; the louder report is kept.
    pub fn update<I>(&mut self, frame: u64, observations: I) -> Vec<StableNote>
    where
        I: IntoIterator<Item = StableNote>,
    {
        let threshold = self.config.stability_threshold;

        for observed in observations {
            match self.entries.get_mut(&observed.note) {
                Some(entry) if entry.last_seen_frame == frame => {
                    if observed.magnitude_db > entry.last_peak.magnitude_db {
                        entry.last_peak = observed;
                    }
                }
                Some(entry) => {
                    if entry.last_seen_frame + 1 == frame {
                        entry.consecutive_frames += 1;
                    } else if entry.consecutive_frames < threshold {
                        entry.consecutive_frames = 1;
                    }
                    entry.last_seen_frame = frame;
                    entry.last_peak = observed;
                }
                None => {
                    self.entries.insert(
                        observed.note.clone(),
                        StabilizerEntry {
                            consecutive_frames: 1,
                            last_seen_frame: frame,
                            last_peak: observed,
                        },
                    );
                }
            }
        }

        let decay = self.config.decay_frames;
        self.entries
            .retain(|_, entry| frame.saturating_sub(entry.last_seen_frame) <= decay);

        let mut confirmed: Vec<StableNote> = self
            .entries
            .values()
            .filter(|entry| self.is_confirmed(entry))
            .map(|entry| entry.last_peak.clone())
            .collect();
        confirmed.sort_by(|a, b| {
            b.magnitude_db
                .total_cmp(&a.magnitude_db)
                .then_with(|| a.note.cmp(&b.note))
        });
        confirmed.truncate(self.config.display_cap);
        confirmed
    }
}
