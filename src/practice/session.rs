//! Session scoring: hits, misses, combo and points.
//!
//! Each hit is worth 100 points times a combo multiplier that doubles every
//! 10 consecutive hits, capped at 8x. A miss resets the combo.

use serde::{Deserialize, Serialize};

use super::timing::TimingClassification;

const POINTS_PER_HIT: u64 = 100;
const COMBO_STEP: u32 = 10;
const MAX_MULTIPLIER: u64 = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub hits: u32,
    pub misses: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub score: u64,
    pub perfect: u32,
    pub early: u32,
    pub late: u32,
}

/// Snapshot reported when a session ends or on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u64,
    pub hits: u32,
    pub misses: u32,
    pub max_combo: u32,
    /// Percentage of judged notes that were hit
    pub accuracy: f32,
    pub perfect: u32,
    pub early: u32,
    pub late: u32,
}

impl SessionStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Multiplier for the current combo: 1x, 2x, 4x, 8x
    pub fn multiplier(&self) -> u64 {
        let doublings = (self.combo / COMBO_STEP).min(3);
        (1u64 << doublings).min(MAX_MULTIPLIER)
    }

    /// Count a hit and return the points it earned
    pub fn record_hit(&mut self, timing: TimingClassification) -> u64 {
        self.hits += 1;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        match timing {
            TimingClassification::Perfect => self.perfect += 1,
            TimingClassification::Early => self.early += 1,
            TimingClassification::Late => self.late += 1,
        }

        let points = POINTS_PER_HIT * self.multiplier();
        self.score += points;
        points
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.combo = 0;
    }

    pub fn accuracy(&self) -> f32 {
        let judged = self.hits + self.misses;
        if judged == 0 {
            0.0
        } else {
            self.hits as f32 / judged as f32 * 100.0
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            score: self.score,
            hits: self.hits,
            misses: self.misses,
            max_combo: self.max_combo,
            accuracy: self.accuracy(),
            perfect: self.perfect,
            early: self.early,
            late: self.late,
        }
    }
}
