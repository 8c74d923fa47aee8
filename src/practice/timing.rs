//! Timing - how close to its written position a note was played
//!
//! Positions are score ticks (960 per quarter note by default). A note matched
//! within `timing_window_ticks` of its start tick is perfect; outside that
//! window it is early or late by the sign of the offset.

use serde::{Deserialize, Serialize};

/// Timing classification of a hit relative to the note's start tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingClassification {
    /// Within the window either side of the start tick
    Perfect,
    /// Played before the window opened
    Early,
    /// Played after the window closed
    Late,
}

/// Timing feedback with classification and signed tick offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingFeedback {
    pub classification: TimingClassification,
    /// Current position minus the note's start tick
    /// - Positive values indicate late
    /// - Negative values indicate early
    pub offset_ticks: i64,
}

/// Tick-based timing judge
#[derive(Debug, Clone, Copy)]
pub struct TimingJudge {
    window_ticks: i64,
}

impl TimingJudge {
    pub fn new(window_ticks: i64) -> Self {
        Self {
            window_ticks: window_ticks.abs(),
        }
    }

    pub fn window_ticks(&self) -> i64 {
        self.window_ticks
    }

    /// Classify a hit registered at `current_tick` for a note starting at
    /// `start_tick`; the window edges count as perfect
    pub fn classify(&self, current_tick: i64, start_tick: i64) -> TimingFeedback {
        let offset_ticks = current_tick - start_tick;
        let classification = if offset_ticks.abs() <= self.window_ticks {
            TimingClassification::Perfect
        } else if offset_ticks < 0 {
            TimingClassification::Early
        } else {
            TimingClassification::Late
        };
        TimingFeedback {
            classification,
            offset_ticks,
        }
    }
}
