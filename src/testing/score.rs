//! In-memory score collaborator for tests and the simulate command.
//!
//! Clones share state, so a test can hand one clone to the service and keep
//! another to move the playback position or inject failures.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::PracticeError;
use crate::practice::{ExternalRef, ScoreCollaborator, ScoreNote};

/// Open-string MIDI numbers, string 1 (high E) first
pub const STANDARD_TUNING: [i32; 6] = [64, 59, 55, 50, 45, 40];

#[derive(Debug)]
struct ScoreState {
    tuning: Vec<i32>,
    position: i64,
    set_count: u32,
    fail_reads: bool,
    fail_writes: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedScore {
    state: Arc<Mutex<ScoreState>>,
}

impl SimulatedScore {
    pub fn with_tuning(tuning: Vec<i32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScoreState {
                tuning,
                position: 0,
                set_count: 0,
                fail_reads: false,
                fail_writes: false,
            })),
        }
    }

    /// Six-string guitar in E standard
    pub fn standard_tuning() -> Self {
        Self::with_tuning(STANDARD_TUNING.to_vec())
    }

    fn state(&self) -> MutexGuard<'_, ScoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn position(&self) -> i64 {
        self.state().position
    }

    /// Move playback as the host's transport would
    pub fn set_position(&self, tick: i64) {
        self.state().position = tick;
    }

    pub fn advance(&self, ticks: i64) {
        self.state().position += ticks;
    }

    /// Number of cursor moves requested through the collaborator
    pub fn set_count(&self) -> u32 {
        self.state().set_count
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }
}

impl ScoreCollaborator for SimulatedScore {
    fn current_tick_position(&self) -> Result<i64, PracticeError> {
        let state = self.state();
        if state.fail_reads {
            return Err(PracticeError::ScoreUnavailable {
                reason: "simulated read failure".to_string(),
            });
        }
        Ok(state.position)
    }

    fn open_string_midi(&self, string_index: u8) -> Option<i32> {
        let index = usize::from(string_index).checked_sub(1)?;
        self.state().tuning.get(index).copied()
    }

    fn set_tick_position(&mut self, tick: i64) -> Result<(), PracticeError> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(PracticeError::ScoreUnavailable {
                reason: "simulated cursor failure".to_string(),
            });
        }
        state.position = tick;
        state.set_count += 1;
        Ok(())
    }
}

/// Quarter-note score note without an external handle
pub fn score_note(id: u64, string_index: u8, fret: u8, start_tick: i64) -> ScoreNote {
    ScoreNote {
        id,
        string_index,
        fret,
        start_tick,
        duration_ticks: 960,
        external_ref: ExternalRef::none(),
    }
}
