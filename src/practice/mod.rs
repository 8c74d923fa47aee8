// Practice module - matching what is heard against what the score expects
//
// Architecture:
// - ExpectationTracker: the notes of the current beat and their status,
//   replaced wholesale on every beat change
// - Matcher: strict (±0.6 semitone, octave-tolerant) or follow (attack or
//   within an octave) acceptance test
// - TimingJudge: perfect / early / late against the note's start tick
// - PracticeEngine: Idle/Running state machine tying the above together and
//   producing ResultEvents
// - SessionStats: hits, misses, combo and score for the running session
//
// The score itself lives outside this crate and is reached through the
// ScoreCollaborator trait.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::PracticeError;

pub mod engine;
pub mod expectation;
pub mod matcher;
pub mod session;
pub mod timing;

pub use engine::{PracticeEngine, ResultEvent};
pub use expectation::{ExpectationTracker, ExpectedNote, NoteStatus};
pub use matcher::{Matcher, Observations};
pub use session::{SessionStats, SessionSummary};
pub use timing::{TimingClassification, TimingFeedback, TimingJudge};

/// Handle the score side attaches to a note and gets back untouched in
/// result events (e.g. the rendered glyph to color)
#[derive(Clone, Default)]
pub struct ExternalRef(Option<Arc<dyn Any + Send + Sync>>);

impl ExternalRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|value| value.downcast_ref::<T>())
    }
}

impl PartialEq for ExternalRef {
    /// Same handle, not equal contents
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "ExternalRef(..)")
        } else {
            write!(f, "ExternalRef(none)")
        }
    }
}

/// A note as delivered by the score on a beat change
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreNote {
    pub id: u64,
    /// 1-based, 1 = highest-pitched string
    pub string_index: u8,
    pub fret: u8,
    pub start_tick: i64,
    pub duration_ticks: i64,
    pub external_ref: ExternalRef,
}

/// The playback/cursor side of the score
///
/// Implemented by the host application; the crate only ships a simulated
/// score for tests and the CLI.
pub trait ScoreCollaborator: Send {
    /// Current playback position in ticks
    fn current_tick_position(&self) -> Result<i64, PracticeError>;

    /// MIDI number of the open string, None when the tuning is unknown
    fn open_string_midi(&self, string_index: u8) -> Option<i32>;

    /// Move the score cursor (used by follow mode)
    fn set_tick_position(&mut self, tick: i64) -> Result<(), PracticeError>;
}
