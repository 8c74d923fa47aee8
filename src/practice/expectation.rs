//! The set of notes the score currently expects.
//!
//! A beat change replaces the whole set: every matchable note still Pending
//! is finalized as Miss and handed back exactly once, then the new notes start
//! out Pending. Notes whose pitch cannot be resolved stay in the set (they
//! still define the beat's extent) but are never matched, so they are dropped
//! silently instead of being judged.

use serde::{Deserialize, Serialize};

use crate::analysis::note::midi_to_frequency;
use crate::error::{log_practice_error, PracticeError};

use super::{ExternalRef, ScoreCollaborator, ScoreNote};

/// Highest fret accepted on any string
pub const MAX_FRET: u8 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteStatus {
    Pending,
    Hit,
    Miss,
}

/// Score note with its pitch resolved against the current tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedNote {
    pub id: u64,
    pub string_index: u8,
    pub fret: u8,
    /// open string + fret; None when the tuning is unknown
    pub resolved_midi: Option<i32>,
    pub start_tick: i64,
    pub duration_ticks: i64,
    pub external_ref: ExternalRef,
}

impl ExpectedNote {
    /// Resolve `note` against the collaborator's tuning
    pub fn resolve(note: ScoreNote, score: &dyn ScoreCollaborator) -> Self {
        let resolved_midi = match validate(&note) {
            Ok(()) => score
                .open_string_midi(note.string_index)
                .map(|open| open + note.fret as i32),
            Err(err) => {
                log_practice_error(&err, "resolve_note");
                None
            }
        };
        if resolved_midi.is_none() {
            log::debug!(
                "[Expectation] Note {} (string {}, fret {}) has no resolvable pitch; skipped for matching",
                note.id,
                note.string_index,
                note.fret
            );
        }

        Self {
            id: note.id,
            string_index: note.string_index,
            fret: note.fret,
            resolved_midi,
            start_tick: note.start_tick,
            duration_ticks: note.duration_ticks,
            external_ref: note.external_ref,
        }
    }

    pub fn target_hz(&self) -> Option<f32> {
        self.resolved_midi.map(midi_to_frequency)
    }

    pub fn end_tick(&self) -> i64 {
        self.start_tick + self.duration_ticks
    }
}

fn validate(note: &ScoreNote) -> Result<(), PracticeError> {
    if note.string_index == 0 {
        return Err(PracticeError::InvalidNote {
            note_id: note.id,
            reason: "string index is 1-based".to_string(),
        });
    }
    if note.fret > MAX_FRET {
        return Err(PracticeError::InvalidNote {
            note_id: note.id,
            reason: format!("fret {} above {}", note.fret, MAX_FRET),
        });
    }
    if note.duration_ticks < 0 {
        return Err(PracticeError::InvalidNote {
            note_id: note.id,
            reason: "negative duration".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct TrackedNote {
    note: ExpectedNote,
    status: NoteStatus,
}

/// Current beat's expected notes and their statuses
#[derive(Debug, Default)]
pub struct ExpectationTracker {
    entries: Vec<TrackedNote>,
    advanced: bool,
}

impl ExpectationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new beat's notes
    ///
    /// Returns the previous set's matchable notes that were still Pending;
    /// they are now Miss. Unresolved notes are discarded unjudged.
    pub fn replace(
        &mut self,
        notes: Vec<ScoreNote>,
        score: &dyn ScoreCollaborator,
    ) -> Vec<ExpectedNote> {
        let missed = self
            .entries
            .drain(..)
            .filter(|entry| {
                entry.status == NoteStatus::Pending && entry.note.resolved_midi.is_some()
            })
            .map(|entry| entry.note)
            .collect();

        self.entries = notes
            .into_iter()
            .map(|note| TrackedNote {
                note: ExpectedNote::resolve(note, score),
                status: NoteStatus::Pending,
            })
            .collect();
        self.advanced = false;
        missed
    }

    /// Drop the set without judging anything
    pub fn clear(&mut self) {
        self.entries.clear();
        self.advanced = false;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn status(&self, id: u64) -> Option<NoteStatus> {
        self.entries
            .iter()
            .find(|entry| entry.note.id == id)
            .map(|entry| entry.status)
    }

    /// Pending notes with a resolved pitch, by position in the set
    pub fn matchable_pending(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.status == NoteStatus::Pending && entry.note.resolved_midi.is_some()
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<&ExpectedNote> {
        self.entries.get(index).map(|entry| &entry.note)
    }

    /// Pending -> Hit; returns false when the note already left Pending
    pub fn mark_hit(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) if entry.status == NoteStatus::Pending => {
                entry.status = NoteStatus::Hit;
                true
            }
            _ => false,
        }
    }

    /// True when at least one note is matchable and every matchable note is Hit
    pub fn all_matchable_hit(&self) -> bool {
        let mut matchable = self
            .entries
            .iter()
            .filter(|entry| entry.note.resolved_midi.is_some())
            .peekable();
        matchable.peek().is_some() && matchable.all(|entry| entry.status == NoteStatus::Hit)
    }

    /// Tick where the current beat ends: the latest note end in the set
    pub fn beat_end_tick(&self) -> Option<i64> {
        self.entries.iter().map(|entry| entry.note.end_tick()).max()
    }

    /// Whether follow mode already moved the cursor for this beat
    pub fn advanced(&self) -> bool {
        self.advanced
    }

    pub fn set_advanced(&mut self) {
        self.advanced = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{score_note, SimulatedScore};

    #[test]
    fn test_resolves_pitch_from_tuning() {
        let score = SimulatedScore::standard_tuning();
        // 5th string (A2) fret 3 = C3
        let note = ExpectedNote::resolve(score_note(1, 5, 3, 0), &score);
        assert_eq!(note.resolved_midi, Some(48));
        assert!((note.target_hz().unwrap() - 130.81).abs() < 0.01);
    }

    #[test]
    fn test_unknown_string_is_unmatchable_not_error() {
        let score = SimulatedScore::standard_tuning();
        let mut tracker = ExpectationTracker::new();
        tracker.replace(vec![score_note(1, 7, 0, 0), score_note(2, 0, 0, 0)], &score);

        assert_eq!(tracker.len(), 2);
        assert!(tracker.matchable_pending().is_empty());
        assert!(!tracker.all_matchable_hit());

        // Never judged, so never missed
        assert!(tracker.replace(Vec::new(), &score).is_empty());
    }

    #[test]
    fn test_replace_misses_only_matchable_notes() {
        let score = SimulatedScore::standard_tuning();
        let mut tracker = ExpectationTracker::new();
        tracker.replace(
            vec![score_note(1, 0, 0, 0), score_note(2, 3, 0, 0), score_note(3, 1, 99, 0)],
            &score,
        );

        let missed = tracker.replace(Vec::new(), &score);
        assert_eq!(missed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_replace_reports_pending_as_missed_once() {
        let score = SimulatedScore::standard_tuning();
        let mut tracker = ExpectationTracker::new();
        assert!(tracker
            .replace(vec![score_note(1, 1, 0, 0), score_note(2, 2, 0, 0)], &score)
            .is_empty());
        assert!(tracker.mark_hit(0));

        let missed = tracker.replace(vec![score_note(3, 3, 0, 960)], &score);
        assert_eq!(missed.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(tracker.status(3), Some(NoteStatus::Pending));
        assert_eq!(tracker.status(1), None);

        let missed = tracker.replace(Vec::new(), &score);
        assert_eq!(missed.len(), 1);
        assert!(tracker.replace(Vec::new(), &score).is_empty());
    }

    #[test]
    fn test_hit_is_terminal() {
        let score = SimulatedScore::standard_tuning();
        let mut tracker = ExpectationTracker::new();
        tracker.replace(vec![score_note(1, 1, 0, 0)], &score);

        assert!(tracker.mark_hit(0));
        assert!(!tracker.mark_hit(0));
        assert_eq!(tracker.status(1), Some(NoteStatus::Hit));
        assert!(tracker.matchable_pending().is_empty());
        assert!(tracker.all_matchable_hit());
    }

    #[test]
    fn test_beat_end_is_latest_note_end() {
        let score = SimulatedScore::standard_tuning();
        let mut tracker = ExpectationTracker::new();
        let mut long = score_note(2, 2, 0, 960);
        long.duration_ticks = 1_920;
        tracker.replace(vec![score_note(1, 1, 0, 960), long], &score);

        assert_eq!(tracker.beat_end_tick(), Some(2_880));
        tracker.clear();
        assert_eq!(tracker.beat_end_tick(), None);
    }

    #[test]
    fn test_invalid_fret_is_unmatchable() {
        let score = SimulatedScore::standard_tuning();
        let note = ExpectedNote::resolve(score_note(9, 1, 99, 0), &score);
        assert_eq!(note.resolved_midi, None);
    }
}
