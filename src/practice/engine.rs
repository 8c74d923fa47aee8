// PracticeEngine - Idle/Running state machine judging what is played
//
// Per tick while running, every Pending note with a resolved pitch is tested
// against the tick's observations. A match makes it Hit (terminal) with a
// timing judgement. Notes only become Miss when a beat change replaces the
// set. In follow mode, once every matchable note of the beat is Hit, the score
// cursor is moved to the beat's end tick (once per beat).

use serde::Serialize;

use crate::analysis::{PitchEstimate, PitchPeak};
use crate::config::MatchConfig;
use crate::error::ErrorCode;

use super::expectation::{ExpectationTracker, ExpectedNote};
use super::matcher::{Matcher, Observations};
use super::session::{SessionStats, SessionSummary};
use super::timing::{TimingFeedback, TimingJudge};
use super::{ExternalRef, ScoreCollaborator, ScoreNote};

/// Outcome reported to the UI for a single expected note
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultEvent {
    Hit {
        note_id: u64,
        #[serde(skip)]
        external_ref: ExternalRef,
        timing: TimingFeedback,
        points: u64,
        combo: u32,
    },
    Miss {
        note_id: u64,
        #[serde(skip)]
        external_ref: ExternalRef,
    },
}

impl ResultEvent {
    pub fn note_id(&self) -> u64 {
        match self {
            ResultEvent::Hit { note_id, .. } | ResultEvent::Miss { note_id, .. } => *note_id,
        }
    }

    pub fn external_ref(&self) -> &ExternalRef {
        match self {
            ResultEvent::Hit { external_ref, .. } | ResultEvent::Miss { external_ref, .. } => {
                external_ref
            }
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, ResultEvent::Hit { .. })
    }
}

pub struct PracticeEngine {
    matcher: Matcher,
    judge: TimingJudge,
    tracker: ExpectationTracker,
    stats: SessionStats,
    running: bool,
    follow_mode: bool,
}

impl PracticeEngine {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            matcher: Matcher::from_config(config),
            judge: TimingJudge::new(config.timing_window_ticks),
            tracker: ExpectationTracker::new(),
            stats: SessionStats::default(),
            running: false,
            follow_mode: config.follow_mode_enabled,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn follow_mode(&self) -> bool {
        self.follow_mode
    }

    pub fn tracker(&self) -> &ExpectationTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn summary(&self) -> SessionSummary {
        self.stats.summary()
    }

    /// Idle -> Running; returns false (and changes nothing) when already running
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.tracker.clear();
        self.stats.reset();
        log::info!(
            "[PracticeEngine] Session started (follow_mode={})",
            self.follow_mode
        );
        true
    }

    /// Running -> Idle; the expected set is dropped without judging it
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.tracker.clear();
        let summary = self.stats.summary();
        log::info!(
            "[PracticeEngine] Session stopped. Score: {}, Hits: {}, Misses: {}, Max combo: {}, Accuracy: {:.1}%",
            summary.score,
            summary.hits,
            summary.misses,
            summary.max_combo,
            summary.accuracy
        );
        true
    }

    pub fn set_follow_mode(&mut self, enabled: bool) {
        if self.follow_mode != enabled {
            log::info!("[PracticeEngine] Follow mode {}", if enabled { "on" } else { "off" });
        }
        self.follow_mode = enabled;
    }

    /// Replace the expected set with a new beat's notes
    ///
    /// Returns one Miss per matchable note of the previous beat that was
    /// never hit.
    /// While idle the notes are discarded and nothing is judged.
    pub fn on_beat_changed(
        &mut self,
        notes: Vec<ScoreNote>,
        score: &dyn ScoreCollaborator,
    ) -> Vec<ResultEvent> {
        if !self.running {
            self.tracker.clear();
            return Vec::new();
        }

        let missed = self.tracker.replace(notes, score);
        missed
            .into_iter()
            .map(|note| {
                self.stats.record_miss();
                log::debug!("[PracticeEngine] Miss: note {}", note.id);
                miss_event(note)
            })
            .collect()
    }

    /// Judge one tick of observations against the Pending notes
    pub fn tick(
        &mut self,
        estimate: Option<&PitchEstimate>,
        peaks: &[PitchPeak],
        score: &mut dyn ScoreCollaborator,
    ) -> Vec<ResultEvent> {
        let mut events = Vec::new();
        if !self.running || self.tracker.is_empty() {
            return events;
        }

        let observations = Observations::new(estimate, peaks);
        let pending = self.tracker.matchable_pending();

        if !pending.is_empty() && !observations.is_empty() {
            let matched: Vec<usize> = pending
                .into_iter()
                .filter(|&index| {
                    self.tracker
                        .get(index)
                        .and_then(ExpectedNote::target_hz)
                        .is_some_and(|target| {
                            self.matcher.matches(self.follow_mode, target, &observations)
                        })
                })
                .collect();

            if !matched.is_empty() {
                let current_tick = match score.current_tick_position() {
                    Ok(tick) => tick,
                    Err(err) => {
                        log::warn!(
                            "[PracticeEngine] Skipping tick, score position unavailable: code={}, {}",
                            err.code(),
                            err.message()
                        );
                        return events;
                    }
                };

                for index in matched {
                    if !self.tracker.mark_hit(index) {
                        continue;
                    }
                    let Some(note) = self.tracker.get(index) else {
                        continue;
                    };
                    let timing = self.judge.classify(current_tick, note.start_tick);
                    let points = self.stats.record_hit(timing.classification);
                    log::debug!(
                        "[PracticeEngine] Hit: note {} {:?} ({:+} ticks)",
                        note.id,
                        timing.classification,
                        timing.offset_ticks
                    );
                    events.push(ResultEvent::Hit {
                        note_id: note.id,
                        external_ref: note.external_ref.clone(),
                        timing,
                        points,
                        combo: self.stats.combo,
                    });
                }
            }
        }

        if self.follow_mode && !self.tracker.advanced() && self.tracker.all_matchable_hit() {
            self.advance_cursor(score);
        }

        events
    }

    fn advance_cursor(&mut self, score: &mut dyn ScoreCollaborator) {
        let Some(end_tick) = self.tracker.beat_end_tick() else {
            return;
        };
        match score.set_tick_position(end_tick) {
            Ok(()) => {
                self.tracker.set_advanced();
                log::debug!("[PracticeEngine] Follow mode advanced cursor to tick {}", end_tick);
            }
            Err(err) => {
                // Retried on the next tick
                log::warn!(
                    "[PracticeEngine] Failed to advance cursor: code={}, {}",
                    err.code(),
                    err.message()
                );
            }
        }
    }
}

fn miss_event(note: ExpectedNote) -> ResultEvent {
    ResultEvent::Miss {
        note_id: note.id,
        external_ref: note.external_ref,
    }
}
