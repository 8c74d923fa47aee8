//! Integration tests for the practice flow
//!
//! These tests drive the full service with scripted audio and a simulated
//! score:
//! - Strict matching with timing judgement
//! - Misses reported on beat change
//! - Follow mode cursor advance
//! - Result subscription and score read failures

use std::sync::Arc;
use std::time::Duration;

use fret_trainer::analysis::note::midi_to_frequency;
use fret_trainer::engine::{StubBackend, StubHandle, StubTimeSource};
use fret_trainer::practice::TimingClassification;
use fret_trainer::testing::{score_note, synth, SimulatedScore};
use fret_trainer::{AppConfig, ExternalRef, PracticeService, ResultEvent, ScoreNote};

const SR: u32 = 44_100;
const HOP: usize = 735;
/// One analysis window, so the first tick never sees a zero-padded burst
const LEAD: usize = 4096;

struct Rig {
    service: PracticeService,
    mic: StubHandle,
    clock: Arc<StubTimeSource>,
    score: SimulatedScore,
}

fn rig(follow: bool) -> Rig {
    let backend = StubBackend::new(SR);
    let mic = backend.handle();
    let clock = Arc::new(StubTimeSource::new());
    let score = SimulatedScore::standard_tuning();

    let mut service =
        PracticeService::with_time_source(AppConfig::default(), Box::new(backend), clock.clone())
            .unwrap();
    service.attach_score(Box::new(score.clone()));
    service.set_follow_mode(follow);
    service.start().unwrap();

    Rig {
        service,
        mic,
        clock,
        score,
    }
}

impl Rig {
    /// Feed a full window, then one hop at a time, ticking after each push
    fn play(&mut self, audio: &[f32]) -> Vec<ResultEvent> {
        let (lead, rest) = audio.split_at(audio.len().min(LEAD));
        let mut events = Vec::new();
        for chunk in std::iter::once(lead).chain(rest.chunks(HOP)) {
            self.mic.push(chunk);
            self.clock.advance(Duration::from_millis(16));
            if let Some(outcome) = self.service.tick() {
                events.extend(outcome.events);
            }
        }
        events
    }
}

fn fretted(midi: i32, seconds: f32) -> Vec<f32> {
    let len = (SR as f32 * seconds) as usize;
    synth::plucked(midi_to_frequency(midi), SR, len, 0.3, 2.0)
}

fn hits(events: &[ResultEvent]) -> Vec<u64> {
    events
        .iter()
        .filter(|e| e.is_hit())
        .map(ResultEvent::note_id)
        .collect()
}

#[test]
fn test_strict_hit_on_time() {
    let mut rig = rig(false);
    // A string open = A2
    rig.service.on_beat_changed(vec![score_note(1, 5, 0, 0)]);

    let events = rig.play(&fretted(45, 0.4));
    assert_eq!(hits(&events), vec![1]);

    match &events[0] {
        ResultEvent::Hit { timing, points, .. } => {
            assert_eq!(timing.classification, TimingClassification::Perfect);
            assert_eq!(*points, 100);
        }
        other => panic!("expected hit, got {:?}", other),
    }
    assert_eq!(rig.service.summary().hits, 1);
}

#[test]
fn test_late_hit_is_judged_from_score_position() {
    let mut rig = rig(false);
    rig.service.on_beat_changed(vec![score_note(1, 4, 2, 1_920)]);
    rig.score.set_position(1_920 + 480);

    let events = rig.play(&fretted(52, 0.3));
    match events.as_slice() {
        [ResultEvent::Hit { timing, .. }] => {
            assert_eq!(timing.classification, TimingClassification::Late);
            assert_eq!(timing.offset_ticks, 480);
        }
        other => panic!("expected one hit, got {:?}", other),
    }
}

#[test]
fn test_wrong_note_becomes_miss_on_next_beat() {
    let mut rig = rig(false);
    let handle = ExternalRef::new(String::from("measure 3, beat 1"));
    let expected = ScoreNote {
        external_ref: handle.clone(),
        ..score_note(7, 5, 0, 0)
    };
    rig.service.on_beat_changed(vec![expected]);

    // C3 instead of A2
    let events = rig.play(&fretted(48, 0.4));
    assert!(hits(&events).is_empty());

    let missed = rig.service.on_beat_changed(vec![score_note(8, 5, 2, 960)]);
    assert_eq!(missed.len(), 1);
    assert!(!missed[0].is_hit());
    assert_eq!(missed[0].note_id(), 7);
    assert_eq!(missed[0].external_ref(), &handle);
    assert_eq!(
        missed[0].external_ref().downcast_ref::<String>().map(String::as_str),
        Some("measure 3, beat 1")
    );

    let summary = rig.service.summary();
    assert_eq!((summary.hits, summary.misses), (0, 1));
}

#[test]
fn test_follow_mode_strum_advances_cursor_once() {
    let mut rig = rig(true);
    rig.service
        .on_beat_changed(vec![score_note(1, 5, 0, 960), score_note(2, 4, 2, 960)]);

    let strum = synth::mix(&[fretted(45, 0.5), fretted(52, 0.5)]);
    let events = rig.play(&strum);

    let mut hit_ids = hits(&events);
    hit_ids.sort_unstable();
    assert_eq!(hit_ids, vec![1, 2]);
    assert_eq!(rig.score.position(), 960 + 960);
    assert_eq!(rig.score.set_count(), 1);

    // Nothing left to judge on the next beat
    assert!(rig.service.on_beat_changed(Vec::new()).is_empty());
}

#[test]
fn test_results_are_broadcast() {
    let mut rig = rig(false);
    let mut results = rig.service.subscribe_results();
    rig.service.on_beat_changed(vec![score_note(3, 5, 0, 0)]);

    let returned = rig.play(&fretted(45, 0.3));
    let received = results.try_recv().unwrap();
    assert_eq!(received, returned[0]);
    assert_eq!(received.note_id(), 3);
}

#[test]
fn test_score_read_failure_defers_judgement() {
    let mut rig = rig(false);
    rig.service.on_beat_changed(vec![score_note(1, 5, 0, 0)]);
    let tone = fretted(45, 0.6);
    let (first, second) = tone.split_at(tone.len() / 2);

    rig.score.fail_reads(true);
    assert!(rig.play(first).is_empty());

    rig.score.fail_reads(false);
    assert_eq!(hits(&rig.play(second)), vec![1]);
}

#[test]
fn test_stop_drops_expected_notes_without_misses() {
    let mut rig = rig(false);
    rig.service.on_beat_changed(vec![score_note(1, 5, 0, 0)]);
    rig.service.stop().unwrap();

    assert!(rig.service.tick().is_none());
    rig.service.start().unwrap();
    assert!(rig.service.on_beat_changed(Vec::new()).is_empty());
    assert_eq!(rig.service.summary().misses, 0);
}

#[test]
fn test_unresolvable_note_never_costs_a_miss() {
    let mut rig = rig(false);
    // String 0 does not exist; the A2 beside it is playable
    rig.service
        .on_beat_changed(vec![score_note(1, 0, 3, 0), score_note(2, 5, 0, 0)]);
    assert_eq!(hits(&rig.play(&fretted(45, 0.4))), vec![2]);

    let finalized = rig.service.on_beat_changed(vec![score_note(3, 4, 2, 960)]);
    assert!(finalized.is_empty());

    // Combo carried over from the first hit
    rig.score.set_position(960);
    let events = rig.play(&fretted(52, 0.4));
    match events.as_slice() {
        [ResultEvent::Hit { combo, .. }] => assert_eq!(*combo, 2),
        other => panic!("expected one hit, got {:?}", other),
    }
    assert_eq!(rig.service.summary().misses, 0);
}
