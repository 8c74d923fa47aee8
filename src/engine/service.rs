//! PracticeService: the owned object a host drives once per frame.
//!
//! Lifecycle: `new` → `attach_score` → `start` → `tick`… → `stop` → `dispose`.
//! All analysis and practice state is mutated only inside `tick` and
//! `on_beat_changed`, so the service needs no locking of its own. The audio
//! callback feeds it through the capture ring.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::analysis::{FrameAnalysis, PitchPipeline, StableNote};
use crate::audio::AudioCapture;
use crate::config::AppConfig;
use crate::engine::backend::{CaptureBackend, SystemTimeSource, TimeSource};
use crate::error::{log_audio_error, log_practice_error, PracticeError, ServiceError};
use crate::managers::BroadcastChannelManager;
use crate::practice::{PracticeEngine, ResultEvent, ScoreCollaborator, ScoreNote, SessionSummary};

/// What the UI shows for one analyzed frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchUpdate {
    pub frame: u64,
    /// Milliseconds since the session started
    pub timestamp_ms: u64,
    /// Confirmed notes, loudest first
    pub notes: Vec<StableNote>,
    pub level_db: f32,
}

/// Everything one tick produced, for hosts that poll instead of subscribing
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub analysis: FrameAnalysis,
    pub events: Vec<ResultEvent>,
}

pub struct PracticeService {
    config: AppConfig,
    capture: AudioCapture,
    pipeline: PitchPipeline,
    engine: PracticeEngine,
    score: Option<Box<dyn ScoreCollaborator>>,
    broadcasts: BroadcastChannelManager,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl PracticeService {
    /// Create an idle service on the wall clock
    pub fn new(config: AppConfig, backend: Box<dyn CaptureBackend>) -> Result<Self, PracticeError> {
        Self::with_time_source(config, backend, Arc::new(SystemTimeSource::default()))
    }

    /// Create an idle service with an injected clock (used by tests)
    pub fn with_time_source(
        config: AppConfig,
        backend: Box<dyn CaptureBackend>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, PracticeError> {
        config.validate()?;

        let broadcasts = BroadcastChannelManager::new();
        broadcasts.init_pitch();
        broadcasts.init_results();

        let start_instant = time_source.now();
        Ok(Self {
            capture: AudioCapture::new(backend, config.capture.clone()),
            pipeline: PitchPipeline::new(&config),
            engine: PracticeEngine::new(&config.matching),
            score: None,
            broadcasts,
            time_source,
            start_instant,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Install the score the session reads positions and tunings from
    pub fn attach_score(&mut self, score: Box<dyn ScoreCollaborator>) {
        self.score = Some(score);
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn follow_mode(&self) -> bool {
        self.engine.follow_mode()
    }

    /// Idle -> Running
    ///
    /// A no-op when already running. Fails without a score, and when the
    /// microphone cannot be opened; in both cases the service stays Idle.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.engine.is_running() {
            log::debug!("[PracticeService] start ignored, already running");
            return Ok(());
        }

        if self.score.is_none() {
            let err = PracticeError::ScoreNotAttached;
            log_practice_error(&err, "PracticeService::start");
            return Err(err.into());
        }

        if let Err(err) = self.capture.start() {
            log_audio_error(&err, "PracticeService::start");
            return Err(err.into());
        }

        self.pipeline.reset();
        self.start_instant = self.time_source.now();
        self.engine.start();
        log::info!(
            "[PracticeService] Started on {} backend at {} Hz",
            self.capture.backend_name(),
            self.capture.sample_rate().unwrap_or_default()
        );
        Ok(())
    }

    /// Running -> Idle; the microphone is released
    pub fn stop(&mut self) -> Result<(), ServiceError> {
        if !self.engine.is_running() {
            return Ok(());
        }

        self.engine.stop();
        self.capture.stop().map_err(|err| {
            log_audio_error(&err, "PracticeService::stop");
            ServiceError::from(err)
        })
    }

    /// Stop if needed and close every subscription
    pub fn dispose(mut self) {
        if let Err(err) = self.stop() {
            log::warn!("[PracticeService] Stop during dispose failed: {}", err);
        }
        self.broadcasts.close();
        log::info!("[PracticeService] Disposed");
    }

    pub fn set_follow_mode(&mut self, enabled: bool) {
        self.engine.set_follow_mode(enabled);
    }

    /// Replace the expected notes with the new beat's notes
    ///
    /// Misses for the previous beat are published and returned.
    pub fn on_beat_changed(&mut self, notes: Vec<ScoreNote>) -> Vec<ResultEvent> {
        let Some(score) = self.score.as_deref() else {
            log_practice_error(
                &PracticeError::ScoreNotAttached,
                "PracticeService::on_beat_changed",
            );
            return Vec::new();
        };

        let events = self.engine.on_beat_changed(notes, score);
        self.publish_results(&events);
        events
    }

    /// Analyze the newest window and judge it against the expected notes
    ///
    /// Returns None while idle.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        if !self.engine.is_running() {
            return None;
        }

        let pulled = self.capture.pull();
        let window = self.capture.latest_window()?;
        let timestamp_ms = self.elapsed_ms();
        let analysis = self.pipeline.process(&window, timestamp_ms);
        let level_db = self.capture.input_level_db();

        self.broadcasts.publish_pitch(PitchUpdate {
            frame: analysis.frame,
            timestamp_ms,
            notes: analysis.display.clone(),
            level_db,
        });

        let events = match self.score.as_deref_mut() {
            Some(score) => self
                .engine
                .tick(analysis.estimate.as_ref(), &analysis.peaks, score),
            None => Vec::new(),
        };
        self.publish_results(&events);

        tracing::debug!(
            frame = analysis.frame,
            pulled,
            level_db,
            peaks = analysis.peaks.len(),
            confirmed = analysis.display.len(),
            results = events.len(),
            "practice tick"
        );

        Some(TickOutcome { analysis, events })
    }

    pub fn subscribe_pitch(&self) -> broadcast::Receiver<PitchUpdate> {
        self.broadcasts
            .subscribe_pitch()
            .unwrap_or_else(|| self.broadcasts.init_pitch().subscribe())
    }

    pub fn subscribe_results(&self) -> broadcast::Receiver<ResultEvent> {
        self.broadcasts
            .subscribe_results()
            .unwrap_or_else(|| self.broadcasts.init_results().subscribe())
    }

    pub fn summary(&self) -> SessionSummary {
        self.engine.summary()
    }

    /// Level of the most recently pulled audio, in dBFS
    pub fn input_level_db(&self) -> f32 {
        self.capture.input_level_db()
    }

    fn elapsed_ms(&self) -> u64 {
        self.time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }

    fn publish_results(&self, events: &[ResultEvent]) {
        for event in events {
            self.broadcasts.publish_result(event.clone());
        }
    }
}
