use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::audio::buffer_pool::{AudioThreadChannels, BufferPool};
use crate::error::AudioError;

use super::{CaptureBackend, CaptureRequest, CaptureStream, TimeSource};

#[derive(Default)]
struct StubState {
    audio: Option<AudioThreadChannels>,
    fail_next: Option<AudioError>,
    last_request: Option<CaptureRequest>,
    start_count: u32,
    stop_count: u32,
}

/// Stub capture backend used for deterministic testing and CLI tooling.
///
/// No device is opened. Samples are fed through the [`StubHandle`] and travel
/// the same buffer pool a real stream would use.
pub struct StubBackend {
    sample_rate: u32,
    state: Arc<Mutex<StubState>>,
}

impl StubBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: Arc::new(Mutex::new(StubState::default())),
        }
    }

    /// Handle standing in for the audio callback; clone freely
    pub fn handle(&self) -> StubHandle {
        StubHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl CaptureBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn start(&mut self, request: &CaptureRequest) -> Result<CaptureStream, AudioError> {
        let mut state = self.state.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_backend".to_string(),
        })?;

        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        if state.audio.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (audio, analysis) =
            BufferPool::new(request.buffer_pool_size, request.block_size)?.split_for_threads();
        state.audio = Some(audio);
        state.last_request = Some(request.clone());
        state.start_count += 1;

        Ok(CaptureStream {
            sample_rate: self.sample_rate,
            channels: analysis,
        })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let mut state = self.state.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_backend".to_string(),
        })?;
        if state.audio.take().is_none() {
            return Err(AudioError::NotRunning);
        }
        state.stop_count += 1;
        Ok(())
    }
}

/// Test-side control of a [`StubBackend`]
#[derive(Clone)]
pub struct StubHandle {
    state: Arc<Mutex<StubState>>,
}

impl StubHandle {
    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed samples as if the device had captured them
    ///
    /// Split into blocks of the requested size. Returns false when the stream
    /// is not running or any block was dropped because the pool ran dry.
    pub fn push(&self, samples: &[f32]) -> bool {
        match self.state().audio.as_mut() {
            Some(audio) => audio.push_samples(samples),
            None => false,
        }
    }

    /// Make the next `start` fail with `err`
    pub fn fail_next_start(&self, err: AudioError) {
        self.state().fail_next = Some(err);
    }

    pub fn is_running(&self) -> bool {
        self.state().audio.is_some()
    }

    pub fn last_request(&self) -> Option<CaptureRequest> {
        self.state().last_request.clone()
    }

    pub fn start_count(&self) -> u32 {
        self.state().start_count
    }

    pub fn stop_count(&self) -> u32 {
        self.state().stop_count
    }
}

/// Manually driven clock for deterministic attack debouncing.
///
/// Time only moves when [`StubTimeSource::advance`] is called.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        self.start + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}
