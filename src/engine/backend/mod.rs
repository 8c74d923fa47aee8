//! Backend abstractions for microphone capture.

use std::time::Instant;

use crate::audio::buffer_pool::AnalysisThreadChannels;
use crate::config::CaptureConfig;
use crate::error::AudioError;

/// Platform voice-processing toggles requested for the input stream.
///
/// Echo cancellation, noise suppression and automatic gain all attenuate a
/// sustained instrument tone, so bass boost turns every one of them off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputProcessing {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain: bool,
}

impl InputProcessing {
    pub fn for_bass_boost(bass_boost: bool) -> Self {
        Self {
            echo_cancellation: !bass_boost,
            noise_suppression: !bass_boost,
            auto_gain: !bass_boost,
        }
    }

    /// True when no platform processing is requested
    pub fn is_raw(&self) -> bool {
        !(self.echo_cancellation || self.noise_suppression || self.auto_gain)
    }
}

/// Parameters handed to a backend when opening the microphone.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub target_sample_rate: u32,
    pub buffer_pool_size: usize,
    pub block_size: usize,
    pub processing: InputProcessing,
}

impl CaptureRequest {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            target_sample_rate: config.target_sample_rate,
            buffer_pool_size: config.buffer_pool_size,
            block_size: config.block_size,
            processing: InputProcessing::for_bass_boost(config.bass_boost),
        }
    }
}

/// Tick-side view of an opened stream.
pub struct CaptureStream {
    /// Actual device sample rate (may differ from the requested one)
    pub sample_rate: u32,
    pub channels: AnalysisThreadChannels,
}

/// Trait implemented by microphone backends.
///
/// `start` either returns a live stream or an error with nothing left open;
/// `stop` releases the device. Backends are driven from a single thread.
pub trait CaptureBackend {
    fn name(&self) -> &str;
    fn start(&mut self, request: &CaptureRequest) -> Result<CaptureStream, AudioError>;
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Trait representing a monotonic time source used for attack debouncing.
pub trait TimeSource {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

mod cpal;
pub use cpal::{list_input_devices, CpalBackend};

mod stub;
pub use stub::{StubBackend, StubHandle, StubTimeSource};
