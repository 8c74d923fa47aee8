// AudioCapture - owns the microphone stream and the conditioned signal history
//
// The backend's callback only moves raw blocks into the buffer pool. Each
// `pull()` drains them on the caller's thread, runs the filter chain and
// appends the result to the ring, so all mutable DSP state stays single-owner.

use crate::config::CaptureConfig;
use crate::engine::backend::{CaptureBackend, CaptureRequest};
use crate::error::{log_audio_error, AudioError};

use super::buffer_pool::AnalysisThreadChannels;
use super::filter::FilterChain;
use super::ring_buffer::RingBuffer;

/// Level reported for silence or an empty block
pub const SILENCE_DB: f32 = -100.0;

/// One fixed-length slice of the conditioned signal, produced once per tick
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWindow {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AnalysisWindow {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// RMS level in dBFS, floored at [`SILENCE_DB`]
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DB;
    }
    let mean_square =
        samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64;
    let rms = mean_square.sqrt();
    if rms <= 0.0 {
        return SILENCE_DB;
    }
    ((20.0 * rms.log10()) as f32).max(SILENCE_DB)
}

struct ActiveStream {
    channels: AnalysisThreadChannels,
    sample_rate: u32,
    level_db: f32,
}

/// Filter state and signal history, kept across restarts at the same rate
struct Conditioning {
    filter: FilterChain,
    ring: RingBuffer,
    sample_rate: u32,
}

impl Conditioning {
    /// Forget everything heard so the next stream starts from silence
    fn reset(&mut self) {
        self.filter.reset();
        self.ring.clear();
    }
}

/// Microphone capture with conditioning
///
/// Idle until [`AudioCapture::start`] succeeds. Dropping a running capture
/// stops the backend.
pub struct AudioCapture {
    backend: Box<dyn CaptureBackend>,
    config: CaptureConfig,
    stream: Option<ActiveStream>,
    conditioning: Option<Conditioning>,
}

impl AudioCapture {
    pub fn new(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            stream: None,
            conditioning: None,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Open the microphone
    ///
    /// # Errors
    /// `AlreadyRunning` when a stream is open, otherwise whatever the backend
    /// reports (permission, missing device, stream failure). Capture stays
    /// idle on error.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let request = CaptureRequest::from_config(&self.config);
        let opened = self.backend.start(&request).map_err(|err| {
            log_audio_error(&err, "start_capture");
            err
        })?;

        let sample_rate = opened.sample_rate;
        let ring_len = ((self.config.ring_seconds * sample_rate as f32) as usize)
            .max(self.config.window_size);

        log::info!(
            "[Capture] Started on '{}' at {} Hz (bass_boost={}, ring={} samples)",
            self.backend.name(),
            sample_rate,
            self.config.bass_boost,
            ring_len
        );

        match self.conditioning.as_mut() {
            Some(conditioning) if conditioning.sample_rate == sample_rate => conditioning.reset(),
            _ => {
                self.conditioning = Some(Conditioning {
                    filter: FilterChain::from_config(&self.config, sample_rate),
                    ring: RingBuffer::new(ring_len),
                    sample_rate,
                });
            }
        }

        self.stream = Some(ActiveStream {
            channels: opened.channels,
            sample_rate,
            level_db: SILENCE_DB,
        });
        Ok(())
    }

    /// Release the stream; the local state is dropped even if the backend
    /// reports an error while stopping
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if self.stream.take().is_none() {
            return Err(AudioError::NotRunning);
        }
        if let Some(conditioning) = self.conditioning.as_mut() {
            conditioning.reset();
        }
        self.backend.stop().map_err(|err| {
            log_audio_error(&err, "stop_capture");
            err
        })?;
        log::info!("[Capture] Stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.stream.as_ref().map(|s| s.sample_rate)
    }

    /// Drain captured blocks through the filter chain into the ring
    ///
    /// Returns the number of new samples. The input level is updated from the
    /// last block drained.
    pub fn pull(&mut self) -> usize {
        let (Some(stream), Some(conditioning)) = (self.stream.as_mut(), self.conditioning.as_mut())
        else {
            return 0;
        };
        let ActiveStream {
            channels, level_db, ..
        } = stream;
        let Conditioning { filter, ring, .. } = conditioning;

        let mut scratch: Vec<f32> = Vec::new();
        channels.drain(|block| {
            scratch.clear();
            scratch.extend_from_slice(block);
            filter.process(&mut scratch);
            ring.write(&scratch);
            *level_db = rms_db(&scratch);
        })
    }

    /// The most recent `window_size` conditioned samples
    pub fn latest_window(&self) -> Option<AnalysisWindow> {
        let stream = self.stream.as_ref()?;
        let conditioning = self.conditioning.as_ref()?;
        Some(AnalysisWindow::new(
            conditioning.ring.read_latest(self.config.window_size),
            stream.sample_rate,
        ))
    }

    /// RMS level of the latest block in dBFS; silence when idle
    pub fn input_level_db(&self) -> f32 {
        self.stream.as_ref().map_or(SILENCE_DB, |s| s.level_db)
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}
