//! CPAL-based microphone backend for desktop platforms (Linux, macOS, Windows)
//!
//! Opens the default input device, keeps the first channel of interleaved
//! input and pushes each callback's samples into the lock-free block pool.
//! CPAL always delivers the unprocessed device signal, so the platform
//! voice-processing toggles in [`InputProcessing`](super::InputProcessing) are
//! only reported, never applied.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SizedSample};

use crate::audio::buffer_pool::{AudioThreadChannels, BufferPool};
use crate::error::{log_audio_error, AudioError};

use super::{CaptureBackend, CaptureRequest, CaptureStream};

/// Microphone backend driving a CPAL input stream
pub struct CpalBackend {
    stream: Option<cpal::Stream>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn start(&mut self, request: &CaptureRequest) -> Result<CaptureStream, AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        log::info!(
            "[Capture] Using input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string())
        );

        if request.processing.is_raw() {
            log::info!("[Capture] Raw input requested (bass boost)");
        } else {
            log::debug!("[Capture] Platform input processing is not configurable through CPAL");
        }

        let supported = choose_config(&device, request.target_sample_rate)?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate.0;
        let channel_count = stream_config.channels as usize;

        let (audio_channels, analysis_channels) =
            BufferPool::new(request.buffer_pool_size, request.block_size)?.split_for_threads();

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(
                &device,
                &stream_config,
                channel_count,
                request.block_size,
                audio_channels,
            ),
            cpal::SampleFormat::I16 => build_stream::<i16>(
                &device,
                &stream_config,
                channel_count,
                request.block_size,
                audio_channels,
            ),
            cpal::SampleFormat::U16 => build_stream::<u16>(
                &device,
                &stream_config,
                channel_count,
                request.block_size,
                audio_channels,
            ),
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(map_build_error)?;

        // A stream that fails to play is dropped here, releasing the device
        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            cpal::PlayStreamError::BackendSpecific { err } => {
                classify_backend_message(&err.description)
            }
        })?;

        log::info!(
            "[Capture] Input stream running: {} Hz, {} channel(s), {:?}",
            sample_rate,
            channel_count,
            sample_format
        );

        self.stream = Some(stream);
        Ok(CaptureStream {
            sample_rate,
            channels: analysis_channels,
        })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.take().ok_or(AudioError::NotRunning)?;
        // Pause first so the device is suspended even if drop is delayed
        let paused = stream.pause().map_err(|e| AudioError::HardwareError {
            details: format!("Failed to pause input stream: {}", e),
        });
        drop(stream);
        if let Err(ref err) = paused {
            log_audio_error(err, "stop_capture");
        }
        paused
    }
}

/// Names of every input device on the default host
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host.input_devices().map_err(|e| AudioError::HardwareError {
        details: format!("Failed to enumerate input devices: {}", e),
    })?;
    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "<unnamed>".to_string()))
        .collect())
}

fn choose_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let ranges = device.supported_input_configs().map_err(|e| match e {
        cpal::SupportedStreamConfigsError::DeviceNotAvailable => AudioError::NoInputDevice,
        other => AudioError::StreamOpenFailed {
            reason: format!("Failed to query input configs: {}", other),
        },
    })?;

    let matching = ranges
        .filter(|r| {
            matches!(
                r.sample_format(),
                cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16
            )
        })
        .filter(|r| r.min_sample_rate().0 <= target_rate && target_rate <= r.max_sample_rate().0)
        .min_by_key(|r| r.channels());

    match matching {
        Some(range) => Ok(range.with_sample_rate(cpal::SampleRate(target_rate))),
        None => device.default_input_config().map_err(|e| match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {}", other),
            },
        }),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channel_count: usize,
    block_size: usize,
    mut channels: AudioThreadChannels,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    let channel_count = channel_count.max(1);
    let block_size = block_size.max(1);
    // Never grows past block_size; the callback must not allocate
    let mut mono: Vec<f32> = Vec::with_capacity(block_size);
    let err_fn = |err| log::error!("[Capture] Input stream error: {}", err);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frames in data.chunks(block_size * channel_count) {
                downmix_first_channel(frames, channel_count, &mut mono);
                // Dropped when the tick lags; only the freshest audio matters
                let _ = channels.push_samples(&mono);
            }
        },
        err_fn,
        None,
    )
}

/// Replace `mono` with the first channel of interleaved `frames`
fn downmix_first_channel<T>(frames: &[T], channel_count: usize, mono: &mut Vec<f32>)
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    mono.clear();
    mono.extend(
        frames
            .chunks(channel_count)
            .map(|frame| frame[0].to_sample::<f32>()),
    );
}

fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
        cpal::BuildStreamError::BackendSpecific { err } => {
            classify_backend_message(&err.description)
        }
        other => AudioError::StreamOpenFailed {
            reason: other.to_string(),
        },
    }
}

fn classify_backend_message(description: &str) -> AudioError {
    let lowered = description.to_lowercase();
    if lowered.contains("permission") || lowered.contains("not permitted") {
        AudioError::PermissionDenied
    } else if lowered.contains("busy") {
        AudioError::HardwareError {
            details: description.to_string(),
        }
    } else {
        AudioError::StreamOpenFailed {
            reason: description.to_string(),
        }
    }
}
