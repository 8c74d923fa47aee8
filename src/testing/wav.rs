//! WAV loading for offline analysis.

use std::path::Path;

use crate::error::AudioError;

/// Read a WAV file as mono f32 samples and its sample rate
///
/// Multi-channel files are downmixed by averaging.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| AudioError::StreamFailure {
        reason: format!("failed to open {}: {err}", path.display()),
    })?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::StreamFailure {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let read_error = |err: hound::Error| AudioError::StreamFailure {
        reason: format!("error reading {}: {err}", path.display()),
    };

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(read_error))
            .collect::<Result<Vec<f32>, _>>()?,
        (hound::SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let full_scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|v| v as f32 / full_scale).map_err(read_error))
                .collect::<Result<Vec<f32>, _>>()?
        }
        (_, bits) => {
            return Err(AudioError::StreamFailure {
                reason: format!(
                    "unsupported bits_per_sample={} for {}",
                    bits,
                    path.display()
                ),
            })
        }
    };

    let channels = spec.channels as usize;
    if channels == 1 {
        return Ok((samples, spec.sample_rate));
    }

    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}
