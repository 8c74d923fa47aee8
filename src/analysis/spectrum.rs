// Spectrum module - windowed magnitude spectrum in dB
//
// The polyphonic extractor works on peak heights in dB, so magnitudes are
// normalized such that a full-scale sine reads close to 0 dB regardless of the
// window length: |X| * 2 / sum(window).

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Lowest level reported for a bin
pub const FLOOR_DB: f32 = -160.0;

/// Magnitude spectrum of one analysis window (positive frequencies only)
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub magnitudes_db: Vec<f32>,
    /// Frequency spacing between adjacent bins
    pub bin_hz: f32,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitudes_db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes_db.is_empty()
    }

    pub fn bin_frequency(&self, bin: f32) -> f32 {
        bin * self.bin_hz
    }
}

/// FFT processor producing dB magnitude spectra
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window (pre-computed)
    window: Vec<f32>,
    window_sum: f32,
}

impl SpectrumAnalyzer {
    /// # Panics
    /// Panics if fft_size is smaller than 2
    pub fn new(fft_size: usize) -> Self {
        assert!(fft_size >= 2, "fft_size must be at least 2");
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();
        let window_sum = window.iter().sum();

        Self {
            fft: FftPlanner::new().plan_fft_forward(fft_size),
            fft_size,
            window,
            window_sum,
        }
    }

    /// Compute the dB spectrum of `samples`
    ///
    /// The window mean is removed first so DC offset from cheap interfaces
    /// does not leak into the lowest bins. Input shorter than the FFT size is
    /// zero-padded; longer input is truncated.
    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> Spectrum {
        let used = &samples[..samples.len().min(self.fft_size)];
        let mean = if used.is_empty() {
            0.0
        } else {
            used.iter().sum::<f32>() / used.len() as f32
        };

        let mut buffer: Vec<Complex<f32>> = used
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new((s - mean) * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        let scale = 2.0 / self.window_sum;
        let magnitudes_db = buffer[..self.fft_size / 2 + 1]
            .iter()
            .map(|c| {
                let magnitude = c.norm() * scale;
                if magnitude > 0.0 {
                    (20.0 * magnitude.log10()).max(FLOOR_DB)
                } else {
                    FLOOR_DB
                }
            })
            .collect();

        Spectrum {
            magnitudes_db,
            bin_hz: sample_rate as f32 / self.fft_size as f32,
        }
    }
}
