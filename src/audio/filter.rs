// Input conditioning filters
//
// RBJ cookbook biquads run in stream order over every drained block:
// high-pass (rumble and handling noise) -> optional low shelf (bass boost for
// small microphones that roll off the low strings) -> low-pass (hiss).

use std::f64::consts::PI;

use crate::config::CaptureConfig;

const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Filter response type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    HighPass,
    LowPass,
    LowShelf { gain_db: f64 },
}

/// Single second-order section, transposed direct form II
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: FilterKind,
    cutoff_hz: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// Design a section for `sample_rate`; the cutoff is kept below Nyquist
    pub fn new(kind: FilterKind, cutoff_hz: f32, sample_rate: u32) -> Self {
        let fs = sample_rate as f64;
        let f0 = (cutoff_hz as f64).clamp(1.0, fs * 0.45);
        let w0 = 2.0 * PI * f0 / fs;
        let (sin_w0, cos_w0) = w0.sin_cos();

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::HighPass => {
                let alpha = sin_w0 / (2.0 * BUTTERWORTH_Q);
                (
                    (1.0 + cos_w0) / 2.0,
                    -(1.0 + cos_w0),
                    (1.0 + cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::LowPass => {
                let alpha = sin_w0 / (2.0 * BUTTERWORTH_Q);
                (
                    (1.0 - cos_w0) / 2.0,
                    1.0 - cos_w0,
                    (1.0 - cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::LowShelf { gain_db } => {
                // Shelf slope S = 1
                let a = 10f64.powf(gain_db / 40.0);
                let alpha = sin_w0 / 2.0 * 2f64.sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        Self {
            kind,
            cutoff_hz: f0,
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz as f32
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let x = x as f64;
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y as f32
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// Ordered filter stages applied to the captured signal
#[derive(Debug, Clone)]
pub struct FilterChain {
    stages: Vec<Biquad>,
}

impl FilterChain {
    /// Build the conditioning chain for the given capture settings
    ///
    /// With `bass_boost` the high-pass cutoff drops to `bass_boost_highpass_hz`
    /// and a low shelf of `low_shelf_gain_db` is inserted before the low-pass.
    pub fn from_config(config: &CaptureConfig, sample_rate: u32) -> Self {
        let mut stages = Vec::with_capacity(3);
        let highpass_hz = if config.bass_boost {
            config.bass_boost_highpass_hz
        } else {
            config.highpass_hz
        };
        stages.push(Biquad::new(FilterKind::HighPass, highpass_hz, sample_rate));
        if config.bass_boost {
            stages.push(Biquad::new(
                FilterKind::LowShelf {
                    gain_db: config.low_shelf_gain_db as f64,
                },
                config.low_shelf_hz,
                sample_rate,
            ));
        }
        stages.push(Biquad::new(
            FilterKind::LowPass,
            config.lowpass_hz,
            sample_rate,
        ));
        Self { stages }
    }

    pub fn stages(&self) -> &[Biquad] {
        &self.stages
    }

    /// Filter a block in place, continuing from the previous block's state
    pub fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            let mut value = *sample;
            for stage in &mut self.stages {
                value = stage.process_sample(value);
            }
            *sample = value;
        }
    }

    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(Biquad::reset);
    }
}
