use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::window::{SampleWindow, MAX_BINS, WINDOW_SIZE};
use crate::config::ConfigError;

/// Magnitude spectrum of one window, truncated to the low `bins` bins and
/// scaled by `scaling / bins`.
pub struct SpectralEstimator {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bins: usize,
    scale: f32,
}

impl SpectralEstimator {
    pub fn new(bins: usize, scaling: f32) -> Result<Self, ConfigError> {
        if bins == 0 || bins > MAX_BINS {
            return Err(ConfigError::BinCount {
                bins,
                max: MAX_BINS,
            });
        }
        if !scaling.is_finite() {
            return Err(ConfigError::Scaling(scaling));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(WINDOW_SIZE);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); WINDOW_SIZE],
            scratch,
            bins,
            scale: scaling / bins as f32,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Writes `bins` magnitudes into `out`, resizing it if needed.
    pub fn analyze_into(&mut self, window: &SampleWindow, out: &mut Vec<f32>) {
        // Real signal: imaginary input is zero
        for (slot, &sample) in self.buffer.iter_mut().zip(window.samples()) {
            *slot = Complex::new(sample, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        out.resize(self.bins, 0.0);
        for (dst, c) in out.iter_mut().zip(&self.buffer[..self.bins]) {
            let magnitude = c.norm() * self.scale;
            *dst = if magnitude.is_finite() { magnitude } else { 0.0 };
        }
    }

    pub fn analyze(&mut self, window: &SampleWindow) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.bins);
        self.analyze_into(window, &mut out);
        out
    }
}
