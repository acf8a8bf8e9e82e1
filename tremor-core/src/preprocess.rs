//! # Signal Preprocessing Module
//!
//! Prepares an acquired frame for the spectral transform:
//! 1. DC offset removal (gravity and sensor bias show up as a large 0 Hz component)
//! 2. Hamming windowing to reduce spectral leakage
//!
//! The DC-removed samples stay in `SignalBuffer::samples` for the RMS
//! amplitude; the windowed copy goes to the complex work buffer.

use rustfft::num_complex::Complex;
use tracing::debug;

use crate::acquisition::SignalBuffer;

/// Subtracts the frame mean so gravity and static bias drop out of the
/// spectrum and the RMS.
///
/// # Arguments
/// * `signal` - Vector-magnitude samples (modified in-place)
///
/// # Returns
/// * `f32` - The mean that was subtracted, in g
pub fn remove_dc_offset(signal: &mut [f32]) -> f32 {
    let len = signal.len();
    if len == 0 {
        return 0.0;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    for sample in signal.iter_mut() {
        *sample -= avg;
    }
    avg
}

/// Symmetric Hamming window coefficients for a frame of length `n`.
pub fn hamming_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos())
        .collect()
}

/// DC removal plus windowing with coefficients computed once per frame size.
#[derive(Debug, Clone)]
pub struct SignalPreprocessor {
    window: Vec<f32>,
}

impl SignalPreprocessor {
    pub fn new(sample_count: usize) -> Self {
        Self {
            window: hamming_window(sample_count),
        }
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Runs DC removal in place, then writes the windowed frame into the
    /// transform buffer with a zero imaginary part. Returns the removed mean.
    pub fn process(&self, buffer: &mut SignalBuffer) -> f32 {
        let mean = remove_dc_offset(&mut buffer.samples);
        debug!(dc_offset = mean, "removed DC component");

        for ((slot, &sample), &w) in buffer
            .work
            .iter_mut()
            .zip(buffer.samples.iter())
            .zip(self.window.iter())
        {
            *slot = Complex { re: sample * w, im: 0.0 };
        }
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dc_removal_centers_signal() {
        let mut signal = vec![1.0, 2.0, 3.0, 6.0];
        let mean = remove_dc_offset(&mut signal);
        assert_relative_eq!(mean, 3.0);
        assert_eq!(signal, vec![-2.0, -1.0, 0.0, 3.0]);
        assert_relative_eq!(signal.iter().sum::<f32>(), 0.0);
    }

    #[test]
    fn dc_removal_of_empty_signal_is_noop() {
        let mut signal: Vec<f32> = vec![];
        assert_eq!(remove_dc_offset(&mut signal), 0.0);
    }

    #[test]
    fn hamming_window_shape() {
        let w = hamming_window(9);
        assert_relative_eq!(w[0], 0.08, epsilon = 1e-6);
        assert_relative_eq!(w[8], 0.08, epsilon = 1e-6);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], w[7], epsilon = 1e-6);
    }

    #[test]
    fn process_keeps_dc_removed_samples_and_windows_the_copy() {
        let preprocessor = SignalPreprocessor::new(8);
        let mut buffer = SignalBuffer::new(8);
        buffer.load(&[2.0, 4.0, 2.0, 4.0, 2.0, 4.0, 2.0, 4.0]);

        let mean = preprocessor.process(&mut buffer);

        assert_relative_eq!(mean, 3.0);
        assert_eq!(buffer.samples[0], -1.0);
        assert_eq!(buffer.samples[1], 1.0);
        for i in 0..8 {
            assert_relative_eq!(buffer.work[i].re, buffer.samples[i] * preprocessor.window()[i]);
            assert_eq!(buffer.work[i].im, 0.0);
        }
    }
}
