//! # Spectral Analysis Module
//!
//! Forward FFT of the windowed frame, magnitude spectrum, and band-limited
//! peak/power statistics for the tremor band.
//!
//! ## Features
//! - FFT planned once per frame size using RustFFT
//! - Magnitude spectrum over the N/2 non-negative frequency bins
//! - Band peak search with ties resolved to the lowest bin
//! - Last-spectrum cache for later inspection

use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::acquisition::SignalBuffer;

/// Spectral features of one analysis frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    /// Frequency of the strongest in-band bin (Hz).
    pub peak_frequency: f32,
    /// Magnitude of the strongest in-band bin.
    pub peak_power: f32,
    /// Sum of magnitudes over the configured band.
    pub band_power: f32,
    /// Sum of magnitudes over all non-DC bins below Nyquist.
    pub total_power: f32,
    /// `total_power` divided by the usable bin count (N/2 - 1).
    pub avg_power: f32,
    pub peak_bin: usize,
}

/// Computes the magnitude spectrum and derives band statistics from it.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    sample_count: usize,
    sample_rate_hz: u32,
    magnitudes: Vec<f32>,
    last: SpectrumResult,
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("sample_count", &self.sample_count)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .field("last", &self.last)
            .finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(sample_count: usize, sample_rate_hz: u32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(sample_count);
        Self {
            fft,
            sample_count,
            sample_rate_hz,
            magnitudes: vec![0.0; sample_count / 2],
            last: SpectrumResult::default(),
        }
    }

    /// Frequency resolution in Hz per bin.
    pub fn resolution(&self) -> f32 {
        self.sample_rate_hz as f32 / self.sample_count as f32
    }

    pub fn freq_to_bin(&self, frequency: f32) -> usize {
        (frequency / self.resolution()).max(0.0) as usize
    }

    pub fn bin_to_freq(&self, bin: usize) -> f32 {
        bin as f32 * self.resolution()
    }

    /// Magnitude spectrum of the last transformed frame (N/2 bins).
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// The most recent band analysis result.
    pub fn last_spectrum(&self) -> SpectrumResult {
        self.last
    }

    /// Runs the forward FFT in place on the work buffer and stores the
    /// magnitudes of the first N/2 bins.
    pub fn transform(&mut self, buffer: &mut SignalBuffer) {
        self.fft.process(&mut buffer.work);
        for (slot, c) in self.magnitudes.iter_mut().zip(buffer.work.iter()) {
            *slot = c.norm();
        }
    }

    /// Finds the in-band peak and the band/total power of the current
    /// magnitude spectrum, and caches the result.
    pub fn analyze_band(&mut self, freq_min: f32, freq_max: f32) -> SpectrumResult {
        let half = self.sample_count / 2;
        let start_bin = self.freq_to_bin(freq_min).max(1);
        let end_bin = self.freq_to_bin(freq_max).min(half - 2);

        let total_power: f32 = self.magnitudes[1..half].iter().sum();

        let mut peak_power = 0.0;
        let mut peak_bin = start_bin;
        let mut band_power = 0.0;
        if start_bin <= end_bin {
            for (bin, &magnitude) in self.magnitudes[start_bin..=end_bin]
                .iter()
                .enumerate()
                .map(|(offset, m)| (start_bin + offset, m))
            {
                band_power += magnitude;
                if magnitude > peak_power {
                    peak_power = magnitude;
                    peak_bin = bin;
                }
            }
        }

        let result = SpectrumResult {
            peak_frequency: self.bin_to_freq(peak_bin),
            peak_power,
            band_power,
            total_power,
            avg_power: total_power / (half - 1) as f32,
            peak_bin,
        };
        self.last = result;
        result
    }

    /// Transform followed by band analysis.
    ///
    /// # Arguments
    /// * `buffer` - Frame whose `work` holds the windowed samples; overwritten
    ///   with the spectrum
    /// * `freq_min`, `freq_max` - Tremor band in Hz, inclusive
    ///
    /// # Returns
    /// * `SpectrumResult` - Band peak and power figures, also cached as
    ///   [`last_spectrum`](Self::last_spectrum)
    pub fn analyze(
        &mut self,
        buffer: &mut SignalBuffer,
        freq_min: f32,
        freq_max: f32,
    ) -> SpectrumResult {
        self.transform(buffer);
        self.analyze_band(freq_min, freq_max)
    }
}
