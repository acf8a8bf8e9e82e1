//! # Sample Acquisition Module
//!
//! Drives a [`SensorSource`] at a fixed cadence and turns each tri-axial
//! accelerometer reading into a scalar vector-magnitude sample in g.
//!
//! ## Features
//! - Fixed-rate blocking acquisition with one clock suspension per sample
//! - Silent zero substitution for failed reads (counted, never escalated)
//! - Thread-safe 0-100 progress indicator

use rustfft::num_complex::Complex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

use crate::sensor::{Clock, SensorSource};

/// Number of samples per analysis frame (must be a power of two).
///
/// 256 samples at 125 Hz is ~2 s of data and gives a resolution of ~0.488 Hz.
pub const SAMPLE_COUNT: usize = 256;

/// Sample rate in Hz, matching the IMU output data rate.
pub const SAMPLE_RATE_HZ: u32 = 125;

/// Delay between consecutive samples (1000 / 125).
pub const SAMPLE_INTERVAL_MS: u64 = 8;

/// Accelerometer scale factor in LSB/g for the ±2 g range.
pub const ACCEL_SENSITIVITY: f32 = 16384.0;

/// Invalid acquisition parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("sample count {0} must be a power of two and at least 8")]
    SampleCount(usize),

    #[error("sample rate must be positive")]
    SampleRate,

    #[error("accelerometer sensitivity must be positive, got {0}")]
    Sensitivity(f32),
}

/// Fixed parameters of the acquisition front end.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionSettings {
    pub sample_count: usize,
    pub sample_rate_hz: u32,
    pub sample_interval: Duration,
    /// LSB per g of the accelerometer's configured range.
    pub accel_sensitivity: f32,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            sample_count: SAMPLE_COUNT,
            sample_rate_hz: SAMPLE_RATE_HZ,
            sample_interval: Duration::from_millis(SAMPLE_INTERVAL_MS),
            accel_sensitivity: ACCEL_SENSITIVITY,
        }
    }
}

impl AcquisitionSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.sample_count.is_power_of_two() || self.sample_count < 8 {
            return Err(SettingsError::SampleCount(self.sample_count));
        }
        if self.sample_rate_hz == 0 {
            return Err(SettingsError::SampleRate);
        }
        if !(self.accel_sensitivity > 0.0) {
            return Err(SettingsError::Sensitivity(self.accel_sensitivity));
        }
        Ok(())
    }

    /// Width of one FFT bin in Hz.
    pub fn resolution(&self) -> f32 {
        self.sample_rate_hz as f32 / self.sample_count as f32
    }

    /// Wall time one acquisition occupies.
    pub fn collection_time(&self) -> Duration {
        self.sample_interval * self.sample_count as u32
    }
}

/// Owned, pre-sized sample storage reused across cycles.
///
/// `samples` holds the real signal (vector magnitudes, then DC-removed after
/// preprocessing). `work` is the complex transform buffer: windowed samples
/// with a zero imaginary companion before the FFT, the spectrum after it.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    pub samples: Vec<f32>,
    pub work: Vec<Complex<f32>>,
}

impl SignalBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
            work: vec![Complex { re: 0.0, im: 0.0 }; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Loads real samples into the buffer, clearing the transform buffer.
    ///
    /// Extra input is ignored; missing input is zero-filled.
    #[cfg(test)]
    pub(crate) fn load(&mut self, input: &[f32]) {
        for (i, slot) in self.samples.iter_mut().enumerate() {
            *slot = input.get(i).copied().unwrap_or(0.0);
        }
        self.work.fill(Complex { re: 0.0, im: 0.0 });
    }
}

/// Shared view of acquisition progress (0-100).
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<AtomicU8>);

impl ProgressHandle {
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, percent: u8) {
        self.0.store(percent, Ordering::Relaxed);
    }
}

/// Summary of one acquisition run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Samples substituted with zero because the read failed.
    pub failed_reads: usize,
}

/// Samples the sensor `sample_count` times at a fixed interval.
#[derive(Debug, Clone)]
pub struct SampleAcquirer {
    settings: AcquisitionSettings,
    progress: ProgressHandle,
}

impl SampleAcquirer {
    pub fn new(settings: AcquisitionSettings) -> Self {
        Self {
            settings,
            progress: ProgressHandle::default(),
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Handle that observes progress of the current (or last) acquisition.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// Fills `buffer` with one frame of vector-magnitude samples.
    ///
    /// Blocks for `sample_count * sample_interval` of clock time. A failed
    /// read yields a zero sample. Progress restarts at 0 and climbs to 100.
    ///
    /// # Arguments
    /// * `sensor` - Source of raw tri-axial readings
    /// * `clock` - Suspended once per sample for the sample interval
    /// * `buffer` - Receives `buffer.len()` samples in g
    ///
    /// # Returns
    /// * `AcquisitionReport` - How many reads failed
    pub fn acquire(
        &self,
        sensor: &mut dyn SensorSource,
        clock: &dyn Clock,
        buffer: &mut SignalBuffer,
    ) -> AcquisitionReport {
        let n = buffer.len();
        let mut report = AcquisitionReport::default();
        self.progress.set(0);

        for i in 0..n {
            let value = match sensor.read() {
                Ok(reading) => vector_magnitude(reading.accel, self.settings.accel_sensitivity),
                Err(e) => {
                    trace!(sample = i, error = %e, "sensor read failed, substituting zero");
                    report.failed_reads += 1;
                    0.0
                }
            };
            buffer.samples[i] = value;
            buffer.work[i] = Complex { re: value, im: 0.0 };

            self.progress.set(((i + 1) * 100 / n) as u8);
            clock.sleep(self.settings.sample_interval);
        }

        report
    }
}

/// Euclidean magnitude in g of a raw accelerometer triple.
pub fn vector_magnitude(raw: [i16; 3], sensitivity: f32) -> f32 {
    let [x, y, z] = raw.map(|axis| axis as f32 / sensitivity);
    (x * x + y * y + z * z).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{ManualClock, RawReading, SensorError};
    use approx::assert_relative_eq;

    /// Returns a fixed reading, failing on every `fail_every`-th call.
    struct FlakySensor {
        calls: usize,
        fail_every: usize,
        reading: RawReading,
    }

    impl SensorSource for FlakySensor {
        fn read(&mut self) -> Result<RawReading, SensorError> {
            self.calls += 1;
            if self.fail_every > 0 && self.calls % self.fail_every == 0 {
                Err(SensorError::NotResponding)
            } else {
                Ok(self.reading)
            }
        }
    }

    fn small_settings() -> AcquisitionSettings {
        AcquisitionSettings {
            sample_count: 16,
            ..AcquisitionSettings::default()
        }
    }

    #[test]
    fn magnitude_of_axis_aligned_gravity_is_one_g() {
        assert_relative_eq!(vector_magnitude([0, 0, 16384], 16384.0), 1.0);
        assert_relative_eq!(vector_magnitude([3 * 2048, 4 * 2048, 0], 2048.0), 5.0);
    }

    #[test]
    fn failed_reads_become_zero_samples() {
        let acquirer = SampleAcquirer::new(small_settings());
        let clock = ManualClock::new();
        let mut buffer = SignalBuffer::new(16);
        let mut sensor = FlakySensor {
            calls: 0,
            fail_every: 4,
            reading: RawReading { accel: [0, 0, 16384], ..RawReading::default() },
        };

        let report = acquirer.acquire(&mut sensor, &clock, &mut buffer);

        assert_eq!(report.failed_reads, 4);
        assert_eq!(buffer.samples[3], 0.0);
        assert_relative_eq!(buffer.samples[0], 1.0);
        assert!(buffer.work.iter().all(|c| c.im == 0.0));
    }

    #[test]
    fn acquisition_sleeps_once_per_sample_and_reports_full_progress() {
        let acquirer = SampleAcquirer::new(small_settings());
        let progress = acquirer.progress();
        let clock = ManualClock::new();
        let mut buffer = SignalBuffer::new(16);
        let mut sensor = FlakySensor { calls: 0, fail_every: 0, reading: RawReading::default() };

        acquirer.acquire(&mut sensor, &clock, &mut buffer);

        assert_eq!(sensor.calls, 16);
        assert_eq!(clock.now_ms(), 16 * SAMPLE_INTERVAL_MS);
        assert_eq!(progress.get(), 100);
    }

    /// Records the shared progress value every time it is read.
    struct ProgressRecorder {
        progress: ProgressHandle,
        seen: Vec<u8>,
    }

    impl SensorSource for ProgressRecorder {
        fn read(&mut self) -> Result<RawReading, SensorError> {
            self.seen.push(self.progress.get());
            Ok(RawReading::default())
        }
    }

    #[test]
    fn progress_climbs_and_restarts_each_run() {
        let acquirer = SampleAcquirer::new(small_settings());
        let clock = ManualClock::new();
        let mut buffer = SignalBuffer::new(16);
        let mut sensor = ProgressRecorder { progress: acquirer.progress(), seen: Vec::new() };

        acquirer.acquire(&mut sensor, &clock, &mut buffer);
        assert_eq!(sensor.seen.len(), 16);
        assert_eq!(sensor.seen[0], 0);
        assert!(sensor.seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", sensor.seen);
        assert!(sensor.seen.iter().all(|&p| p <= 100));
        assert_eq!(acquirer.progress().get(), 100);

        sensor.seen.clear();
        acquirer.acquire(&mut sensor, &clock, &mut buffer);
        assert_eq!(sensor.seen[0], 0);
        assert!(sensor.seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn settings_reject_non_power_of_two() {
        let settings = AcquisitionSettings { sample_count: 100, ..AcquisitionSettings::default() };
        assert_eq!(settings.validate(), Err(SettingsError::SampleCount(100)));
        assert!(AcquisitionSettings::default().validate().is_ok());
    }

    #[test]
    fn default_resolution_is_just_under_half_a_hertz() {
        assert_relative_eq!(AcquisitionSettings::default().resolution(), 0.48828125);
        assert_eq!(AcquisitionSettings::default().collection_time(), Duration::from_millis(2048));
    }

    #[test]
    fn load_pads_short_input_with_zeros() {
        let mut buffer = SignalBuffer::new(8);
        buffer.load(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.samples, vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }
}
