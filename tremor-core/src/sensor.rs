//! # Sensor and Clock Capabilities
//!
//! The analysis pipeline never talks to hardware directly. It consumes two
//! capabilities supplied by the host:
//!
//! - [`SensorSource`]: one raw accelerometer/gyroscope/temperature reading per call
//! - [`Clock`]: monotonic milliseconds plus a blocking sleep, used as the
//!   suspension point between samples
//!
//! Real drivers and test doubles implement the same traits, so the whole
//! pipeline can run against synthetic data on a virtual clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A single raw reading from a 6-axis IMU with temperature.
///
/// All values are raw register counts (LSB); conversion to physical units is
/// the consumer's job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReading {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    pub temperature: i16,
}

/// Failure to obtain a reading from the sensor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    ReadFailed(String),

    #[error("sensor not responding")]
    NotResponding,
}

/// Pluggable source of raw IMU readings.
pub trait SensorSource {
    /// Reads one sample. Called once per sample interval during acquisition.
    fn read(&mut self) -> Result<RawReading, SensorError>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn read(&mut self) -> Result<RawReading, SensorError> {
        (**self).read()
    }
}

/// Time capability: a monotonic millisecond counter and a blocking sleep.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;

    /// Blocks the calling context for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock whose `sleep` returns immediately after advancing time.
///
/// Lets a test harness or a fast simulation run full acquisition cycles
/// without real-time delay while timestamps still move forward.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now_ms: u64) -> Self {
        Self { now_ms: AtomicU64::new(now_ms) }
    }

    /// Moves virtual time forward without a sleep call.
    pub fn advance(&self, duration: Duration) {
        self.now_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Deterministic sinusoidal vibration source.
///
/// Produces `bias + rms * sqrt(2) * sin(2π f t)` g on the z axis and zero on
/// x/y, so the vector magnitude equals the z value as long as the
/// oscillation never drives z below zero (`rms * sqrt(2) < bias`).
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    frequency_hz: f32,
    rms_g: f32,
    bias_g: f32,
    sample_rate_hz: f32,
    sensitivity: f32,
    index: u64,
}

impl SyntheticSource {
    /// A tremor of the given frequency and RMS amplitude riding on 1 g of gravity.
    pub fn new(frequency_hz: f32, rms_g: f32, sample_rate_hz: f32, sensitivity: f32) -> Self {
        Self {
            frequency_hz,
            rms_g,
            bias_g: 1.0,
            sample_rate_hz,
            sensitivity,
            index: 0,
        }
    }

    /// Replaces the constant z-axis bias (default 1 g).
    pub fn with_bias(mut self, bias_g: f32) -> Self {
        self.bias_g = bias_g;
        self
    }

    /// Value in g of the next sample, advancing the phase.
    pub fn next_value_g(&mut self) -> f32 {
        let t = self.index as f32 / self.sample_rate_hz;
        self.index += 1;
        let peak = self.rms_g * std::f32::consts::SQRT_2;
        self.bias_g + peak * (2.0 * std::f32::consts::PI * self.frequency_hz * t).sin()
    }

    /// Converts a value in g to a saturated raw register count.
    pub fn to_raw(&self, value_g: f32) -> i16 {
        (value_g * self.sensitivity)
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}

impl SensorSource for SyntheticSource {
    fn read(&mut self) -> Result<RawReading, SensorError> {
        let z = self.next_value_g();
        Ok(RawReading {
            accel: [0, 0, self.to_raw(z)],
            ..RawReading::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleep_advances_time() {
        let clock = ManualClock::starting_at(100);
        clock.sleep(Duration::from_millis(8));
        clock.sleep(Duration::from_millis(8));
        assert_eq!(clock.now_ms(), 116);
    }

    #[test]
    fn synthetic_source_starts_at_bias() {
        let mut source = SyntheticSource::new(5.0, 1.0, 125.0, 2048.0).with_bias(4.0);
        let first = source.read().unwrap();
        assert_eq!(first.accel, [0, 0, 8192]);
        assert_eq!(first.gyro, [0, 0, 0]);
    }

    #[test]
    fn synthetic_source_saturates_raw_counts() {
        let source = SyntheticSource::new(5.0, 1.0, 125.0, 16384.0);
        assert_eq!(source.to_raw(10.0), i16::MAX);
        assert_eq!(source.to_raw(-10.0), i16::MIN);
    }

    #[test]
    fn boxed_source_forwards_reads() {
        let mut boxed: Box<dyn SensorSource> =
            Box::new(SyntheticSource::new(5.0, 0.0, 125.0, 1000.0));
        assert_eq!(boxed.read().unwrap().accel[2], 1000);
    }
}
