//! Simulated wristband IMU for running the monitor without hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::warn;
use tremor_core::sensor::SyntheticSource;
use tremor_core::{RawReading, SensorError, SensorSource};

/// Raw temperature register value for ~33 °C skin temperature
/// (`raw = (T - 36.53) * 340`).
const SKIN_TEMPERATURE_RAW: i16 = -1200;

/// Parameters of the simulated wearer.
#[derive(Debug, Clone)]
pub struct WristProfile {
    pub tremor_frequency_hz: f32,
    pub tremor_rms_g: f32,
    /// Constant z-axis bias in g (gravity plus strap offset).
    pub bias_g: f32,
    /// Standard deviation of per-axis noise in g.
    pub noise_g: f32,
    /// Probability that a single read fails. NaN counts as 0.
    pub dropout: f64,
    pub seed: u64,
}

/// A [`SensorSource`] producing tremor on top of gravity, with noise and
/// occasional bus failures.
pub struct SimulatedWrist {
    motion: SyntheticSource,
    /// `None` for a noiseless sensor.
    noise: Option<Normal<f32>>,
    dropout: f64,
    rng: StdRng,
}

impl SimulatedWrist {
    pub fn new(profile: &WristProfile, sample_rate_hz: f32, sensitivity: f32) -> Self {
        let motion = SyntheticSource::new(
            profile.tremor_frequency_hz,
            profile.tremor_rms_g,
            sample_rate_hz,
            sensitivity,
        )
        .with_bias(profile.bias_g);

        let noise = if profile.noise_g > 0.0 {
            Normal::new(0.0, profile.noise_g)
                .map_err(|e| warn!(noise_g = profile.noise_g, error = %e, "noise disabled"))
                .ok()
        } else {
            None
        };
        let dropout = if profile.dropout.is_nan() {
            0.0
        } else {
            profile.dropout.clamp(0.0, 1.0)
        };

        Self {
            motion,
            noise,
            dropout,
            rng: StdRng::seed_from_u64(profile.seed),
        }
    }

    fn noise(&mut self) -> f32 {
        match &self.noise {
            Some(normal) => normal.sample(&mut self.rng),
            None => 0.0,
        }
    }
}

impl SensorSource for SimulatedWrist {
    fn read(&mut self) -> Result<RawReading, SensorError> {
        // Time advances even when the bus drops a sample.
        let z = self.motion.next_value_g();
        if self.rng.gen_bool(self.dropout) {
            return Err(SensorError::ReadFailed("i2c timeout".to_string()));
        }

        let x = self.noise();
        let y = self.noise();
        let z = z + self.noise();
        Ok(RawReading {
            accel: [self.motion.to_raw(x), self.motion.to_raw(y), self.motion.to_raw(z)],
            gyro: [
                self.rng.gen_range(-40..=40),
                self.rng.gen_range(-40..=40),
                self.rng.gen_range(-40..=40),
            ],
            temperature: SKIN_TEMPERATURE_RAW,
        })
    }
}
