// tremor-core/src/lib.rs

//! The core logic for the tremor monitoring wristband.
//! This crate is responsible for accelerometer acquisition, spectral
//! analysis, tremor detection and severity grading. It is completely
//! headless: the sensor and the clock are injected capabilities, and
//! networking, reporting and persistence live elsewhere.

pub mod acquisition;
pub mod config;
pub mod detection;
pub mod pipeline;
pub mod preprocess;
pub mod sensor;
pub mod spectrum;
pub mod stats;

pub use acquisition::{AcquisitionSettings, SettingsError};
pub use config::{ConfigError, ConfigStore, RemoteConfig, RuntimeConfig, UpdateOutcome};
pub use detection::{DetectionResult, Outcome};
pub use pipeline::TremorDetector;
pub use sensor::{Clock, ManualClock, RawReading, SensorError, SensorSource, SystemClock};
pub use spectrum::SpectrumResult;
pub use stats::Statistics;
