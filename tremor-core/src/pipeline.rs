//! # Analysis Pipeline
//!
//! [`TremorDetector`] is the context object for one wearable: it owns the
//! sample buffer, the spectral analyzer and the statistics, holds a shared
//! handle to the threshold store, and runs one complete analysis per
//! [`TremorDetector::analyze`] call.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::acquisition::{AcquisitionSettings, ProgressHandle, SampleAcquirer, SettingsError, SignalBuffer};
use crate::config::ConfigStore;
use crate::detection::{self, DetectionResult};
use crate::preprocess::SignalPreprocessor;
use crate::sensor::{Clock, SensorSource};
use crate::spectrum::{SpectralAnalyzer, SpectrumResult};
use crate::stats::{Statistics, StatisticsAggregator};

/// Sensor capability as held by the detector.
pub type BoxedSensor = Box<dyn SensorSource + Send>;

pub struct TremorDetector {
    acquirer: SampleAcquirer,
    preprocessor: SignalPreprocessor,
    analyzer: SpectralAnalyzer,
    buffer: SignalBuffer,
    stats: StatisticsAggregator,
    config: Arc<ConfigStore>,
    clock: Box<dyn Clock>,
    sensor: Option<BoxedSensor>,
}

impl TremorDetector {
    pub fn new(
        settings: AcquisitionSettings,
        config: Arc<ConfigStore>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let n = settings.sample_count;

        info!(
            samples = n,
            sample_rate_hz = settings.sample_rate_hz,
            resolution_hz = settings.resolution(),
            "tremor detector initialized"
        );

        Ok(Self {
            preprocessor: SignalPreprocessor::new(n),
            analyzer: SpectralAnalyzer::new(n, settings.sample_rate_hz),
            buffer: SignalBuffer::new(n),
            stats: StatisticsAggregator::new(clock.now_ms()),
            acquirer: SampleAcquirer::new(settings),
            config,
            clock,
            sensor: None,
        })
    }

    /// Supplies the sensor capability. Replaces any previously registered one.
    pub fn register_sensor(&mut self, sensor: BoxedSensor) {
        self.sensor = Some(sensor);
    }

    pub fn is_ready(&self) -> bool {
        self.sensor.is_some()
    }

    /// Runs one complete cycle: acquire, preprocess, transform, detect, and
    /// update statistics. Blocks for the whole acquisition.
    ///
    /// Without a registered sensor the cycle is skipped and the result is
    /// marked invalid.
    pub fn analyze(&mut self) -> DetectionResult {
        let timestamp_ms = self.clock.now_ms();
        let Some(sensor) = self.sensor.as_mut() else {
            warn!("analysis requested before a sensor was registered");
            return DetectionResult::not_ready(timestamp_ms);
        };

        let report = self.acquirer.acquire(&mut **sensor, self.clock.as_ref(), &mut self.buffer);
        self.preprocessor.process(&mut self.buffer);

        let config = self.config.read();
        let spectrum = self.analyzer.analyze(&mut self.buffer, config.freq_min, config.freq_max);

        let mut result = detection::evaluate(&spectrum, &self.buffer.samples, &config, timestamp_ms);
        result.failed_reads = report.failed_reads;
        self.stats.record(&result);

        debug!(
            outcome = ?result.outcome(),
            frequency_hz = result.frequency,
            rms_g = result.rms_amplitude,
            band_power = spectrum.band_power,
            severity = result.severity,
            failed_reads = report.failed_reads,
            config_version = config.version,
            "analysis cycle complete"
        );
        if report.failed_reads > 0 {
            warn!(failed_reads = report.failed_reads, "sensor reads failed during acquisition");
        }

        result
    }

    pub fn last_spectrum(&self) -> SpectrumResult {
        self.analyzer.last_spectrum()
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&mut self) {
        self.stats.reset(self.clock.now_ms());
    }

    pub fn progress(&self) -> ProgressHandle {
        self.acquirer.progress()
    }

    /// Spectral analyzer, for bin/frequency conversion and the magnitude spectrum.
    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        self.acquirer.settings()
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }
}
