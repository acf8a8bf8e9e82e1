//! End-to-end runs of the analysis pipeline against synthetic wrist motion.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use tremor_core::sensor::SyntheticSource;
use tremor_core::{
    AcquisitionSettings, Clock, ConfigStore, ManualClock, Outcome, RuntimeConfig, TremorDetector,
};

/// ±16 g range, so a few g of tremor fit in the raw registers.
const SENSITIVITY: f32 = 2048.0;

fn settings() -> AcquisitionSettings {
    AcquisitionSettings {
        accel_sensitivity: SENSITIVITY,
        ..AcquisitionSettings::default()
    }
}

/// Tremor of `rms_g` at `frequency_hz` on a large bias so the vector
/// magnitude never folds over zero.
fn tremor(frequency_hz: f32, rms_g: f32) -> SyntheticSource {
    SyntheticSource::new(frequency_hz, rms_g, 125.0, SENSITIVITY).with_bias(8.0)
}

fn detector_with(store: Arc<ConfigStore>, source: SyntheticSource) -> TremorDetector {
    let mut detector =
        TremorDetector::new(settings(), store, Box::new(ManualClock::new())).unwrap();
    detector.register_sensor(Box::new(source));
    detector
}

#[test]
fn five_hertz_tremor_is_detected_with_mild_severity() {
    let mut detector = detector_with(Arc::new(ConfigStore::default()), tremor(5.0, 3.2));

    let result = detector.analyze();

    assert!(result.valid);
    assert!(!result.out_of_range);
    assert!(result.detected, "{result:?}");
    assert_eq!(result.severity, 2);
    assert!((result.frequency - 5.0).abs() <= 0.49, "peak at {}", result.frequency);
    assert_relative_eq!(result.rms_amplitude, 3.2, epsilon = 0.1);
    assert_eq!(result.failed_reads, 0);
    assert_eq!(result.outcome(), Outcome::Detected);
    assert_eq!(detector.last_spectrum(), result.spectrum);
}

#[test]
fn peak_tracks_tone_frequency_within_one_bin() {
    let resolution = settings().resolution();
    for frequency in [4.2_f32, 4.6, 5.0, 5.5, 5.9] {
        let mut detector = detector_with(Arc::new(ConfigStore::default()), tremor(frequency, 3.0));
        let result = detector.analyze();
        assert!(
            (result.frequency - frequency).abs() <= resolution,
            "tone {frequency} Hz reported at {} Hz",
            result.frequency
        );
        assert!(result.detected, "tone {frequency} Hz not detected: {result:?}");
    }
}

#[test]
fn weak_tremor_is_not_detected() {
    let mut detector = detector_with(Arc::new(ConfigStore::default()), tremor(5.0, 1.0));
    let result = detector.analyze();
    assert!(result.valid);
    assert!(!result.detected);
    assert_eq!(result.severity, 0);
    let criteria = result.criteria.unwrap();
    assert!(criteria.power_ok);
    assert!(!criteria.rms_ok);
}

#[test]
fn out_of_band_tone_leaves_little_band_power() {
    let mut in_band = detector_with(Arc::new(ConfigStore::default()), tremor(5.0, 3.2));
    let mut off_band = detector_with(Arc::new(ConfigStore::default()), tremor(11.0, 3.2));
    let inside = in_band.analyze().spectrum;
    let outside = off_band.analyze().spectrum;
    assert!(outside.band_power * 10.0 < inside.band_power);
}

#[test]
fn excessive_motion_is_out_of_range_but_counted() {
    let mut detector = detector_with(Arc::new(ConfigStore::default()), tremor(5.0, 5.3));
    let result = detector.analyze();
    assert!(result.out_of_range);
    assert!(!result.valid);
    assert!(!result.detected);
    assert_eq!(result.outcome(), Outcome::OutOfRange);

    let stats = detector.statistics();
    assert_eq!(stats.total_analyses, 1);
    assert_eq!(stats.tremor_count, 0);
}

#[test]
fn statistics_accumulate_across_cycles() {
    let mut detector = detector_with(Arc::new(ConfigStore::default()), tremor(5.0, 3.2));
    let first = detector.analyze();
    let second = detector.analyze();

    let stats = detector.statistics();
    assert_eq!(stats.total_analyses, 2);
    assert_eq!(stats.tremor_count, 2);
    assert_relative_eq!(
        stats.avg_amplitude,
        (first.rms_amplitude + second.rms_amplitude) / 2.0,
        epsilon = 1e-5
    );
    assert_eq!(stats.max_severity, 2);
    assert!(second.timestamp_ms >= first.timestamp_ms + 2048);
}

#[test]
fn updated_thresholds_apply_to_next_cycle() {
    let store = Arc::new(ConfigStore::default());
    let mut detector = detector_with(Arc::clone(&store), tremor(5.0, 3.2));
    assert!(detector.analyze().detected);

    store
        .update(RuntimeConfig { rms_min: 3.5, rms_max: 6.0, version: 1, ..RuntimeConfig::default() })
        .unwrap();

    let result = detector.analyze();
    assert!(!result.detected);
    assert!(!result.criteria.unwrap().rms_ok);
}

#[test]
fn config_can_be_updated_from_another_thread() {
    let store = Arc::new(ConfigStore::default());
    let writer = Arc::clone(&store);
    let handle = std::thread::spawn(move || {
        for version in 1..=50 {
            writer
                .update(RuntimeConfig { version, ..RuntimeConfig::default() })
                .unwrap();
        }
    });

    let mut detector = detector_with(Arc::clone(&store), tremor(5.0, 3.2));
    let result = detector.analyze();
    handle.join().unwrap();

    assert!(result.detected);
    assert_eq!(store.read().version, 50);
}

/// Lets the test keep a handle on the clock the detector owns.
struct SharedClock(Arc<ManualClock>);

impl Clock for SharedClock {
    fn now_ms(&self) -> u64 {
        self.0.now_ms()
    }

    fn sleep(&self, duration: Duration) {
        self.0.sleep(duration)
    }
}

#[test]
fn virtual_clock_measures_collection_time() {
    let clock = Arc::new(ManualClock::new());

    let mut detector = TremorDetector::new(
        settings(),
        Arc::new(ConfigStore::default()),
        Box::new(SharedClock(Arc::clone(&clock))),
    )
    .unwrap();
    detector.register_sensor(Box::new(tremor(5.0, 3.2)));
    detector.analyze();

    assert_eq!(clock.now_ms(), settings().collection_time().as_millis() as u64);
}
