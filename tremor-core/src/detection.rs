//! # Tremor Detection Module
//!
//! Turns a spectrum and the DC-removed frame into a detection decision.
//!
//! Decision order:
//! 1. RMS above `rms_max` → the cycle is discarded as out of range
//! 2. Otherwise three criteria must all hold: band power above threshold,
//!    peak frequency inside the band, RMS at or above `rms_min`
//! 3. A detection is graded 0-4 from the RMS amplitude

use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::spectrum::SpectrumResult;

/// Highest severity grade.
pub const MAX_SEVERITY: u8 = 4;

const SEVERITY_LABELS: [&str; 5] = ["None", "Slight", "Mild", "Moderate", "Severe"];
const SEVERITY_LABELS_ZH: [&str; 5] = ["无", "轻微", "轻度", "中度", "重度"];

/// The three outcomes an analysis cycle can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    OutOfRange,
    NotDetected,
    Detected,
}

/// Individual checks behind a detection decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub power_ok: bool,
    pub freq_ok: bool,
    pub rms_ok: bool,
}

impl Criteria {
    pub fn all(&self) -> bool {
        self.power_ok && self.freq_ok && self.rms_ok
    }
}

/// Outcome of one analysis cycle. Produced once, never mutated afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detected: bool,
    /// False for out-of-range cycles and when no sensor was available.
    pub valid: bool,
    pub out_of_range: bool,
    /// Peak frequency (Hz).
    pub frequency: f32,
    /// Band power spread over the N/2 bins (g).
    pub amplitude: f32,
    /// RMS of the DC-removed frame (g).
    pub rms_amplitude: f32,
    /// Peak bin magnitude.
    pub power: f32,
    /// Peak power over average power.
    pub peak_ratio: f32,
    pub severity: u8,
    pub timestamp_ms: u64,
    pub spectrum: SpectrumResult,
    /// Absent when the criteria were never evaluated.
    pub criteria: Option<Criteria>,
    /// Samples replaced with zero during acquisition.
    pub failed_reads: usize,
}

impl DetectionResult {
    /// Result for a cycle that could not run (no sensor registered).
    pub fn not_ready(timestamp_ms: u64) -> Self {
        Self {
            valid: false,
            timestamp_ms,
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.out_of_range {
            Outcome::OutOfRange
        } else if self.detected {
            Outcome::Detected
        } else {
            Outcome::NotDetected
        }
    }

    pub fn severity_label(&self) -> &'static str {
        severity_label(self.severity)
    }
}

/// Root-mean-square of a frame.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Maps an RMS amplitude onto the five severity bands.
pub fn calculate_severity(amplitude: f32, thresholds: &[f32; 4]) -> u8 {
    thresholds
        .iter()
        .position(|&t| amplitude < t)
        .map_or(MAX_SEVERITY, |band| band as u8)
}

/// English label for a severity grade; out-of-range grades are clamped.
pub fn severity_label(severity: u8) -> &'static str {
    SEVERITY_LABELS[severity.min(MAX_SEVERITY) as usize]
}

/// Chinese label for a severity grade, as shown on the companion app.
pub fn severity_label_zh(severity: u8) -> &'static str {
    SEVERITY_LABELS_ZH[severity.min(MAX_SEVERITY) as usize]
}

/// Evaluates the detection criteria. Pure: statistics are the caller's job.
///
/// An RMS above `rms_max` marks the frame out of range and skips the
/// criteria entirely.
///
/// # Arguments
/// * `spectrum` - Band analysis of the frame
/// * `samples` - The DC-removed, unwindowed frame
/// * `config` - Threshold snapshot for this cycle
/// * `timestamp_ms` - Clock time stamped on the result
///
/// # Returns
/// * `DetectionResult` - Criteria outcome, severity, and the spectrum figures
pub fn evaluate(
    spectrum: &SpectrumResult,
    samples: &[f32],
    config: &RuntimeConfig,
    timestamp_ms: u64,
) -> DetectionResult {
    let half = (samples.len() / 2).max(1);
    let peak_ratio = if spectrum.avg_power > 0.0 {
        spectrum.peak_power / spectrum.avg_power
    } else {
        0.0
    };

    let mut result = DetectionResult {
        valid: true,
        frequency: spectrum.peak_frequency,
        amplitude: spectrum.band_power / half as f32,
        rms_amplitude: rms(samples),
        power: spectrum.peak_power,
        peak_ratio,
        timestamp_ms,
        spectrum: *spectrum,
        ..DetectionResult::default()
    };

    if result.rms_amplitude > config.rms_max {
        result.out_of_range = true;
        result.valid = false;
        return result;
    }

    let criteria = check_criteria(spectrum, result.rms_amplitude, config);
    result.criteria = Some(criteria);
    result.detected = criteria.all();
    if result.detected {
        result.severity = calculate_severity(result.rms_amplitude, &config.severity_thresholds);
    }
    result
}

/// The three detection checks, given an RMS amplitude not above `rms_max`.
pub fn check_criteria(spectrum: &SpectrumResult, rms_amplitude: f32, config: &RuntimeConfig) -> Criteria {
    Criteria {
        power_ok: spectrum.band_power > config.power_threshold,
        freq_ok: spectrum.peak_frequency >= config.freq_min
            && spectrum.peak_frequency <= config.freq_max,
        rms_ok: rms_amplitude >= config.rms_min,
    }
}
