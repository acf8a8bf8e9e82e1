//! Running statistics across analysis cycles.

use serde::{Deserialize, Serialize};

use crate::detection::DetectionResult;

/// Aggregate counters since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Every completed cycle, including out-of-range ones.
    pub total_analyses: u64,
    pub tremor_count: u64,
    /// Mean peak frequency over detections (Hz).
    pub avg_frequency: f32,
    /// Mean RMS amplitude over detections (g).
    pub avg_amplitude: f32,
    pub max_severity: u8,
    pub start_time_ms: u64,
}

impl Statistics {
    /// Share of cycles that detected a tremor, 0.0 before the first cycle.
    pub fn detection_rate(&self) -> f32 {
        if self.total_analyses == 0 {
            0.0
        } else {
            self.tremor_count as f32 / self.total_analyses as f32
        }
    }
}

/// Owns the [`Statistics`] of one detector.
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    stats: Statistics,
}

impl StatisticsAggregator {
    pub fn new(start_time_ms: u64) -> Self {
        Self {
            stats: Statistics { start_time_ms, ..Statistics::default() },
        }
    }

    /// Folds one completed cycle into the aggregate.
    pub fn record(&mut self, result: &DetectionResult) {
        self.stats.total_analyses += 1;
        if !result.detected {
            return;
        }

        self.stats.tremor_count += 1;
        let n = self.stats.tremor_count as f32;
        self.stats.avg_frequency = (self.stats.avg_frequency * (n - 1.0) + result.frequency) / n;
        self.stats.avg_amplitude = (self.stats.avg_amplitude * (n - 1.0) + result.rms_amplitude) / n;
        self.stats.max_severity = self.stats.max_severity.max(result.severity);
    }

    pub fn reset(&mut self, start_time_ms: u64) {
        self.stats = Statistics { start_time_ms, ..Statistics::default() };
    }

    pub fn snapshot(&self) -> Statistics {
        self.stats
    }
}
