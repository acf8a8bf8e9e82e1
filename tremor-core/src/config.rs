//! # Runtime Threshold Configuration
//!
//! The detection thresholds are tunable at runtime. A [`ConfigStore`] holds
//! the active [`RuntimeConfig`]; replacements are validated and applied
//! wholesale, never merged. The store is shared between the analysis path
//! and whatever delivers new thresholds, so access goes through a
//! single-writer/multi-reader lock and every read is a consistent snapshot.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, warn};

// Compiled-in defaults, calibrated on the wrist prototype.
// At rest the RMS stays below 0.1 g; a light tremor sits around 2.5-3.0 g,
// moderate 3.0-4.0 g, severe 4.0-5.0 g.

/// Lower bound of the tremor band (Hz).
pub const DEFAULT_FREQ_MIN: f32 = 4.0;
/// Upper bound of the tremor band (Hz).
pub const DEFAULT_FREQ_MAX: f32 = 6.0;
/// Minimum band power for a detection.
pub const DEFAULT_POWER_THRESHOLD: f32 = 0.5;
/// Below this RMS (g) nothing counts as tremor.
pub const DEFAULT_RMS_MIN: f32 = 2.5;
/// Above this RMS (g) the cycle is discarded as out of range.
pub const DEFAULT_RMS_MAX: f32 = 5.0;
/// Severity band edges (g): none < 2.5 <= slight < 3.0 <= mild < 3.5 <= moderate < 4.0 <= severe.
pub const DEFAULT_SEVERITY_THRESHOLDS: [f32; 4] = [2.5, 3.0, 3.5, 4.0];

/// A rejected configuration candidate, naming the violated invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("rms_min must be positive, got {0}")]
    RmsMinNotPositive(f32),

    #[error("rms_max ({max}) must exceed rms_min ({min})")]
    RmsRangeInverted { min: f32, max: f32 },

    #[error("freq_min must be positive, got {0}")]
    FreqMinNotPositive(f32),

    #[error("freq_max ({max}) must exceed freq_min ({min})")]
    FreqRangeInverted { min: f32, max: f32 },

    #[error("power_threshold must be positive, got {0}")]
    PowerThresholdNotPositive(f32),

    #[error("threshold document is malformed: {0}")]
    Malformed(String),
}

/// The active detection threshold set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub rms_min: f32,
    pub rms_max: f32,
    pub power_threshold: f32,
    pub freq_min: f32,
    pub freq_max: f32,
    /// Ascending RMS band edges for severity grades 1-4.
    pub severity_thresholds: [f32; 4],
    pub version: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rms_min: DEFAULT_RMS_MIN,
            rms_max: DEFAULT_RMS_MAX,
            power_threshold: DEFAULT_POWER_THRESHOLD,
            freq_min: DEFAULT_FREQ_MIN,
            freq_max: DEFAULT_FREQ_MAX,
            severity_thresholds: DEFAULT_SEVERITY_THRESHOLDS,
            version: 0,
        }
    }
}

impl RuntimeConfig {
    /// Checks the scalar invariants. Comparisons are written so that NaN fails.
    ///
    /// Severity thresholds are not checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rms_min > 0.0) {
            return Err(ConfigError::RmsMinNotPositive(self.rms_min));
        }
        if !(self.rms_max > self.rms_min) {
            return Err(ConfigError::RmsRangeInverted { min: self.rms_min, max: self.rms_max });
        }
        if !(self.freq_min > 0.0) {
            return Err(ConfigError::FreqMinNotPositive(self.freq_min));
        }
        if !(self.freq_max > self.freq_min) {
            return Err(ConfigError::FreqRangeInverted { min: self.freq_min, max: self.freq_max });
        }
        if !(self.power_threshold > 0.0) {
            return Err(ConfigError::PowerThresholdNotPositive(self.power_threshold));
        }
        Ok(())
    }
}

/// Result of a version-gated update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The candidate replaced the active config.
    Applied,
    /// The candidate's version was not newer; nothing changed.
    Stale { current: u32, offered: u32 },
}

/// Holder of the active [`RuntimeConfig`].
#[derive(Debug, Default)]
pub struct ConfigStore {
    active: RwLock<RuntimeConfig>,
}

impl ConfigStore {
    pub fn new(initial: RuntimeConfig) -> Self {
        Self { active: RwLock::new(initial) }
    }

    /// Snapshot of the active config.
    pub fn read(&self) -> RuntimeConfig {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates `candidate` and, only if it passes, replaces the active
    /// config. The version is taken as-is; ordering is the caller's concern.
    pub fn update(&self, candidate: RuntimeConfig) -> Result<(), ConfigError> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        Self::apply(&mut active, candidate)
    }

    /// Applies `candidate` only if its version is strictly newer than the
    /// active one. Check and replacement happen under one write guard.
    pub fn update_if_newer(&self, candidate: RuntimeConfig) -> Result<UpdateOutcome, ConfigError> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if candidate.version <= active.version {
            return Ok(UpdateOutcome::Stale { current: active.version, offered: candidate.version });
        }
        Self::apply(&mut active, candidate)?;
        Ok(UpdateOutcome::Applied)
    }

    /// Restores the compiled-in defaults.
    pub fn reset_to_defaults(&self) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = RuntimeConfig::default();
    }

    fn apply(active: &mut RuntimeConfig, candidate: RuntimeConfig) -> Result<(), ConfigError> {
        if let Err(e) = candidate.validate() {
            warn!(version = candidate.version, error = %e, "rejected threshold update");
            return Err(e);
        }
        info!(
            from = active.version,
            to = candidate.version,
            rms_min = candidate.rms_min,
            rms_max = candidate.rms_max,
            power_threshold = candidate.power_threshold,
            freq_min = candidate.freq_min,
            freq_max = candidate.freq_max,
            "applied threshold update"
        );
        *active = candidate;
        Ok(())
    }
}

// --- Remote threshold document ---

fn default_updated_at() -> String {
    "unknown".to_string()
}

/// Threshold document as served by the configuration endpoint.
///
/// ```json
/// { "version": 3, "updated_at": "...", "params": { "rms_min": 2.5, ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default = "default_updated_at")]
    pub updated_at: String,
    pub params: RemoteParams,
}

/// Threshold values of a [`RemoteConfig`]; any missing field keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteParams {
    pub rms_min: f32,
    pub rms_max: f32,
    pub power_threshold: f32,
    pub freq_min: f32,
    pub freq_max: f32,
    pub severity_thresholds: Vec<f32>,
}

impl Default for RemoteParams {
    fn default() -> Self {
        Self {
            rms_min: DEFAULT_RMS_MIN,
            rms_max: DEFAULT_RMS_MAX,
            power_threshold: DEFAULT_POWER_THRESHOLD,
            freq_min: DEFAULT_FREQ_MIN,
            freq_max: DEFAULT_FREQ_MAX,
            severity_thresholds: DEFAULT_SEVERITY_THRESHOLDS.to_vec(),
        }
    }
}

/// Just the version field of a threshold document.
#[derive(Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: u32,
}

impl RemoteConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Reads only the document version, so a stale document can be skipped
    /// before its `params` are looked at. A missing version reads as 0.
    pub fn peek_version(text: &str) -> Result<u32, ConfigError> {
        serde_json::from_str::<VersionHeader>(text)
            .map(|header| header.version)
            .map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Builds an update candidate. Fewer than four severity thresholds fall
    /// back to all four defaults; extra entries are ignored.
    pub fn into_config(self) -> RuntimeConfig {
        let severity_thresholds = match self.params.severity_thresholds.as_slice() {
            [t0, t1, t2, t3, ..] => [*t0, *t1, *t2, *t3],
            _ => DEFAULT_SEVERITY_THRESHOLDS,
        };
        RuntimeConfig {
            rms_min: self.params.rms_min,
            rms_max: self.params.rms_max,
            power_threshold: self.params.power_threshold,
            freq_min: self.params.freq_min,
            freq_max: self.params.freq_max,
            severity_thresholds,
            version: self.version,
        }
    }
}
