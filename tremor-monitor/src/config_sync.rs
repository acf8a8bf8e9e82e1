//! # Threshold Synchronization
//!
//! Pulls the threshold document from a JSON file (the local stand-in for the
//! configuration endpoint) and applies it when its version is newer than the
//! active one.

use std::fmt;
use std::path::Path;
use tremor_core::{ConfigError, ConfigStore, RemoteConfig, UpdateOutcome};
use tracing::{debug, info, warn};

/// Result of one synchronization attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Applied { version: u32 },
    NoUpdate { current: u32 },
    /// The document could not be read at all.
    Unavailable(String),
    ParseError(String),
    /// The document parsed but the thresholds failed validation.
    Rejected(ConfigError),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Applied { version } => write!(f, "applied v{version}"),
            SyncStatus::NoUpdate { current } => write!(f, "up to date (v{current})"),
            SyncStatus::Unavailable(e) => write!(f, "unavailable: {e}"),
            SyncStatus::ParseError(e) => write!(f, "parse error: {e}"),
            SyncStatus::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

/// Reads the threshold document at `path` and applies it if it is newer
/// than the active configuration.
///
/// The version is checked before the thresholds are parsed, so a stale
/// document reports [`SyncStatus::NoUpdate`] even when its `params` are
/// missing or malformed.
///
/// # Arguments
/// * `path` - Location of the JSON threshold document
/// * `store` - Store that receives the new thresholds
///
/// # Returns
/// * `SyncStatus` - What happened; the store is only modified on `Applied`
pub fn sync_from_file(path: &Path, store: &ConfigStore) -> SyncStatus {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "threshold document not readable");
            return SyncStatus::Unavailable(e.to_string());
        }
    };

    let version = match RemoteConfig::peek_version(&text) {
        Ok(version) => version,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "threshold document malformed");
            return SyncStatus::ParseError(e.to_string());
        }
    };
    let current = store.read().version;
    if version <= current {
        return SyncStatus::NoUpdate { current };
    }

    let remote = match RemoteConfig::from_json(&text) {
        Ok(remote) => remote,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "threshold document malformed");
            return SyncStatus::ParseError(e.to_string());
        }
    };

    debug!(version, updated_at = %remote.updated_at, "threshold document loaded");

    match store.update_if_newer(remote.into_config()) {
        Ok(UpdateOutcome::Applied) => {
            info!(version, "thresholds synchronized");
            SyncStatus::Applied { version }
        }
        Ok(UpdateOutcome::Stale { current, .. }) => SyncStatus::NoUpdate { current },
        Err(e) => SyncStatus::Rejected(e),
    }
}
