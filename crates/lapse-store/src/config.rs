use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Default storage root.
pub const DEFAULT_ROOT: &str = "./storage";
/// Lifetime applied when a caller supplies no TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// Period between background reclamation sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Store configuration.
///
/// Durations accept human-readable strings (`"1h"`, `"90s"`) in TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding `metadata/` and `files/`.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// TTL used when a create request omits one.
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub default_ttl: Duration,

    /// Reclamation period.
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    pub sweep_interval: Duration,
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

fn default_ttl() -> Duration {
    DEFAULT_TTL
}

fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Config rooted at `root` with default timings.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Reject zero durations.
    pub fn validate(&self) -> StoreResult<()> {
        if self.default_ttl.is_zero() {
            return Err(StoreError::Config("default_ttl must be positive".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(StoreError::Config("sweep_interval must be positive".into()));
        }
        Ok(())
    }
}
