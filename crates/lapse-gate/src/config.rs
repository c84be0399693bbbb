use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default freshness window, either side of the current time.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Configuration for the authorization gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// How far a request timestamp may lie from the current time, in either
    /// direction, and still be accepted.
    #[serde(with = "humantime_serde", default = "default_tolerance")]
    pub tolerance: Duration,
}

fn default_tolerance() -> Duration {
    DEFAULT_TOLERANCE
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl GateConfig {
    /// A config with the given tolerance.
    pub fn with_tolerance(tolerance: Duration) -> Self {
        Self { tolerance }
    }
}
