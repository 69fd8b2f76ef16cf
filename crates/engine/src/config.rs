//! Engine configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use veil_context::{AppId, PollCadence, PollerOptions, UsageWindows};

/// Tunables for one protection engine.
///
/// Every field has a default, so a partial (or missing) config file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Our own identifier; never locked.
    pub self_id: AppId,
    pub cadence: PollCadence,
    pub query_timeout_ms: u64,
    /// Look-back for the usage-event tier.
    pub recent_window_secs: u64,
    /// Look-back for the usage-stats tier.
    pub fallback_window_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            self_id: AppId::from("sh.veil.app"),
            cadence: PollCadence::Responsive,
            query_timeout_ms: 80,
            recent_window_secs: 15 * 60,
            fallback_window_secs: 24 * 60 * 60,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn poller_options(&self) -> PollerOptions {
        PollerOptions::from_cadence(self.cadence, self.query_timeout())
    }

    pub fn usage_windows(&self) -> UsageWindows {
        UsageWindows {
            recent: Duration::from_secs(self.recent_window_secs),
            fallback: Duration::from_secs(self.fallback_window_secs),
        }
    }
}
