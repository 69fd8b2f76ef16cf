//! Two-tier foreground reconciliation over the platform usage log.
//!
//! Tier 1 looks for the most recent foreground event in a short window.
//! Tier 2 runs only when tier 1 has nothing and picks the most recently used
//! app over a day-long window. This covers users who have stayed in one app
//! longer than the short window.

use crate::error::{ContextError, Result};
use crate::provider::{ForegroundSource, UsageLog};
use crate::state::{AppId, UsageEvent, UsageStat};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default look-back for the event tier (15 minutes).
pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Default look-back for the usage-stats tier (24 hours).
pub const DEFAULT_FALLBACK_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Query windows for the two lookup tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindows {
    pub recent: Duration,
    pub fallback: Duration,
}

impl Default for UsageWindows {
    fn default() -> Self {
        Self {
            recent: DEFAULT_RECENT_WINDOW,
            fallback: DEFAULT_FALLBACK_WINDOW,
        }
    }
}

/// Wall clock in milliseconds since epoch.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync + 'static>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Which tier resolved a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTier {
    RecentEvents,
    UsageStats,
}

/// [`ForegroundSource`] backed by a [`UsageLog`].
pub struct UsageForegroundSource<L> {
    log: L,
    windows: UsageWindows,
    clock: Clock,
    access_missing: AtomicBool,
}

impl<L: UsageLog> UsageForegroundSource<L> {
    pub fn new(log: L) -> Self {
        Self::with_windows(log, UsageWindows::default())
    }

    pub fn with_windows(log: L, windows: UsageWindows) -> Self {
        Self {
            log,
            windows,
            clock: system_clock(),
            access_missing: AtomicBool::new(false),
        }
    }

    /// Replace the wall clock (tests).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn windows(&self) -> UsageWindows {
        self.windows
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Resolve the foreground app and report which tier answered.
    ///
    /// Fails only when the log may not be read at all; per-tier query
    /// failures fall through to the next tier.
    pub fn lookup(&self) -> Result<Option<(AppId, LookupTier)>> {
        if !self.log.has_usage_access() {
            return Err(ContextError::UsageAccessDenied);
        }

        let now = (self.clock)();

        if let Some(app) = self.recent_foreground(now) {
            return Ok(Some((app, LookupTier::RecentEvents)));
        }

        Ok(self
            .most_recently_used(now)
            .map(|app| (app, LookupTier::UsageStats)))
    }

    fn recent_foreground(&self, now: i64) -> Option<AppId> {
        let begin = now.saturating_sub(window_ms(self.windows.recent));
        match self.log.query_events(begin, now) {
            Ok(events) => latest_foreground_event(&events),
            Err(e) => {
                tracing::debug!(error = %e, "usage event query failed");
                None
            }
        }
    }

    fn most_recently_used(&self, now: i64) -> Option<AppId> {
        let begin = now.saturating_sub(window_ms(self.windows.fallback));
        match self.log.query_usage_stats(begin, now) {
            Ok(stats) => most_recent_stat(&stats),
            Err(e) => {
                tracing::debug!(error = %e, "usage stats query failed");
                None
            }
        }
    }
}

impl<L: UsageLog> ForegroundSource for UsageForegroundSource<L> {
    fn current_foreground(&self) -> Option<AppId> {
        match self.lookup() {
            Ok(found) => {
                if self.access_missing.swap(false, Ordering::SeqCst) {
                    tracing::info!("usage access granted; foreground detection resumed");
                }
                let (app, tier) = found?;
                tracing::trace!(app = %app, ?tier, "foreground resolved");
                Some(app)
            }
            Err(e) => {
                // Warn once per loss of access, not on every tick.
                if !self.access_missing.swap(true, Ordering::SeqCst) {
                    tracing::warn!(error = %e, "cannot detect foreground app");
                }
                None
            }
        }
    }
}

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// Last foreground event with the greatest timestamp; later log entries win ties.
pub fn latest_foreground_event(events: &[UsageEvent]) -> Option<AppId> {
    let mut latest: Option<&UsageEvent> = None;
    for event in events.iter().filter(|e| e.kind.is_foreground()) {
        match latest {
            Some(current) if event.timestamp_ms < current.timestamp_ms => {}
            _ => latest = Some(event),
        }
    }
    latest.map(|e| e.app.clone())
}

/// App with the greatest `last_time_used_ms`; earlier entries win ties.
pub fn most_recent_stat(stats: &[UsageStat]) -> Option<AppId> {
    let mut best: Option<&UsageStat> = None;
    for stat in stats {
        match best {
            Some(current) if stat.last_time_used_ms <= current.last_time_used_ms => {}
            _ => best = Some(stat),
        }
    }
    best.map(|s| s.app.clone())
}
