//! Provider traits for foreground detection.
//!
//! These traits abstract platform-specific implementations,
//! allowing the reconciliation logic to remain pure and testable.

use crate::error::{ContextError, Result};
use crate::state::{AppId, PermissionReport, UsageEvent, UsageStat};

/// Source of the application currently owning the foreground.
///
/// Implementations may block briefly; the poller runs them on the blocking pool
/// and bounds each call with a timeout.
pub trait ForegroundSource: Send + Sync {
    /// Best-effort current foreground app, or `None` if it cannot be resolved.
    fn current_foreground(&self) -> Option<AppId>;
}

/// Raw access to the platform usage log.
pub trait UsageLog: Send + Sync {
    /// Events recorded in `[begin_ms, end_ms]`, in log order.
    fn query_events(&self, begin_ms: i64, end_ms: i64) -> Result<Vec<UsageEvent>>;

    /// Per-app usage aggregated over `[begin_ms, end_ms]`.
    fn query_usage_stats(&self, begin_ms: i64, end_ms: i64) -> Result<Vec<UsageStat>>;

    /// Whether the log may be read at all.
    fn has_usage_access(&self) -> bool {
        true
    }
}

/// Reports which platform permissions are granted.
pub trait PermissionProbe: Send + Sync {
    fn check(&self) -> PermissionReport;
}

/// Enumerates home-screen / launcher applications.
pub trait LauncherQuery: Send + Sync {
    fn launcher_ids(&self) -> Vec<AppId>;
}

/// Null implementation for testing or unsupported platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvider;

impl NullProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ForegroundSource for NullProvider {
    fn current_foreground(&self) -> Option<AppId> {
        None
    }
}

impl UsageLog for NullProvider {
    fn query_events(&self, _begin_ms: i64, _end_ms: i64) -> Result<Vec<UsageEvent>> {
        Err(ContextError::Unsupported)
    }

    fn query_usage_stats(&self, _begin_ms: i64, _end_ms: i64) -> Result<Vec<UsageStat>> {
        Err(ContextError::Unsupported)
    }

    fn has_usage_access(&self) -> bool {
        false
    }
}

impl PermissionProbe for NullProvider {
    fn check(&self) -> PermissionReport {
        PermissionReport::default()
    }
}

impl LauncherQuery for NullProvider {
    fn launcher_ids(&self) -> Vec<AppId> {
        Vec::new()
    }
}

/// Fixed permission report, for hosts that manage permissions themselves.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions(pub PermissionReport);

impl PermissionProbe for StaticPermissions {
    fn check(&self) -> PermissionReport {
        self.0
    }
}

/// Fixed launcher list.
#[derive(Debug, Clone, Default)]
pub struct StaticLaunchers(pub Vec<AppId>);

impl LauncherQuery for StaticLaunchers {
    fn launcher_ids(&self) -> Vec<AppId> {
        self.0.clone()
    }
}
