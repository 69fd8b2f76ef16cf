//! Foreground detection data structures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an installed application (bundle ID / package name).
///
/// Equality is exact-string; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AppId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of entry in the OS usage-event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEventKind {
    /// Application moved to the foreground.
    MoveToForeground,
    /// Activity resumed (newer platforms report this instead of `MoveToForeground`).
    ActivityResumed,
    /// Application moved to the background.
    MoveToBackground,
    /// Anything else the platform reports (configuration changes, shortcuts, ...).
    Other,
}

impl UsageEventKind {
    /// Whether this event means the app took the foreground.
    pub fn is_foreground(self) -> bool {
        matches!(self, Self::MoveToForeground | Self::ActivityResumed)
    }
}

/// A single usage-log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub app: AppId,
    pub kind: UsageEventKind,
    /// Milliseconds since epoch.
    pub timestamp_ms: i64,
}

impl UsageEvent {
    pub fn new(app: impl Into<AppId>, kind: UsageEventKind, timestamp_ms: i64) -> Self {
        Self {
            app: app.into(),
            kind,
            timestamp_ms,
        }
    }
}

/// Aggregated usage statistics for one app over a query window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStat {
    pub app: AppId,
    /// Milliseconds since epoch of the last time the app was used.
    pub last_time_used_ms: i64,
}

impl UsageStat {
    pub fn new(app: impl Into<AppId>, last_time_used_ms: i64) -> Self {
        Self {
            app: app.into(),
            last_time_used_ms,
        }
    }
}

/// Which platform permissions the engine depends on are currently granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionReport {
    /// Permission to draw the cover surface over other apps.
    pub overlay: bool,
    /// Permission to read the usage-event log.
    pub usage_access: bool,
    /// Permission to post the persistent service notification.
    pub notifications: bool,
    /// Accessibility service enabled (push foreground events).
    pub accessibility: bool,
}

impl PermissionReport {
    /// Everything granted.
    pub fn all_granted() -> Self {
        Self {
            overlay: true,
            usage_access: true,
            notifications: true,
            accessibility: true,
        }
    }

    /// The permissions without which protection cannot run.
    ///
    /// Accessibility is optional: it only adds push events on top of polling.
    pub fn can_protect(&self) -> bool {
        self.overlay && self.usage_access && self.notifications
    }
}
