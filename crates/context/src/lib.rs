//! Foreground application detection for veil.
//!
//! This crate answers one question, repeatedly: which application owns the
//! foreground right now?
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Domain Layer                             │
//! │  state.rs    - AppId, usage events/stats, permission report │
//! │  provider.rs - Traits for platform access                   │
//! │  usage.rs    - Two-tier foreground reconciliation (pure)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                        │
//! │  platform/macos.rs - NSWorkspace-backed usage log           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Layer                          │
//! │  poller.rs - Pausable, bounded background polling           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use veil_context::{platform::PlatformProvider, ForegroundPoller, PollerOptions, UsageForegroundSource};
//! use std::sync::Arc;
//!
//! let source = Arc::new(UsageForegroundSource::new(PlatformProvider::new()));
//! let mut poller = ForegroundPoller::new();
//!
//! poller.start(source, Arc::new(|app| {
//!     println!("foreground: {:?}", app);
//! }), PollerOptions::default());
//! ```

mod error;
mod poller;
mod provider;
mod state;
mod usage;

pub mod platform;

// Re-export main types
pub use error::{ContextError, Result};
pub use poller::{
    ForegroundCallback, ForegroundPoller, PauseHandle, PollCadence, PollerOptions,
    DEFAULT_POLL_INTERVAL, DEFAULT_QUERY_TIMEOUT, DEGRADED_POLL_INTERVAL,
};
pub use provider::{
    ForegroundSource, LauncherQuery, NullProvider, PermissionProbe, StaticLaunchers,
    StaticPermissions, UsageLog,
};
pub use state::{AppId, PermissionReport, UsageEvent, UsageEventKind, UsageStat};
pub use usage::{
    latest_foreground_event, most_recent_stat, Clock, LookupTier, UsageForegroundSource,
    UsageWindows, DEFAULT_FALLBACK_WINDOW, DEFAULT_RECENT_WINDOW,
};
