//! Shared event contracts for veil.
//!
//! Two directions:
//! - [`EngineEvent`]: everything that flows *into* the lock engine, delivered
//!   through one ordered channel.
//! - Outbound DTOs ([`CoverChangedEvent`], [`ProtectionStatusEvent`]) emitted
//!   on an [`EventBus`] for UI bridges and logs.

mod bus;

pub use bus::{EventBus, EventBusRef, RecordingEventBus};

use serde::{Deserialize, Serialize};
use veil_context::AppId;
use veil_lock::PolicySnapshot;

/// Input to the lock engine.
///
/// Producers: foreground poller, accessibility-style push source, cover
/// presenter (taps), platform lifecycle hooks, policy store listeners.
/// Consumer: the engine dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Result of a poll tick; `None` when the foreground could not be resolved.
    ForegroundObserved { app: Option<AppId> },
    /// Window-change notification pushed by the platform.
    ForegroundPushed { app: AppId },
    /// Raw tap code from the cover surface.
    Tap { code: u8 },
    ScreenOff,
    ScreenOn,
    PolicyChanged { policy: PolicySnapshot },
}

/// Event emitted when the cover visibility or its target app changes.
///
/// Producers: engine dispatcher
/// Consumers: UI bridge, logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverChangedEvent {
    /// Whether the cover is now shown.
    pub shown: bool,
    /// App the cover is shown for.
    #[serde(default)]
    pub app: Option<AppId>,
    /// Timestamp in milliseconds since epoch.
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Event emitted when protection is enabled or disabled.
///
/// Producers: protection service
/// Consumers: UI bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionStatusEvent {
    pub active: bool,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Cover shown / hidden.
    pub const COVER_CHANGED: &str = "cover:changed";
    /// Protection enabled / disabled.
    pub const PROTECTION_STATUS: &str = "protection:status";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_wire_format() {
        let json = serde_json::to_string(&EngineEvent::Tap { code: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"tap","code":2}"#);

        let event: EngineEvent =
            serde_json::from_str(r#"{"type":"foreground_pushed","app":"com.chat"}"#).unwrap();
        assert_eq!(
            event,
            EngineEvent::ForegroundPushed {
                app: AppId::from("com.chat")
            }
        );
    }

    #[test]
    fn test_cover_changed_deserialize_minimal() {
        let event: CoverChangedEvent = serde_json::from_str(r#"{"shown": false}"#).unwrap();
        assert!(!event.shown);
        assert_eq!(event.app, None);
        assert_eq!(event.timestamp_ms, 0);
    }
}
