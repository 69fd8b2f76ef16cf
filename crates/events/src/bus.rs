//! Outbound notification seam.
//!
//! Cover visibility and protection status leave the engine as named JSON
//! payloads, so a UI bridge can forward them verbatim. The typed helpers on
//! `dyn EventBus` keep topic names and payload shapes in one place.

use crate::{event_names, CoverChangedEvent, ProtectionStatusEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sink for outbound events.
pub trait EventBus: Send + Sync {
    /// Deliver one payload under `topic` (see [`event_names`]).
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

impl dyn EventBus {
    pub fn emit_cover_changed(&self, event: &CoverChangedEvent) {
        self.emit_json(event_names::COVER_CHANGED, event);
    }

    pub fn emit_protection_status(&self, active: bool) {
        self.emit_json(
            event_names::PROTECTION_STATUS,
            &ProtectionStatusEvent { active },
        );
    }

    fn emit_json<T: Serialize>(&self, topic: &'static str, event: &T) {
        match serde_json::to_value(event) {
            Ok(payload) => self.emit(topic, payload),
            Err(e) => tracing::warn!(topic, error = %e, "failed to serialize event"),
        }
    }
}

/// Bus that keeps every payload, for tests and diagnostics.
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<(String, serde_json::Value)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw payloads emitted under `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<serde_json::Value> {
        self.guard()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// `cover:changed` events, oldest first.
    pub fn cover_changes(&self) -> Vec<CoverChangedEvent> {
        self.decoded(event_names::COVER_CHANGED)
    }

    /// `protection:status` values, oldest first.
    pub fn status_changes(&self) -> Vec<bool> {
        self.decoded::<ProtectionStatusEvent>(event_names::PROTECTION_STATUS)
            .into_iter()
            .map(|e| e.active)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn decoded<T: DeserializeOwned>(&self, topic: &str) -> Vec<T> {
        self.payloads(topic)
            .into_iter()
            .filter_map(|payload| serde_json::from_value(payload).ok())
            .collect()
    }
}

impl EventBus for RecordingEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.guard().push((topic.to_string(), payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_context::AppId;

    #[test]
    fn test_typed_helpers_use_fixed_topics() {
        let recorder = Arc::new(RecordingEventBus::new());
        let bus: EventBusRef = recorder.clone();

        bus.emit_cover_changed(&CoverChangedEvent {
            shown: true,
            app: Some(AppId::from("com.bank")),
            timestamp_ms: 42,
        });
        bus.emit_protection_status(false);

        assert_eq!(recorder.len(), 2);
        assert_eq!(
            recorder.payloads("cover:changed")[0],
            serde_json::json!({"shown": true, "app": "com.bank", "timestamp_ms": 42})
        );
        assert_eq!(
            recorder.payloads("protection:status")[0],
            serde_json::json!({"active": false})
        );
    }

    #[test]
    fn test_typed_readback_skips_foreign_payloads() {
        let recorder = RecordingEventBus::new();
        recorder.emit(event_names::COVER_CHANGED, serde_json::json!({"unexpected": 1}));
        recorder.emit(event_names::PROTECTION_STATUS, serde_json::json!({"active": true}));
        recorder.emit("other:topic", serde_json::json!({"active": false}));

        assert!(recorder.cover_changes().is_empty());
        assert_eq!(recorder.status_changes(), vec![true]);
    }
}
