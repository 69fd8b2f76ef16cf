//! App lock engine for veil.
//!
//! Wires the pure lock state machine to its surroundings: a foreground
//! poller, a policy store, a cover presenter and an outbound event bus.
//!
//! # Architecture
//!
//! ```text
//!  ForegroundPoller ──ticks (1 slot)──┐
//!                                      ▼
//!  EngineHandle ──control (FIFO)──► Dispatcher ──Directive──► CoverPresenter
//!  PolicyStore listener ──────────────┘   │
//!                                         └──cover:changed──► EventBus
//! ```
//!
//! [`ProtectionService`] starts and stops one [`ProtectionEngine`] at a time
//! and exposes the policy commands.

mod config;
mod dispatcher;
mod engine;
mod error;
mod presenter;
mod service;

pub use config::EngineConfig;
pub use engine::{EngineDeps, EngineHandle, ProtectionEngine};
pub use error::{EngineError, PresenterError, Result};
pub use presenter::{CoverPresenter, LogPresenter, PresenterRef, RecordingPresenter};
pub use service::{PlatformServices, ProtectionService};
