//! Lock decision engine for veil.
//!
//! Decides, for each foreground observation, whether the cover must be shown,
//! and recognizes the secret tap sequence that grants a session-scoped
//! exemption.
//!
//! Everything here is synchronous and I/O free; the engine crate owns
//! scheduling and delivers events one at a time.

mod gesture;
mod machine;
mod pattern;
mod policy;

pub use gesture::{GestureRecognizer, TapBuffer};
pub use machine::{Directive, ForegroundSnapshot, LockState, LockStateMachine};
pub use pattern::{PatternError, Quadrant, SecretPattern};
pub use policy::{PolicySnapshot, ProtectedSet};
