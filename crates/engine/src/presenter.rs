//! Cover surface seam.
//!
//! The engine only decides; a [`CoverPresenter`] owns the actual surface and
//! turns each [`Directive`] into a show or hide. Directives are re-asserted on
//! every tick, so implementations must treat repeats as no-ops.

use crate::error::PresenterError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use veil_context::AppId;
use veil_lock::Directive;

/// Shows and hides the opaque cover over a protected app.
pub trait CoverPresenter: Send + Sync {
    fn show(&self, app: &AppId) -> Result<(), PresenterError>;
    fn hide(&self) -> Result<(), PresenterError>;

    fn apply(&self, directive: &Directive) -> Result<(), PresenterError> {
        match directive {
            Directive::Show(app) => self.show(app),
            Directive::Hide => self.hide(),
        }
    }
}

/// Type alias for shared presenter reference.
pub type PresenterRef = Arc<dyn CoverPresenter>;

/// Presenter that only logs visibility changes.
///
/// Used by the headless daemon, where there is no surface to draw.
#[derive(Default)]
pub struct LogPresenter {
    shown: Mutex<Option<AppId>>,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown_for(&self) -> Option<AppId> {
        self.guard().clone()
    }

    fn guard(&self) -> MutexGuard<'_, Option<AppId>> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CoverPresenter for LogPresenter {
    fn show(&self, app: &AppId) -> Result<(), PresenterError> {
        let mut shown = self.guard();
        if shown.as_ref() != Some(app) {
            tracing::info!(app = %app, "cover shown");
            *shown = Some(app.clone());
        }
        Ok(())
    }

    fn hide(&self) -> Result<(), PresenterError> {
        if let Some(app) = self.guard().take() {
            tracing::info!(app = %app, "cover hidden");
        }
        Ok(())
    }
}

/// Presenter that records every directive; can be told to fail.
#[derive(Default)]
pub struct RecordingPresenter {
    calls: Mutex<Vec<Directive>>,
    failing: AtomicBool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Directive>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every directive received, failed ones included.
    pub fn calls(&self) -> Vec<Directive> {
        self.guard().clone()
    }

    pub fn last(&self) -> Option<Directive> {
        self.guard().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, directive: Directive) -> Result<(), PresenterError> {
        self.guard().push(directive);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PresenterError::Unavailable("surface detached".into()));
        }
        Ok(())
    }
}

impl CoverPresenter for RecordingPresenter {
    fn show(&self, app: &AppId) -> Result<(), PresenterError> {
        self.record(Directive::Show(app.clone()))
    }

    fn hide(&self) -> Result<(), PresenterError> {
        self.record(Directive::Hide)
    }
}
