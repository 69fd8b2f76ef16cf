//! The dispatcher task: sole owner of the lock state machine.
//!
//! Two inbound queues feed it. Control messages (lifecycle, policy, taps,
//! pushed foreground events, queries) are unbounded and always drained first;
//! poll ticks sit in a one-slot queue behind them. A screen-off therefore never
//! waits behind a stale tick.
//!
//! Each input is handled inside a panic boundary: a collaborator that panics
//! costs one directive, not the dispatcher.

use crate::presenter::PresenterRef;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use veil_context::{AppId, PauseHandle};
use veil_events::{CoverChangedEvent, EngineEvent, EventBusRef};
use veil_lock::{Directive, LockState, LockStateMachine};

/// Message on the control queue.
#[derive(Debug)]
pub(crate) enum Control {
    Event(EngineEvent),
    QueryState(oneshot::Sender<LockState>),
    Shutdown,
}

pub(crate) struct Dispatcher {
    machine: LockStateMachine,
    presenter: PresenterRef,
    bus: EventBusRef,
    poller: PauseHandle,
    /// Set once teardown begins; queued inputs are dropped from then on.
    closing: Arc<AtomicBool>,
    screen_on: bool,
    /// Last cover state reported on the bus.
    reported: Option<AppId>,
}

impl Dispatcher {
    pub(crate) fn new(
        machine: LockStateMachine,
        presenter: PresenterRef,
        bus: EventBusRef,
        poller: PauseHandle,
        closing: Arc<AtomicBool>,
    ) -> Self {
        Self {
            machine,
            presenter,
            bus,
            poller,
            closing,
            screen_on: true,
            reported: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<Control>,
        mut ticks: mpsc::Receiver<Option<AppId>>,
    ) {
        tracing::info!("lock dispatcher started");

        loop {
            let event = tokio::select! {
                biased;
                msg = control.recv() => match msg {
                    Some(Control::Event(event)) => event,
                    Some(Control::QueryState(reply)) => {
                        let _ = reply.send(self.machine.state().clone());
                        continue;
                    }
                    Some(Control::Shutdown) => break,
                    None => {
                        tracing::debug!("control channel closed");
                        break;
                    }
                },
                Some(app) = ticks.recv() => EngineEvent::ForegroundObserved { app },
            };

            if self.closing.load(Ordering::Acquire) {
                tracing::trace!(?event, "engine closing, input dropped");
                continue;
            }
            self.guarded("input", |d| d.handle(event, &mut ticks));
        }

        // Unconditional: whatever the presenter believes, the cover goes away.
        self.guarded("final hide", |d| {
            d.apply(&Directive::Hide);
            d.report(None);
        });
        tracing::info!("lock dispatcher stopped");
    }

    fn guarded(&mut self, what: &'static str, f: impl FnOnce(&mut Self)) {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            let message = panic_message(&*panic);
            tracing::error!(what, panic = message, "lock dispatcher handler panicked");
        }
    }

    fn handle(&mut self, event: EngineEvent, ticks: &mut mpsc::Receiver<Option<AppId>>) {
        let directive = match event {
            EngineEvent::ForegroundObserved { app } => {
                if !self.screen_on {
                    tracing::trace!("screen off, ignoring poll tick");
                    return;
                }
                self.machine.on_foreground_observed(app)
            }
            EngineEvent::ForegroundPushed { app } => {
                if !self.screen_on {
                    tracing::trace!(app = %app, "screen off, ignoring pushed foreground");
                    return;
                }
                self.machine.on_foreground_observed(Some(app))
            }
            EngineEvent::Tap { code } => self.machine.on_tap(code),
            EngineEvent::ScreenOff => {
                self.screen_on = false;
                self.poller.pause();
                let mut dropped = 0usize;
                while ticks.try_recv().is_ok() {
                    dropped += 1;
                }
                tracing::debug!(dropped, "screen off");
                Some(self.machine.on_screen_off())
            }
            EngineEvent::ScreenOn => {
                self.screen_on = true;
                self.poller.resume();
                tracing::debug!("screen on");
                self.machine.on_screen_on()
            }
            EngineEvent::PolicyChanged { policy } => Some(self.machine.on_policy_changed(policy)),
        };

        if let Some(directive) = directive {
            self.apply(&directive);
        }

        let shown = match self.machine.state() {
            LockState::Locked(app) => Some(app.clone()),
            _ => None,
        };
        self.report(shown);
    }

    fn apply(&self, directive: &Directive) {
        if let Err(e) = self.presenter.apply(directive) {
            tracing::warn!(error = %e, ?directive, "cover presenter failed");
        }
    }

    /// Emit `cover:changed` when visibility or the covered app changes.
    fn report(&mut self, shown: Option<AppId>) {
        if self.reported == shown {
            return;
        }
        let event = CoverChangedEvent {
            shown: shown.is_some(),
            app: shown.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };
        self.reported = shown;
        self.bus.emit_cover_changed(&event);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
