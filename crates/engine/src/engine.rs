//! A running protection engine and the handle collaborators use to feed it.

use crate::config::EngineConfig;
use crate::dispatcher::{Control, Dispatcher};
use crate::error::{EngineError, Result};
use crate::presenter::PresenterRef;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use veil_context::{AppId, ForegroundCallback, ForegroundPoller, ForegroundSource};
use veil_events::{EngineEvent, EventBusRef};
use veil_lock::{LockState, LockStateMachine, PolicySnapshot, Quadrant};
use veil_storage::{ListenerId, PolicyListener, PolicyStore};

/// Collaborators a protection engine runs against.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<PolicyStore>,
    pub source: Arc<dyn ForegroundSource>,
    pub presenter: PresenterRef,
    pub bus: EventBusRef,
    /// Launcher / home-screen apps, resolved once at start.
    pub launchers: Vec<AppId>,
}

/// Cheap, cloneable sender for engine inputs.
///
/// Every method is fire-and-forget and returns whether the input was queued.
/// Once teardown has begun, inputs are refused.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    control: mpsc::UnboundedSender<Control>,
    closing: Arc<AtomicBool>,
}

impl EngineHandle {
    fn send(&self, event: EngineEvent) -> bool {
        if self.closing.load(Ordering::Acquire) {
            tracing::debug!("engine closing, input refused");
            return false;
        }
        if self.control.send(Control::Event(event)).is_err() {
            tracing::debug!("engine stopped, input dropped");
            return false;
        }
        true
    }

    pub fn screen_off(&self) -> bool {
        self.send(EngineEvent::ScreenOff)
    }

    pub fn screen_on(&self) -> bool {
        self.send(EngineEvent::ScreenOn)
    }

    /// Window-change notification from an accessibility-style source.
    pub fn push_foreground(&self, app: AppId) -> bool {
        self.send(EngineEvent::ForegroundPushed { app })
    }

    pub fn tap(&self, code: u8) -> bool {
        self.send(EngineEvent::Tap { code })
    }

    /// Tap at `(x, y)` on a `width` x `height` cover.
    pub fn touch(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        self.tap(Quadrant::from_touch(x, y, width, height).code())
    }

    pub fn policy_changed(&self, policy: PolicySnapshot) -> bool {
        self.send(EngineEvent::PolicyChanged { policy })
    }

    /// Current lock state, answered after every input queued before it.
    pub async fn state(&self) -> Result<LockState> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(Control::QueryState(reply))
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn is_cover_shown(&self) -> bool {
        self.state().await.is_ok_and(|s| s.is_locked())
    }

    fn close(&self) {
        self.closing.store(true, Ordering::Release);
    }
}

/// One protection session: dispatcher task, poller and policy subscription.
pub struct ProtectionEngine {
    handle: EngineHandle,
    poller: ForegroundPoller,
    store: Arc<PolicyStore>,
    listener: Option<ListenerId>,
    dispatcher: Option<JoinHandle<()>>,
}

impl ProtectionEngine {
    /// Start an engine. Must be called from within a tokio runtime.
    pub fn start(config: &EngineConfig, deps: EngineDeps) -> Result<Self> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::channel::<Option<AppId>>(1);
        let closing = Arc::new(AtomicBool::new(false));
        let handle = EngineHandle {
            control: control_tx,
            closing: Arc::clone(&closing),
        };

        // Subscribe before reading the policy so no save falls in between.
        let listener_handle = handle.clone();
        let listener: PolicyListener = Arc::new(move |policy: &PolicySnapshot| {
            listener_handle.policy_changed(policy.clone());
        });
        let listener = deps.store.subscribe(listener);

        let policy = match deps.store.snapshot() {
            Ok(policy) => policy,
            Err(e) => {
                deps.store.unsubscribe(listener);
                return Err(e.into());
            }
        };
        tracing::info!(
            protected = policy.protected.len(),
            launchers = deps.launchers.len(),
            "starting protection engine"
        );

        let machine = LockStateMachine::new(config.self_id.clone(), deps.launchers, policy);
        let mut poller = ForegroundPoller::new();
        let dispatcher = Dispatcher::new(
            machine,
            deps.presenter,
            deps.bus,
            poller.pause_handle(),
            closing,
        );
        let task = tokio::spawn(dispatcher.run(control_rx, tick_rx));

        let on_tick: ForegroundCallback = Arc::new(move |app| {
            if tick_tx.try_send(app).is_err() {
                tracing::trace!("tick queue full, dropping tick");
            }
        });
        poller.start(deps.source, on_tick, config.poller_options());

        Ok(Self {
            handle,
            poller,
            store: deps.store,
            listener: Some(listener),
            dispatcher: Some(task),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop everything; the cover is hidden once more on the way out and no
    /// directive follows.
    pub async fn shutdown(mut self) -> Result<()> {
        // Inputs already queued are dropped by the dispatcher from here on.
        self.handle.close();
        if let Some(id) = self.listener.take() {
            self.store.unsubscribe(id);
        }
        self.poller.stop().await;
        let _ = self.handle.control.send(Control::Shutdown);

        if let Some(task) = self.dispatcher.take() {
            task.await?;
        }
        tracing::info!("protection engine stopped");
        Ok(())
    }
}

impl Drop for ProtectionEngine {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(id) = self.listener.take() {
            self.store.unsubscribe(id);
        }
        if self.dispatcher.is_some() {
            let _ = self.handle.control.send(Control::Shutdown);
        }
    }
}
