//! Foreground poller - background task that samples the foreground app.

use crate::provider::ForegroundSource;
use crate::state::AppId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Coarser interval trading responsiveness for cost.
pub const DEGRADED_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for a single foreground query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(80);

/// Callback receiving one observation per tick.
pub type ForegroundCallback = Arc<dyn Fn(Option<AppId>) + Send + Sync + 'static>;

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollCadence {
    #[default]
    Responsive,
    Degraded,
}

impl PollCadence {
    pub fn interval(self) -> Duration {
        match self {
            PollCadence::Responsive => DEFAULT_POLL_INTERVAL,
            PollCadence::Degraded => DEGRADED_POLL_INTERVAL,
        }
    }
}

/// Timing options for [`ForegroundPoller`].
#[derive(Debug, Clone, Copy)]
pub struct PollerOptions {
    pub interval: Duration,
    pub query_timeout: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl PollerOptions {
    pub fn from_cadence(cadence: PollCadence, query_timeout: Duration) -> Self {
        Self {
            interval: cadence.interval(),
            query_timeout,
        }
    }
}

/// Periodic driver that queries a [`ForegroundSource`] and reports each result.
///
/// At most one query is in flight at a time. Pausing stops scheduling ticks;
/// stopping cancels the task and waits for it, so no callback fires after
/// [`ForegroundPoller::stop`] returns.
pub struct ForegroundPoller {
    cancel: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Cloneable pause switch for a running [`ForegroundPoller`].
#[derive(Debug, Clone)]
pub struct PauseHandle(Arc<watch::Sender<bool>>);

impl PauseHandle {
    pub fn pause(&self) {
        self.0.send_replace(true);
    }

    pub fn resume(&self) {
        self.0.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.0.borrow()
    }
}

impl Default for ForegroundPoller {
    fn default() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            cancel: CancellationToken::new(),
            paused: Arc::new(paused),
            handle: None,
        }
    }
}

impl ForegroundPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling. Must be called from within a tokio runtime.
    pub fn start(
        &mut self,
        source: Arc<dyn ForegroundSource>,
        callback: ForegroundCallback,
        options: PollerOptions,
    ) {
        if self.is_running() {
            tracing::warn!("ForegroundPoller already running");
            return;
        }

        // Fresh token per run so stop() + start() works.
        self.cancel = CancellationToken::new();
        let cancel = self.cancel.child_token();
        let paused = self.paused.subscribe();

        self.handle = Some(tokio::spawn(poll_loop(
            source, callback, options, cancel, paused,
        )));
    }

    /// Stop scheduling ticks until [`ForegroundPoller::resume`].
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Re-arm the cadence; the first tick fires immediately.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Pause switch that outlives borrows of the poller.
    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle(Arc::clone(&self.paused))
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "ForegroundPoller task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ForegroundPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    source: Arc<dyn ForegroundSource>,
    callback: ForegroundCallback,
    options: PollerOptions,
    cancel: CancellationToken,
    mut paused: watch::Receiver<bool>,
) {
    tracing::info!(interval = ?options.interval, "ForegroundPoller started");

    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pending: Option<JoinHandle<Option<AppId>>> = None;

    'poll: loop {
        if *paused.borrow_and_update() {
            tracing::debug!("ForegroundPoller paused");
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'poll,
                    changed = paused.changed() => {
                        if changed.is_err() {
                            break 'poll;
                        }
                        if !*paused.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("ForegroundPoller resumed");
            ticker.reset_immediately();
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let observed = query(&source, &mut pending, options.query_timeout).await;

        // Drop results that raced with a pause or shutdown.
        if cancel.is_cancelled() {
            break;
        }
        if *paused.borrow() {
            continue;
        }

        callback(observed);
    }

    tracing::info!("ForegroundPoller stopped");
}

/// Run one bounded query on the blocking pool.
///
/// A query that outlives its timeout keeps running; until it finishes no new
/// query is spawned and ticks report `None`.
async fn query(
    source: &Arc<dyn ForegroundSource>,
    pending: &mut Option<JoinHandle<Option<AppId>>>,
    timeout: Duration,
) -> Option<AppId> {
    let mut handle = match pending.take() {
        Some(handle) if !handle.is_finished() => {
            tracing::debug!("previous foreground query still running, skipping tick");
            *pending = Some(handle);
            return None;
        }
        _ => {
            let source = Arc::clone(source);
            tokio::task::spawn_blocking(move || source.current_foreground())
        }
    };

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(app)) => app,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "foreground query panicked");
            None
        }
        Err(_) => {
            tracing::warn!(?timeout, "foreground query timed out");
            *pending = Some(handle);
            None
        }
    }
}
