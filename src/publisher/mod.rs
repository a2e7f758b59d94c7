//! Driver-side publish loop.
//!
//! Turns a permission-gated, periodic device-location read into durable
//! state visible to subscribers: one repeating timer per running loop,
//! two independent writes per tick (state overwrite + log append), and
//! graceful degradation on failure. Write failures are contained to
//! their tick; a failed position sample terminates the loop instance.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::PublisherConfig;
use crate::interfaces::location::{LocationSource, PermissionGate, PermissionStatus};
use crate::interfaces::store::RendezvousStore;
use crate::model::{PositionLogEntry, PositionSample, PublisherMeta, PublisherState};

/// Result type for publisher operations.
pub type Result<T> = std::result::Result<T, PublishError>;

/// Errors surfaced synchronously to the caller of `start`.
///
/// Everything that goes wrong after the loop is running is contained to
/// the loop itself and observable through [`Publisher::watch_state`].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("location permission denied")]
    PermissionDenied,
}

/// Why a loop instance stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop` was called.
    Requested,
    /// The device could not produce a usable position reading.
    SampleFailure(String),
}

/// Observable lifecycle of the publish loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped(StopReason),
}

struct RunningLoop {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Periodic position broadcaster for one publisher identity.
///
/// At most one timer is ever active per instance: `start` while running
/// cancels and awaits the previous loop before spawning a new one.
pub struct Publisher {
    id: String,
    store: Arc<dyn RendezvousStore>,
    source: Arc<dyn LocationSource>,
    permissions: Arc<dyn PermissionGate>,
    interval: Duration,
    state: watch::Sender<LoopState>,
    running: Mutex<Option<RunningLoop>>,
}

impl Publisher {
    pub fn new(
        id: impl Into<String>,
        store: Arc<dyn RendezvousStore>,
        source: Arc<dyn LocationSource>,
        permissions: Arc<dyn PermissionGate>,
        config: &PublisherConfig,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            id: id.into(),
            store,
            source,
            permissions,
            interval: config.interval(),
            state,
            running: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current loop state.
    pub fn current_state(&self) -> LoopState {
        self.state.borrow().clone()
    }

    /// Watch loop state transitions.
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Start publishing with the given metadata.
    ///
    /// Requests foreground location permission first; denial fails the
    /// call and creates no timer. If a loop is already running it is
    /// cancelled and awaited before the new one starts, so two timers
    /// never coexist for one publisher.
    pub async fn start(&self, meta: PublisherMeta) -> Result<()> {
        if self.permissions.request_foreground_location().await == PermissionStatus::Denied {
            warn!(publisher_id = %self.id, "location permission denied");
            return Err(PublishError::PermissionDenied);
        }

        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            info!(publisher_id = %self.id, "restarting publish loop");
            let _ = previous.cancel.send(true);
            let _ = previous.task.await;
        }

        let (cancel, cancel_rx) = watch::channel(false);
        self.state.send_replace(LoopState::Running);

        let task = tokio::spawn(run_loop(
            self.id.clone(),
            self.store.clone(),
            self.source.clone(),
            meta,
            self.interval,
            cancel_rx,
            self.state.clone(),
        ));
        *running = Some(RunningLoop { cancel, task });

        info!(
            publisher_id = %self.id,
            interval_ms = self.interval.as_millis() as u64,
            "publish loop started"
        );
        Ok(())
    }

    /// Stop publishing. Idempotent.
    ///
    /// Cancels the timer, awaits any in-flight tick so a late write
    /// cannot clobber the inactive flag, then merges `active: false`
    /// into the state record. A failed inactive write is logged, not
    /// retried. No effect on a publisher that never started; a loop
    /// that already stopped on its own keeps its stop reason.
    pub async fn stop(&self) {
        let previous = self.running.lock().await.take();
        if let Some(previous) = previous {
            let _ = previous.cancel.send(true);
            let _ = previous.task.await;
        }

        if *self.state.borrow() != LoopState::Running {
            debug!(publisher_id = %self.id, "stop without a running loop");
            return;
        }

        if let Err(e) = self.store.mark_inactive(&self.id).await {
            warn!(publisher_id = %self.id, error = %e, "failed to write inactive flag on stop");
        }

        self.state.send_replace(LoopState::Stopped(StopReason::Requested));
        info!(publisher_id = %self.id, "publish loop stopped");
    }
}

/// The repeating tick task for one loop instance.
async fn run_loop(
    id: String,
    store: Arc<dyn RendezvousStore>,
    source: Arc<dyn LocationSource>,
    meta: PublisherMeta,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
    state: watch::Sender<LoopState>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so the
    // first sample lands one full interval after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = ticker.tick() => {
                if let Err(reason) = publish_tick(&id, store.as_ref(), source.as_ref(), &meta).await {
                    warn!(publisher_id = %id, error = %reason, "position sample failed, stopping loop");
                    if let Err(e) = store.mark_inactive(&id).await {
                        warn!(publisher_id = %id, error = %e, "failed to mark publisher inactive");
                    }
                    state.send_replace(LoopState::Stopped(StopReason::SampleFailure(reason)));
                    return;
                }
            }
        }
    }
}

/// One tick: sample, overwrite state, append to the log.
///
/// The two store writes are independent; either failing is logged and
/// retried naturally on the next tick. Only a failed sample is fatal,
/// returned as the stop reason.
async fn publish_tick(
    id: &str,
    store: &dyn RendezvousStore,
    source: &dyn LocationSource,
    meta: &PublisherMeta,
) -> std::result::Result<(), String> {
    let fix = source.current_position().await.map_err(|e| e.to_string())?;
    let sample = PositionSample::new(fix, Utc::now()).map_err(|e| e.to_string())?;

    debug!(
        publisher_id = %id,
        latitude = sample.latitude,
        longitude = sample.longitude,
        "position sampled"
    );

    let record = PublisherState {
        position: sample.clone(),
        active: true,
        meta: meta.clone(),
    };
    if let Err(e) = store.put_state(id, record).await {
        warn!(publisher_id = %id, error = %e, "state write failed");
    }

    match store.append_log(id, PositionLogEntry { position: sample }).await {
        Ok(entry_id) => debug!(publisher_id = %id, entry_id = %entry_id, "log entry appended"),
        Err(e) => warn!(publisher_id = %id, error = %e, "log append failed"),
    }

    Ok(())
}

#[cfg(test)]
mod tests;
