//! Repeated-behavior dispatcher.
//!
//! One detached tokio task per active dispatch. Each tick sends a single
//! behavior command through the device transport, sleeps the plan's gap,
//! then checks the handle's cancellation token and the elapsed time. The
//! task state machine is `Running -> {Completed, Cancelled}`.
//!
//! Cancellation is cooperative and handle-scoped: every dispatch owns its
//! token, so cancelling one device never disturbs another. Worst-case
//! latency from cancel to task exit is one gap plus one transport call.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use marionette::dispatch::{DispatchPlan, Dispatcher};
//! use marionette::transport::LogTransport;
//!
//! # async fn example() -> Result<(), marionette::errors::DispatchError> {
//! let dispatcher = Dispatcher::new(Arc::new(LogTransport));
//! let plan = DispatchPlan::new("Bht_Vg_Laugh_Big_Fourcount").with_total_seconds(10.0);
//! let handle = dispatcher.start_repeated("device_123", plan)?;
//!
//! // ... later, from the interrupt path:
//! dispatcher.cancel(handle.id())?;
//! handle.finished().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatch::plan::DispatchPlan;
use crate::errors::DispatchError;
use crate::transport::DeviceTransport;

/// Unique identifier of one dispatch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Observable state of a dispatch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DispatchState {
    /// The background task is alive and ticking.
    Running = 0,
    /// Elapsed time reached the plan's total without cancellation.
    Completed = 1,
    /// The cancellation token was observed set.
    Cancelled = 2,
}

impl DispatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatchState::Running,
            1 => DispatchState::Completed,
            _ => DispatchState::Cancelled,
        }
    }

    /// Whether the task has exited.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DispatchState::Running)
    }
}

/// State shared between a dispatch task and its observers.
///
/// `done` is a second token, tripped by the task on exit. Being
/// level-triggered, a waiter that subscribes after the trip still returns
/// immediately.
#[derive(Debug)]
struct DispatchShared {
    state: AtomicU8,
    ticks_sent: AtomicU64,
    failed_ticks: AtomicU64,
    cancel: CancellationToken,
    done: CancellationToken,
}

/// Handle to one dispatch task.
///
/// Cheap to clone; all clones observe the same task.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    id: DispatchId,
    device_id: String,
    shared: Arc<DispatchShared>,
}

impl DispatchHandle {
    /// The task's unique id.
    pub fn id(&self) -> DispatchId {
        self.id
    }

    /// The device this dispatch targets.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Current task state.
    pub fn state(&self) -> DispatchState {
        DispatchState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Number of successfully sent commands so far.
    pub fn ticks_sent(&self) -> u64 {
        self.shared.ticks_sent.load(Ordering::Relaxed)
    }

    /// Number of ticks whose send failed (the task keeps going).
    pub fn failed_ticks(&self) -> u64 {
        self.shared.failed_ticks.load(Ordering::Relaxed)
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait until the task has exited.
    pub async fn finished(&self) {
        self.shared.done.cancelled().await;
    }
}

/// Spawns and tracks repeated-behavior dispatch tasks.
///
/// One device may have at most one `Running` dispatch; a second
/// `start_repeated` for a busy device is rejected with
/// [`DispatchError::AlreadyRunning`]. Finished handles stay registered so
/// a late cancel is a no-op rather than an error; long-lived hosts can
/// reclaim them with [`prune_finished`](Self::prune_finished).
pub struct Dispatcher {
    transport: Arc<dyn DeviceTransport>,
    handles: DashMap<DispatchId, DispatchHandle>,
    active: Arc<DashMap<String, DispatchId>>,
}

impl Dispatcher {
    /// Create a dispatcher sending through the given transport.
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            handles: DashMap::new(),
            active: Arc::new(DashMap::new()),
        }
    }

    /// Start a repeated dispatch for a device.
    ///
    /// Returns immediately with the handle of the spawned task.
    ///
    /// # Errors
    ///
    /// [`DispatchError::AlreadyRunning`] if the device has a running
    /// dispatch, or a validation error from the plan.
    pub fn start_repeated(
        &self,
        device_id: &str,
        plan: DispatchPlan,
    ) -> Result<DispatchHandle, DispatchError> {
        plan.validate()?;

        let id = DispatchId::new();
        match self.active.entry(device_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let prior = *occupied.get();
                let still_running = self
                    .handles
                    .get(&prior)
                    .map(|h| !h.is_finished())
                    .unwrap_or(false);
                if still_running {
                    return Err(DispatchError::AlreadyRunning {
                        device_id: device_id.to_string(),
                    });
                }
                occupied.insert(id);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }

        let shared = Arc::new(DispatchShared {
            state: AtomicU8::new(DispatchState::Running as u8),
            ticks_sent: AtomicU64::new(0),
            failed_ticks: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        });
        let handle = DispatchHandle {
            id,
            device_id: device_id.to_string(),
            shared: Arc::clone(&shared),
        };
        self.handles.insert(id, handle.clone());

        info!(%id, device_id, ?plan, "starting repeated dispatch");
        tokio::spawn(run_loop(
            Arc::clone(&self.transport),
            Arc::clone(&self.active),
            id,
            device_id.to_string(),
            plan,
            shared,
        ));

        Ok(handle)
    }

    /// Request cancellation of a dispatch.
    ///
    /// Returns immediately without waiting for the task to exit.
    /// Idempotent: cancelling a finished or already-cancelled dispatch is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownHandle`] if the id was never issued.
    pub fn cancel(&self, id: DispatchId) -> Result<(), DispatchError> {
        let handle = self
            .handles
            .get(&id)
            .ok_or(DispatchError::UnknownHandle { id })?;
        debug!(%id, device_id = handle.device_id(), "cancel requested");
        handle.shared.cancel.cancel();
        Ok(())
    }

    /// State of a dispatch, if the id was ever issued.
    pub fn state(&self, id: DispatchId) -> Option<DispatchState> {
        self.handles.get(&id).map(|h| h.state())
    }

    /// The running dispatch for a device, if any.
    pub fn active_dispatch(&self, device_id: &str) -> Option<DispatchHandle> {
        let id = *self.active.get(device_id)?;
        let handle = self.handles.get(&id)?.clone();
        (!handle.is_finished()).then_some(handle)
    }

    /// Drop finished handles from the registry, returning how many were
    /// removed. Cancelling a pruned id yields `UnknownHandle`.
    pub fn prune_finished(&self) -> usize {
        let before = self.handles.len();
        self.handles.retain(|_, handle| !handle.is_finished());
        before - self.handles.len()
    }
}

/// The background task body: send, sleep, re-check, repeat.
async fn run_loop(
    transport: Arc<dyn DeviceTransport>,
    active: Arc<DashMap<String, DispatchId>>,
    id: DispatchId,
    device_id: String,
    plan: DispatchPlan,
    shared: Arc<DispatchShared>,
) {
    let markup = plan.tick_markup();
    let gap = plan.gap();
    let total = plan.total();
    let started = Instant::now();

    let outcome = loop {
        match transport.send_markup(&device_id, &markup).await {
            Ok(()) => {
                shared.ticks_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                // A transient transport failure must not end the run.
                shared.failed_ticks.fetch_add(1, Ordering::Relaxed);
                warn!(%id, device_id, error = %err, "tick send failed, continuing");
            }
        }

        tokio::select! {
            _ = shared.cancel.cancelled() => break DispatchState::Cancelled,
            _ = sleep(gap) => {}
        }
        if shared.cancel.is_cancelled() {
            break DispatchState::Cancelled;
        }
        if let Some(total) = total {
            if started.elapsed() >= total {
                break DispatchState::Completed;
            }
        }
    };

    shared.state.store(outcome as u8, Ordering::Release);
    active.remove_if(&device_id, |_, v| *v == id);
    shared.done.cancel();
    info!(
        %id,
        device_id,
        state = ?outcome,
        ticks = shared.ticks_sent.load(Ordering::Relaxed),
        failed = shared.failed_ticks.load(Ordering::Relaxed),
        "dispatch finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use tokio::time::{Duration, advance};

    /// Transport double that records sends and can fail on demand.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
        interrupts: Mutex<Vec<String>>,
        fail_next: AtomicBool,
    }

    #[async_trait]
    impl DeviceTransport for RecordingTransport {
        async fn send_markup(
            &self,
            device_id: &str,
            markup: &str,
        ) -> Result<(), TransportError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(TransportError::Offline {
                    device_id: device_id.to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((device_id.to_string(), markup.to_string()));
            Ok(())
        }

        async fn send_interrupt(&self, device_id: &str) -> Result<(), TransportError> {
            self.interrupts.lock().unwrap().push(device_id.to_string());
            Ok(())
        }
    }

    fn plan_for(total: f64) -> DispatchPlan {
        DispatchPlan::new("Bht_Vg_Laugh_Big_Fourcount")
            .with_behavior_seconds(1.5)
            .with_gap_seconds(0.5)
            .with_total_seconds(total)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_elapsed_reaches_total() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let handle = dispatcher.start_repeated("dev_a", plan_for(2.0)).unwrap();
        handle.finished().await;

        assert_eq!(handle.state(), DispatchState::Completed);
        // Sends at t = 0.0, 0.5, 1.0, 1.5; the check at t = 2.0 exits.
        assert_eq!(handle.ticks_sent(), 4);
        assert_eq!(transport.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_gap_sends_at_most_one_command() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let handle = dispatcher.start_repeated("dev_a", plan_for(60.0)).unwrap();
        dispatcher.cancel(handle.id()).unwrap();
        handle.finished().await;

        assert_eq!(handle.state(), DispatchState::Cancelled);
        assert!(handle.ticks_sent() <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn double_cancel_is_a_noop() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let handle = dispatcher.start_repeated("dev_a", plan_for(60.0)).unwrap();
        dispatcher.cancel(handle.id()).unwrap();
        handle.finished().await;
        assert_eq!(handle.state(), DispatchState::Cancelled);

        // Second cancel after exit: no error, no state change.
        dispatcher.cancel(handle.id()).unwrap();
        assert_eq!(handle.state(), DispatchState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_completion_keeps_completed_state() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let handle = dispatcher.start_repeated("dev_a", plan_for(2.0)).unwrap();
        handle.finished().await;
        assert_eq!(handle.state(), DispatchState::Completed);

        dispatcher.cancel(handle.id()).unwrap();
        assert_eq!(handle.state(), DispatchState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_handle_is_an_error() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingTransport::default()));
        let bogus = DispatchId::new();
        let err = dispatcher.cancel(bogus).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownHandle { id } if id == bogus));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_device_rejects_a_second_dispatch() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingTransport::default()));

        let first = dispatcher.start_repeated("dev_a", plan_for(60.0)).unwrap();
        let err = dispatcher.start_repeated("dev_a", plan_for(60.0)).unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRunning { .. }));

        // A different device is unaffected.
        dispatcher.start_repeated("dev_b", plan_for(60.0)).unwrap();

        dispatcher.cancel(first.id()).unwrap();
        first.finished().await;

        // The device accepts a new dispatch once the task has exited.
        dispatcher.start_repeated("dev_a", plan_for(60.0)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_is_counted_and_the_loop_continues() {
        let transport = Arc::new(RecordingTransport::default());
        transport.fail_next.store(true, Ordering::SeqCst);
        let dispatcher = Dispatcher::new(transport.clone());

        let handle = dispatcher.start_repeated("dev_a", plan_for(2.0)).unwrap();
        handle.finished().await;

        assert_eq!(handle.state(), DispatchState::Completed);
        assert_eq!(handle.failed_ticks(), 1);
        // The first send failed; the remaining three landed.
        assert_eq!(handle.ticks_sent(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_dispatch_runs_until_cancelled() {
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let plan = DispatchPlan::new("Bht_X").with_gap_seconds(0.5).run_until_cancelled();
        let handle = dispatcher.start_repeated("dev_a", plan).unwrap();

        // Step the clock one gap at a time so each sleep fires in turn.
        for _ in 0..40 {
            advance(Duration::from_millis(500)).await;
        }
        assert_eq!(handle.state(), DispatchState::Running);
        assert!(handle.ticks_sent() >= 10);

        dispatcher.cancel(handle.id()).unwrap();
        handle.finished().await;
        assert_eq!(handle.state(), DispatchState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_only_finished_handles() {
        let dispatcher = Dispatcher::new(Arc::new(RecordingTransport::default()));

        let done = dispatcher.start_repeated("dev_a", plan_for(2.0)).unwrap();
        done.finished().await;
        let running = dispatcher.start_repeated("dev_b", plan_for(60.0)).unwrap();

        assert_eq!(dispatcher.prune_finished(), 1);
        assert!(matches!(
            dispatcher.cancel(done.id()),
            Err(DispatchError::UnknownHandle { .. })
        ));
        dispatcher.cancel(running.id()).unwrap();
    }
}
