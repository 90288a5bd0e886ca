//! Runner lifecycle, queueing and dispatch
//!
//! ```text
//! emit ─► bounded queue ─► dispatcher ─► one task per event (≤ max_concurrent_events)
//!                                              └─► hop loop: agent → router → merge
//! ```
//!
//! The runner moves `Idle → Running → Stopped` exactly once. `emit` and
//! `stop` synchronize on the queue sender: `stop` takes it away under a write
//! lock, so an event is either enqueued before the stop or rejected with
//! `NotRunning`, never lost in between.

use crate::agent::AgentRegistry;
use crate::config::ConfigError;
use crate::error::{AgentError, AgentResult};
use crate::flow::Event;
use crate::observability::{MetricsSnapshot, RunnerMetrics};
use crate::routing::{MetadataRouter, Router};
use crate::runner::chain::{ChainExecutor, QueuedEvent};
use crate::runner::events::RunEvent;
use crate::runner::outcome::{RunHandle, RunOutcome};
use crate::runner::settings::RunnerSettings;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Runner lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Running,
    Stopped,
}

impl RunnerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunnerState::Idle,
            1 => RunnerState::Running,
            _ => RunnerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunnerState::Idle => 0,
            RunnerState::Running => 1,
            RunnerState::Stopped => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::Idle => "idle",
            RunnerState::Running => "running",
            RunnerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequential multi-agent pipeline engine
///
/// Share it behind an `Arc` to emit from several tasks; every method takes
/// `&self`.
pub struct Runner {
    registry: Arc<AgentRegistry>,
    router: Arc<dyn Router>,
    settings: RunnerSettings,
    state: AtomicU8,
    sender: RwLock<Option<mpsc::Sender<QueuedEvent>>>,
    shutdown: CancellationToken,
    hard_cancel: Mutex<Option<CancellationToken>>,
    tracker: TaskTracker,
    events: broadcast::Sender<RunEvent>,
    metrics: Arc<RunnerMetrics>,
}

impl Runner {
    /// Runner using the default [`MetadataRouter`]
    pub fn new(registry: AgentRegistry, settings: RunnerSettings) -> AgentResult<Self> {
        Self::with_router(registry, Arc::new(MetadataRouter), settings)
    }

    /// Runner with a custom routing policy
    pub fn with_router(
        registry: AgentRegistry,
        router: Arc<dyn Router>,
        settings: RunnerSettings,
    ) -> AgentResult<Self> {
        settings.validate()?;

        if let Some(default_agent) = &settings.default_agent {
            if !registry.contains(default_agent) {
                return Err(ConfigError::InvalidConfig(format!(
                    "default agent '{default_agent}' is not registered"
                ))
                .into());
            }
        }

        let (events, _) = broadcast::channel(settings.event_buffer);

        Ok(Self {
            registry: Arc::new(registry),
            router,
            settings,
            state: AtomicU8::new(RunnerState::Idle.as_u8()),
            sender: RwLock::new(None),
            shutdown: CancellationToken::new(),
            hard_cancel: Mutex::new(None),
            tracker: TaskTracker::new(),
            events,
            metrics: Arc::new(RunnerMetrics::new()),
        })
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Receive hop and run notifications from now on
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Begin accepting events
    ///
    /// Cancelling `ctx` aborts every in-flight agent call. Starting a running
    /// runner is a no-op; a stopped runner cannot be restarted.
    pub async fn start(&self, ctx: CancellationToken) -> AgentResult<()> {
        let mut sender_slot = self.sender.write().await;

        match self.state.compare_exchange(
            RunnerState::Idle.as_u8(),
            RunnerState::Running.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(current) => {
                return match RunnerState::from_u8(current) {
                    RunnerState::Running => {
                        debug!("Runner already running");
                        Ok(())
                    }
                    other => Err(AgentError::not_running(other.as_str())),
                };
            }
        }

        let cancel = ctx.child_token();
        if let Ok(mut slot) = self.hard_cancel.lock() {
            *slot = Some(cancel.clone());
        }

        let executor = Arc::new(ChainExecutor {
            registry: Arc::clone(&self.registry),
            router: Arc::clone(&self.router),
            settings: self.settings.clone(),
            shutdown: self.shutdown.clone(),
            external: ctx,
            cancel,
            events: self.events.clone(),
            metrics: Arc::clone(&self.metrics),
        });

        let (tx, rx) = mpsc::channel(self.settings.queue_capacity);
        *sender_slot = Some(tx);

        let limiter = Arc::new(Semaphore::new(self.settings.max_concurrent_events));
        self.tracker.spawn(dispatch_loop(
            rx,
            executor,
            limiter,
            self.tracker.clone(),
        ));

        info!(
            agents = self.registry.len(),
            max_steps = self.settings.max_steps,
            max_concurrent_events = self.settings.max_concurrent_events,
            "Runner started"
        );
        Ok(())
    }

    /// Enqueue an event; waits for queue capacity
    pub async fn emit(&self, event: Event) -> AgentResult<RunHandle> {
        let state = self.state();
        if state != RunnerState::Running {
            return Err(AgentError::not_running(state.as_str()));
        }

        let sender_slot = self.sender.read().await;
        let Some(sender) = sender_slot.as_ref() else {
            return Err(AgentError::not_running(self.state().as_str()));
        };

        let event_id = event.id();
        let (reply, receiver) = oneshot::channel();
        let queued = QueuedEvent { event, reply };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                return Err(AgentError::not_running(RunnerState::Stopped.as_str()));
            }
            sent = sender.send(queued) => {
                if sent.is_err() {
                    return Err(AgentError::not_running(self.state().as_str()));
                }
            }
        }

        self.metrics.event_emitted();
        debug!(event_id = %event_id, "Event queued");
        Ok(RunHandle::new(event_id, receiver))
    }

    /// Emit an event and wait for its outcome
    pub async fn process(&self, event: Event) -> AgentResult<RunOutcome> {
        self.emit(event).await?.wait().await
    }

    /// Stop accepting events and drain
    ///
    /// In-flight chains finish their current hop and then resolve as
    /// `RunnerStopped`; queued events resolve the same way without running.
    /// After the grace period, remaining agent calls are cancelled.
    pub async fn stop(&self) -> AgentResult<()> {
        if let Err(current) = self.state.compare_exchange(
            RunnerState::Running.as_u8(),
            RunnerState::Stopped.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return Err(AgentError::not_running(
                RunnerState::from_u8(current).as_str(),
            ));
        }

        info!("Stopping runner");
        self.shutdown.cancel();
        self.sender.write().await.take();
        self.tracker.close();

        let grace = self.settings.shutdown_grace;
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Grace period elapsed, cancelling in-flight agents"
            );
            self.cancel_in_flight();
            self.tracker.wait().await;
        }

        info!("Runner stopped");
        Ok(())
    }

    fn cancel_in_flight(&self) {
        if let Ok(slot) = self.hard_cancel.lock() {
            if let Some(cancel) = slot.as_ref() {
                cancel.cancel();
            }
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.cancel_in_flight();
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("state", &self.state())
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Pull events off the queue and hand each to its own task
async fn dispatch_loop(
    mut queue: mpsc::Receiver<QueuedEvent>,
    executor: Arc<ChainExecutor>,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
) {
    while let Some(queued) = queue.recv().await {
        if executor.shutdown.is_cancelled() {
            executor.reject(queued, AgentError::RunnerStopped);
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = executor.shutdown.cancelled() => None,
            permit = Arc::clone(&limiter).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            executor.reject(queued, AgentError::RunnerStopped);
            continue;
        };

        let executor = Arc::clone(&executor);
        tracker.spawn(async move {
            let _permit = permit;
            executor.execute(queued).await;
        });
    }

    debug!("Dispatch loop ended");
}
