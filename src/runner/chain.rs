//! Per-event hop loop
//!
//! One [`ChainExecutor`] is shared by every event task. It owns nothing
//! mutable: each call to [`ChainExecutor::execute`] keeps its state on its own
//! stack and reports through the event's reply channel.

use crate::agent::{Agent, AgentRegistry, RunContext};
use crate::error::AgentError;
use crate::flow::{Event, State};
use crate::observability::RunnerMetrics;
use crate::routing::{Router, RoutingDecision};
use crate::runner::events::RunEvent;
use crate::runner::outcome::{HopRecord, RunFailure, RunOutcome, RunStatus};
use crate::runner::settings::RunnerSettings;
use crate::{hop_span, run_span};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// An accepted event waiting for dispatch
pub(crate) struct QueuedEvent {
    pub event: Event,
    pub reply: oneshot::Sender<RunOutcome>,
}

/// Everything a chain needs, shared across event tasks
pub(crate) struct ChainExecutor {
    pub registry: Arc<AgentRegistry>,
    pub router: Arc<dyn Router>,
    pub settings: RunnerSettings,
    /// Cancelled when `stop` is called; no new hop starts afterwards
    pub shutdown: CancellationToken,
    /// The caller's context passed to `start`
    pub external: CancellationToken,
    /// Child of `external`; also cancelled when the stop grace period runs out
    pub cancel: CancellationToken,
    pub events: broadcast::Sender<RunEvent>,
    pub metrics: Arc<RunnerMetrics>,
}

/// Partial results kept across hops so they survive a timeout
#[derive(Default)]
struct Progress {
    state: State,
    hops: Vec<HopRecord>,
    current: Option<(String, usize)>,
    /// The current hop's agent call has returned
    invoked: bool,
}

/// A failed chain: the error plus the agent and hop it belongs to
struct ChainError {
    agent: Option<String>,
    hop: Option<usize>,
    error: AgentError,
}

impl ChainError {
    fn at(progress: &Progress, error: AgentError) -> Self {
        let (agent, hop) = match &progress.current {
            Some((agent, hop)) => (Some(agent.clone()), Some(*hop)),
            None => (None, None),
        };
        Self { agent, hop, error }
    }
}

impl ChainExecutor {
    /// Resolve an event without dispatching it, e.g. when it was still
    /// queued at shutdown
    pub fn reject(&self, queued: QueuedEvent, error: AgentError) {
        let now = Utc::now();
        let event_id = queued.event.id();
        let failure = RunFailure::new(None, None, &error);

        warn!(event_id = %event_id, kind = %failure.kind, "Event resolved without dispatch");
        self.metrics.run_dropped(failure.kind);

        let outcome = RunOutcome {
            event_id,
            status: RunStatus::Failed,
            state: queued.event.initial_state(),
            hops: Vec::new(),
            failure: Some(failure),
            started_at: now,
            finished_at: now,
        };
        self.finish(outcome, queued.reply);
    }

    /// Run the event's chain to completion and deliver its outcome
    pub async fn execute(&self, queued: QueuedEvent) {
        let QueuedEvent { event, reply } = queued;
        let event_id = event.id();

        let span = run_span!(event_id = %event_id);
        let outcome = self.run_chain(&event).instrument(span).await;
        self.finish(outcome, reply);
    }

    async fn run_chain(&self, event: &Event) -> RunOutcome {
        let started = Instant::now();
        let started_at = Utc::now();
        self.metrics.run_started();

        let mut progress = Progress {
            state: event.initial_state(),
            ..Default::default()
        };

        let result = match self.settings.run_timeout {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.run_hops(event, &mut progress)).await;
                match timed {
                    Ok(result) => result,
                    Err(_) => {
                        let error =
                            AgentError::timeout(format!("run exceeded {}ms", limit.as_millis()));
                        self.abandon_hop(event, &progress, &error);
                        Err(ChainError::at(&progress, error))
                    }
                }
            }
            None => self.run_hops(event, &mut progress).await,
        };

        let elapsed = started.elapsed();
        let (status, failure) = match result {
            Ok(()) => {
                self.metrics.run_completed(elapsed);
                info!(
                    hops = progress.hops.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Run completed"
                );
                (RunStatus::Completed, None)
            }
            Err(ChainError { agent, hop, error }) => {
                let error = self.classify_cancellation(error);
                self.metrics.run_failed(error.kind(), elapsed);
                warn!(
                    agent = agent.as_deref().unwrap_or("-"),
                    hop = hop.unwrap_or(0),
                    kind = %error.kind(),
                    error = %error.sanitized_message(),
                    "Run failed"
                );
                (RunStatus::Failed, Some(RunFailure::new(agent, hop, &error)))
            }
        };

        RunOutcome {
            event_id: event.id(),
            status,
            state: progress.state,
            hops: progress.hops,
            failure,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn run_hops(&self, event: &Event, progress: &mut Progress) -> Result<(), ChainError> {
        let mut next = self.resolve_start_agent(event).ok_or_else(|| {
            ChainError::at(
                progress,
                AgentError::validation(
                    "event has no route hint or target and no default agent is configured",
                ),
            )
        })?;

        loop {
            let executed = progress.hops.len();
            if executed >= self.settings.max_steps {
                return Err(ChainError::at(
                    progress,
                    AgentError::routing_loop(executed, self.settings.max_steps),
                ));
            }
            if self.cancel.is_cancelled() {
                return Err(ChainError::at(progress, AgentError::Cancelled));
            }
            if self.shutdown.is_cancelled() {
                return Err(ChainError::at(progress, AgentError::RunnerStopped));
            }

            let hop = executed + 1;
            progress.current = Some((next.clone(), hop));
            progress.invoked = false;

            let agent = self
                .registry
                .get(&next)
                .map_err(|error| ChainError::at(progress, error))?;

            let decision = self
                .run_hop(agent.as_ref(), &next, hop, event, progress)
                .instrument(hop_span!(agent = %next, hop))
                .await
                .map_err(|error| ChainError::at(progress, error))?;

            match decision {
                RoutingDecision::Complete => return Ok(()),
                RoutingDecision::Forward { next_agent } => {
                    debug!(from = %next, to = %next_agent, "Forwarding");
                    next = next_agent;
                }
            }
        }
    }

    /// Invoke one agent, route on its output and merge it
    async fn run_hop(
        &self,
        agent: &dyn Agent,
        name: &str,
        hop: usize,
        event: &Event,
        progress: &mut Progress,
    ) -> Result<RoutingDecision, AgentError> {
        let event_id = event.id();
        self.publish(RunEvent::HopStarted {
            event_id,
            agent: name.to_string(),
            hop,
        });

        let started = Instant::now();
        let ctx = RunContext::new(event_id, name, hop, self.cancel.clone());
        let result = self.invoke(agent, &ctx, event, &progress.state).await;
        self.metrics.hop_executed();
        progress.invoked = true;

        let routed = match result {
            Ok(output) => self
                .router
                .decide(name, &output)
                .await
                .map(|decision| (output, decision)),
            Err(error) => Err(error),
        };

        let (output, decision) = match routed {
            Ok(routed) => routed,
            Err(error) => {
                let error = self.classify_cancellation(error);
                self.publish(RunEvent::HopFailed {
                    event_id,
                    agent: name.to_string(),
                    hop,
                    kind: error.kind(),
                    message: error.sanitized_message(),
                });
                return Err(error);
            }
        };

        progress.state.merge(output);

        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(duration_ms, decision = ?decision, "Hop completed");

        progress.hops.push(HopRecord {
            hop,
            agent: name.to_string(),
            duration_ms,
            decision: decision.clone(),
        });
        self.publish(RunEvent::HopCompleted {
            event_id,
            agent: name.to_string(),
            hop,
            duration_ms,
            decision: decision.clone(),
        });

        Ok(decision)
    }

    /// Race the agent against cancellation and the per-hop limit
    async fn invoke(
        &self,
        agent: &dyn Agent,
        ctx: &RunContext,
        event: &Event,
        state: &State,
    ) -> Result<State, AgentError> {
        let call = async {
            match self.settings.hop_timeout {
                Some(limit) => tokio::time::timeout(limit, agent.run(ctx, event, state))
                    .await
                    .unwrap_or_else(|_| {
                        Err(AgentError::timeout(format!(
                            "agent '{}' exceeded {}ms",
                            ctx.agent(),
                            limit.as_millis()
                        )))
                    }),
                None => agent.run(ctx, event, state).await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            result = call => result,
        }
    }

    /// Report the hop that was in flight when the run timeout dropped it
    fn abandon_hop(&self, event: &Event, progress: &Progress, error: &AgentError) {
        let Some((agent, hop)) = &progress.current else {
            return;
        };
        if progress.hops.len() >= *hop {
            return;
        }
        if !progress.invoked {
            self.metrics.hop_executed();
        }
        self.publish(RunEvent::HopFailed {
            event_id: event.id(),
            agent: agent.clone(),
            hop: *hop,
            kind: error.kind(),
            message: error.sanitized_message(),
        });
    }

    /// Route hint, then target, then the configured default
    fn resolve_start_agent(&self, event: &Event) -> Option<String> {
        event
            .route_hint()
            .map(str::to_string)
            .or_else(|| self.settings.default_agent.clone())
    }

    /// A cancellation caused by the stop deadline is reported as a stop
    fn classify_cancellation(&self, error: AgentError) -> AgentError {
        match error {
            AgentError::Cancelled
                if self.shutdown.is_cancelled() && !self.external.is_cancelled() =>
            {
                AgentError::RunnerStopped
            }
            other => other,
        }
    }

    fn finish(&self, outcome: RunOutcome, reply: oneshot::Sender<RunOutcome>) {
        self.publish(RunEvent::RunFinished {
            event_id: outcome.event_id,
            status: outcome.status,
            hops: outcome.hops.len(),
            failure: outcome.failure_kind(),
        });

        if reply.send(outcome).is_err() {
            debug!("Run handle dropped before the outcome was delivered");
        }
    }

    fn publish(&self, event: RunEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
