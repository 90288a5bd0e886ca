//! Runner start/stop transitions, cancellation and draining

mod test_helpers;

use agentflow::agent::AgentRegistry;
use agentflow::error::{AgentError, ErrorKind};
use agentflow::runner::{RunEvent, Runner, RunnerSettings, RunnerState};
use agentflow::testing::AppendAgent;
use std::sync::atomic::Ordering;
use std::time::Duration;
use test_helpers::{append_chain, routed_event, started_runner};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Block until the first hop of any event has started
async fn wait_for_hop_start(events: &mut broadcast::Receiver<RunEvent>) {
    loop {
        if let RunEvent::HopStarted { .. } = events.recv().await.unwrap() {
            return;
        }
    }
}

fn slow_agent(delay: Duration) -> AgentRegistry {
    AgentRegistry::new()
        .with_agent("slow", AppendAgent::new("slow").with_delay(delay))
        .unwrap()
}

#[tokio::test]
async fn test_start_is_idempotent_while_running() {
    let runner = Runner::new(append_chain(), RunnerSettings::default()).unwrap();
    let ctx = CancellationToken::new();

    runner.start(ctx.clone()).await.unwrap();
    runner.start(ctx).await.unwrap();
    assert_eq!(runner.state(), RunnerState::Running);

    let outcome = runner.process(routed_event("X", "processor")).await.unwrap();
    assert!(outcome.is_completed());
}

#[tokio::test]
async fn test_emit_before_start_is_rejected() {
    let runner = Runner::new(append_chain(), RunnerSettings::default()).unwrap();

    let error = runner.emit(routed_event("X", "processor")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotRunning);
    assert!(matches!(error, AgentError::NotRunning { ref state } if state == "idle"));
}

#[tokio::test]
async fn test_stop_when_idle_is_rejected() {
    let runner = Runner::new(append_chain(), RunnerSettings::default()).unwrap();

    let error = runner.stop().await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotRunning);
    assert_eq!(runner.state(), RunnerState::Idle);
}

#[tokio::test]
async fn test_stopped_runner_rejects_everything() {
    let runner = started_runner(append_chain(), RunnerSettings::default()).await;
    runner.stop().await.unwrap();
    assert_eq!(runner.state(), RunnerState::Stopped);

    let emit = runner.emit(routed_event("X", "processor")).await.unwrap_err();
    assert!(matches!(emit, AgentError::NotRunning { ref state } if state == "stopped"));

    let restart = runner.start(CancellationToken::new()).await.unwrap_err();
    assert_eq!(restart.kind(), ErrorKind::NotRunning);

    let second_stop = runner.stop().await.unwrap_err();
    assert_eq!(second_stop.kind(), ErrorKind::NotRunning);
}

#[tokio::test]
async fn test_stop_lets_current_hop_finish_then_halts_chain() {
    let second = AppendAgent::new("second");
    let second_calls = second.invocation_counter();
    let registry = AgentRegistry::new()
        .with_agent(
            "first",
            AppendAgent::new("first")
                .with_delay(Duration::from_millis(200))
                .then("second"),
        )
        .unwrap()
        .with_agent("second", second)
        .unwrap();
    let runner = started_runner(registry, RunnerSettings::default()).await;
    let mut events = runner.subscribe();

    let handle = runner.emit(routed_event("X", "first")).await.unwrap();
    wait_for_hop_start(&mut events).await;
    runner.stop().await.unwrap();

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.failure_kind(), Some(ErrorKind::RunnerStopped));
    assert_eq!(outcome.hop_count(), 1);
    assert_eq!(outcome.state.get_text("message").as_deref(), Some("X:first"));
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stop_cancels_hops_after_grace_period() {
    let runner = started_runner(
        slow_agent(Duration::from_secs(30)),
        RunnerSettings::default().with_shutdown_grace(Duration::from_millis(50)),
    )
    .await;
    let mut events = runner.subscribe();

    let handle = runner.emit(routed_event("X", "slow")).await.unwrap();
    wait_for_hop_start(&mut events).await;

    tokio::time::timeout(Duration::from_secs(5), runner.stop())
        .await
        .expect("stop should not wait for the slow agent")
        .unwrap();

    let outcome = handle.wait().await.unwrap();
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::RunnerStopped);
    assert_eq!(failure.agent.as_deref(), Some("slow"));
    assert!(outcome.hops.is_empty());
    assert_eq!(outcome.state.get_text("input").as_deref(), Some("X"));
}

#[tokio::test]
async fn test_queued_events_resolve_as_stopped() {
    let runner = started_runner(
        slow_agent(Duration::from_millis(300)),
        RunnerSettings::default().with_max_concurrent_events(1),
    )
    .await;
    let mut events = runner.subscribe();

    let running = runner.emit(routed_event("A", "slow")).await.unwrap();
    wait_for_hop_start(&mut events).await;
    let queued = runner.emit(routed_event("B", "slow")).await.unwrap();

    runner.stop().await.unwrap();

    let running = running.wait().await.unwrap();
    assert!(running.is_completed());
    assert_eq!(running.state.get_text("message").as_deref(), Some("A:slow"));

    let queued = queued.wait().await.unwrap();
    assert_eq!(queued.failure_kind(), Some(ErrorKind::RunnerStopped));
    assert!(queued.hops.is_empty());
    assert_eq!(queued.state.get_text("input").as_deref(), Some("B"));
    assert!(queued.state.get_text("message").is_none());

    let metrics = runner.metrics();
    assert_eq!(metrics.runs_completed, 1);
    assert_eq!(metrics.failures_by_kind.get("runner_stopped"), Some(&1));
}

#[tokio::test]
async fn test_context_cancellation_aborts_in_flight_agent() {
    let runner =
        Runner::new(slow_agent(Duration::from_secs(30)), RunnerSettings::default()).unwrap();
    let ctx = CancellationToken::new();
    runner.start(ctx.clone()).await.unwrap();
    let mut events = runner.subscribe();

    let handle = runner.emit(routed_event("X", "slow")).await.unwrap();
    wait_for_hop_start(&mut events).await;
    ctx.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancelled run should resolve promptly")
        .unwrap();

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Cancelled);
    assert_eq!(failure.agent.as_deref(), Some("slow"));
    assert_eq!(failure.hop, Some(1));

    runner.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_context_fails_later_events_without_running_agents() {
    let chain = append_chain();
    let ctx = CancellationToken::new();
    let runner = Runner::new(chain, RunnerSettings::default()).unwrap();
    runner.start(ctx.clone()).await.unwrap();
    ctx.cancel();

    let outcome = runner.process(routed_event("X", "processor")).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(ErrorKind::Cancelled));
    assert!(outcome.hops.is_empty());
}

#[tokio::test]
async fn test_emit_blocked_on_full_queue_is_released_by_stop() {
    let runner = std::sync::Arc::new(
        started_runner(
            slow_agent(Duration::from_millis(300)),
            RunnerSettings::default()
                .with_max_concurrent_events(1)
                .with_queue_capacity(1),
        )
        .await,
    );
    let mut events = runner.subscribe();

    let first = runner.emit(routed_event("A", "slow")).await.unwrap();
    wait_for_hop_start(&mut events).await;

    // One event waits on the permit, one fills the queue; the next blocks
    let second = runner.emit(routed_event("B", "slow")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let third = runner.emit(routed_event("C", "slow")).await.unwrap();

    let blocked = {
        let runner = std::sync::Arc::clone(&runner);
        tokio::spawn(async move { runner.emit(routed_event("D", "slow")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    runner.stop().await.unwrap();

    let blocked = blocked.await.unwrap().unwrap_err();
    assert_eq!(blocked.kind(), ErrorKind::NotRunning);

    assert!(first.wait().await.unwrap().is_completed());
    for handle in [second, third] {
        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::RunnerStopped));
    }
}
