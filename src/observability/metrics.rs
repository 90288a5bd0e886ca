//! Per-runner metrics
//!
//! Counters are plain atomics; run durations and per-kind failure counts sit
//! behind std mutexes since they are only touched once per run.

use crate::error::ErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Keep at most this many run durations for percentile calculation
const MAX_RECORDED_RUN_TIMES: usize = 1000;

/// Thread-safe counters owned by one runner
#[derive(Debug, Default)]
pub struct RunnerMetrics {
    events_emitted: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    hops_executed: AtomicU64,
    active_runs: AtomicU64,
    max_active_runs: AtomicU64,
    run_times: Mutex<Vec<u64>>, // in milliseconds
    failures_by_kind: Mutex<BTreeMap<ErrorKind, u64>>,
}

impl RunnerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_started(&self) {
        let active = self.active_runs.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_active_runs.fetch_max(active, Ordering::Relaxed);
    }

    pub fn hop_executed(&self) {
        self.hops_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self, duration: Duration) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.active_runs.fetch_sub(1, Ordering::Relaxed);
        self.record_run_time(duration);
    }

    pub fn run_failed(&self, kind: ErrorKind, duration: Duration) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        self.active_runs.fetch_sub(1, Ordering::Relaxed);
        self.record_run_time(duration);

        if let Ok(mut failures) = self.failures_by_kind.lock() {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    /// A queued event resolved without ever being dispatched
    pub fn run_dropped(&self, kind: ErrorKind) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut failures) = self.failures_by_kind.lock() {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    fn record_run_time(&self, duration: Duration) {
        if let Ok(mut times) = self.run_times.lock() {
            times.push(duration.as_millis() as u64);
            if times.len() > MAX_RECORDED_RUN_TIMES {
                times.remove(0);
            }
        }
    }

    fn run_time_statistics(&self) -> (f64, f64, f64, f64) {
        let Ok(times) = self.run_times.lock() else {
            return (0.0, 0.0, 0.0, 0.0);
        };
        if times.is_empty() {
            return (0.0, 0.0, 0.0, 0.0);
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();

        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (
            avg,
            percentile(&sorted, 50.0),
            percentile(&sorted, 95.0),
            percentile(&sorted, 99.0),
        )
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg_run_time_ms, run_time_p50_ms, run_time_p95_ms, run_time_p99_ms) =
            self.run_time_statistics();

        let failures_by_kind = self
            .failures_by_kind
            .lock()
            .map(|failures| {
                failures
                    .iter()
                    .map(|(kind, count)| (kind.as_str().to_string(), *count))
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            hops_executed: self.hops_executed.load(Ordering::Relaxed),
            active_runs: self.active_runs.load(Ordering::Relaxed),
            max_active_runs: self.max_active_runs.load(Ordering::Relaxed),
            avg_run_time_ms,
            run_time_p50_ms,
            run_time_p95_ms,
            run_time_p99_ms,
            failures_by_kind,
            timestamp: current_timestamp(),
        }
    }
}

/// Serializable view of [`RunnerMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_emitted: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub hops_executed: u64,
    pub active_runs: u64,
    pub max_active_runs: u64,
    pub avg_run_time_ms: f64,
    pub run_time_p50_ms: f64,
    pub run_time_p95_ms: f64,
    pub run_time_p99_ms: f64,
    pub failures_by_kind: BTreeMap<String, u64>,
    pub timestamp: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;

    lower + (upper - lower) * index.fract()
}
