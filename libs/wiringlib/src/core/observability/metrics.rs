// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::core::observability::LatencyStats;

/// Receives per-task measurements from schedulers.
///
/// Called on worker threads (or the caller's thread for direct schedulers)
/// after every handled task, so implementations must be cheap.
pub trait SchedulerMetricsSink: Send + Sync {
    /// Unhandled tasks remaining on `scheduler` after a task completed.
    fn report_queue_depth(&self, scheduler: &str, depth: i64);

    /// Time spent inside one handler invocation.
    fn report_task_latency(&self, scheduler: &str, latency: Duration);
}

/// Sink that emits measurements as trace-level events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl SchedulerMetricsSink for TracingMetricsSink {
    fn report_queue_depth(&self, scheduler: &str, depth: i64) {
        tracing::trace!("[{}] Unhandled tasks: {}", scheduler, depth);
    }

    fn report_task_latency(&self, scheduler: &str, latency: Duration) {
        tracing::trace!("[{}] Handler took {:?}", scheduler, latency);
    }
}

/// Running totals kept by every scheduler.
#[derive(Debug, Default)]
pub(crate) struct SchedulerStats {
    tasks_handled: AtomicU64,
    tasks_discarded: AtomicU64,
    handler_failures: AtomicU64,
    total_latency_nanos: AtomicU64,
    max_latency_nanos: AtomicU64,
}

impl SchedulerStats {
    pub(crate) fn record_handled(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.tasks_handled.fetch_add(1, Ordering::Relaxed);
        self.total_latency_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_latency_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.tasks_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tasks_handled(&self) -> u64 {
        self.tasks_handled.load(Ordering::Relaxed)
    }

    pub(crate) fn tasks_discarded(&self) -> u64 {
        self.tasks_discarded.load(Ordering::Relaxed)
    }

    pub(crate) fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn latency(&self) -> LatencyStats {
        let handled = self.tasks_handled();
        let total = self.total_latency_nanos.load(Ordering::Relaxed);
        LatencyStats {
            mean: Duration::from_nanos(total.checked_div(handled).unwrap_or(0)),
            max: Duration::from_nanos(self.max_latency_nanos.load(Ordering::Relaxed)),
        }
    }
}
