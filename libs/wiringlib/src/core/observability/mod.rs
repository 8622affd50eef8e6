// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scheduler statistics, metric hooks and serializable model snapshots.

mod metrics;
mod snapshots;

pub use metrics::{SchedulerMetricsSink, TracingMetricsSink};
pub(crate) use metrics::SchedulerStats;
pub use snapshots::{EdgeSnapshot, LatencyStats, ModelSnapshot, SchedulerSnapshot};
