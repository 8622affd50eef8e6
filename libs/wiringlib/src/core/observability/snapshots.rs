// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Point-in-time snapshot types for model observation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, WiringError};
use crate::core::scheduling::TaskSchedulerType;
use crate::core::wires::SolderType;

/// Handler latency statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Mean time per handled task.
    pub mean: Duration,
    /// Maximum observed time for one task.
    pub max: Duration,
}

/// Point-in-time snapshot of a scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub name: String,
    pub scheduler_type: TaskSchedulerType,
    /// Unhandled-task capacity, `None` if unbounded.
    pub capacity: Option<u64>,
    /// Unhandled tasks, -1 if not tracked.
    pub unprocessed_task_count: i64,
    pub tasks_handled: u64,
    pub tasks_discarded: u64,
    pub handler_failures: u64,
    pub squelching: bool,
    pub latency: LatencyStats,
}

/// One soldered connection between two schedulers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub source: String,
    pub target: String,
    pub input_wire: String,
    pub solder_type: SolderType,
}

/// Snapshot of an entire wiring model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub running: bool,
    pub schedulers: Vec<SchedulerSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl ModelSnapshot {
    pub fn scheduler(&self, name: &str) -> Option<&SchedulerSnapshot> {
        self.schedulers.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| WiringError::Runtime(format!("Failed to serialize snapshot: {}", e)))
    }
}
