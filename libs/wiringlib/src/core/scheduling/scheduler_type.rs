// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::WiringError;

/// Concurrency discipline of a task scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskSchedulerType {
    /// Handler runs on the submitting thread. Failures propagate to the caller.
    Direct,
    /// Like [`TaskSchedulerType::Direct`], for handlers safe to call from many
    /// threads at once.
    DirectThreadsafe,
    /// One worker thread, strict FIFO.
    #[default]
    Sequential,
    /// Worker pool, no ordering.
    Concurrent,
    /// Discards everything.
    NoOp,
}

impl TaskSchedulerType {
    /// True for schedulers that run work on the caller's thread.
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct | Self::DirectThreadsafe)
    }

    /// True for schedulers backed by a queue and worker threads.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Sequential | Self::Concurrent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::DirectThreadsafe => "DIRECT_THREADSAFE",
            Self::Sequential => "SEQUENTIAL",
            Self::Concurrent => "CONCURRENT",
            Self::NoOp => "NO_OP",
        }
    }
}

impl fmt::Display for TaskSchedulerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskSchedulerType {
    type Err = WiringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Ok(Self::Direct),
            "DIRECT_THREADSAFE" => Ok(Self::DirectThreadsafe),
            "SEQUENTIAL" => Ok(Self::Sequential),
            "CONCURRENT" => Ok(Self::Concurrent),
            "NO_OP" => Ok(Self::NoOp),
            other => Err(WiringError::Configuration(format!(
                "unknown task scheduler type: {}",
                other
            ))),
        }
    }
}
