// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-scheduler configuration.
//!
//! Accepted either as a table or in the compact string form used in
//! configuration files, for example `"SEQUENTIAL CAPACITY(500) FLUSHABLE"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, WiringError};
use crate::core::scheduling::TaskSchedulerType;

/// Settings applied to a scheduler builder. Unset fields keep the builder's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchedulerConfigRepr")]
pub struct TaskSchedulerConfiguration {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scheduler_type: Option<TaskSchedulerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhandled_task_capacity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flushing_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squelching_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<usize>,
}

impl TaskSchedulerConfiguration {
    pub fn of_type(scheduler_type: TaskSchedulerType) -> Self {
        Self {
            scheduler_type: Some(scheduler_type),
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.unhandled_task_capacity = Some(capacity);
        self
    }

    pub fn with_flushing(mut self, enabled: bool) -> Self {
        self.flushing_enabled = Some(enabled);
        self
    }

    pub fn with_squelching(mut self, enabled: bool) -> Self {
        self.squelching_enabled = Some(enabled);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Parse the compact string form.
    pub fn parse(s: &str) -> Result<Self> {
        let mut config = Self::default();

        for token in s.split_whitespace() {
            let upper = token.to_ascii_uppercase();
            if let Some(arg) = parenthesized(&upper, "CAPACITY") {
                config.unhandled_task_capacity = Some(parse_number(token, arg)?);
            } else if let Some(arg) = parenthesized(&upper, "PARALLELISM") {
                config.parallelism = Some(parse_number(token, arg)?);
            } else if upper == "FLUSHABLE" {
                config.flushing_enabled = Some(true);
            } else if upper == "!FLUSHABLE" {
                config.flushing_enabled = Some(false);
            } else if upper == "SQUELCHABLE" {
                config.squelching_enabled = Some(true);
            } else if upper == "!SQUELCHABLE" {
                config.squelching_enabled = Some(false);
            } else {
                let scheduler_type = upper.parse::<TaskSchedulerType>().map_err(|_| {
                    WiringError::Configuration(format!(
                        "unrecognized scheduler configuration token '{}' in '{}'",
                        token, s
                    ))
                })?;
                if config.scheduler_type.replace(scheduler_type).is_some() {
                    return Err(WiringError::Configuration(format!(
                        "scheduler type given more than once in '{}'",
                        s
                    )));
                }
            }
        }

        Ok(config)
    }
}

fn parenthesized<'a>(token: &'a str, keyword: &str) -> Option<&'a str> {
    token
        .strip_prefix(keyword)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_number<N: FromStr>(token: &str, arg: &str) -> Result<N> {
    arg.trim().parse().map_err(|_| {
        WiringError::Configuration(format!("invalid number in scheduler token '{}'", token))
    })
}

impl FromStr for TaskSchedulerConfiguration {
    type Err = WiringError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TaskSchedulerConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(scheduler_type) = self.scheduler_type {
            parts.push(scheduler_type.to_string());
        }
        if let Some(capacity) = self.unhandled_task_capacity {
            parts.push(format!("CAPACITY({})", capacity));
        }
        if let Some(parallelism) = self.parallelism {
            parts.push(format!("PARALLELISM({})", parallelism));
        }
        match self.flushing_enabled {
            Some(true) => parts.push("FLUSHABLE".into()),
            Some(false) => parts.push("!FLUSHABLE".into()),
            None => {}
        }
        match self.squelching_enabled {
            Some(true) => parts.push("SQUELCHABLE".into()),
            Some(false) => parts.push("!SQUELCHABLE".into()),
            None => {}
        }
        f.write_str(&parts.join(" "))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchedulerConfigRepr {
    Compact(String),
    Table(SchedulerConfigTable),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SchedulerConfigTable {
    #[serde(default, rename = "type")]
    scheduler_type: Option<TaskSchedulerType>,
    #[serde(default)]
    unhandled_task_capacity: Option<u64>,
    #[serde(default)]
    flushing_enabled: Option<bool>,
    #[serde(default)]
    squelching_enabled: Option<bool>,
    #[serde(default)]
    parallelism: Option<usize>,
}

impl TryFrom<SchedulerConfigRepr> for TaskSchedulerConfiguration {
    type Error = WiringError;

    fn try_from(repr: SchedulerConfigRepr) -> Result<Self> {
        match repr {
            SchedulerConfigRepr::Compact(s) => Self::parse(&s),
            SchedulerConfigRepr::Table(table) => Ok(Self {
                scheduler_type: table.scheduler_type,
                unhandled_task_capacity: table.unhandled_task_capacity,
                flushing_enabled: table.flushing_enabled,
                squelching_enabled: table.squelching_enabled,
                parallelism: table.parallelism,
            }),
        }
    }
}
