// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Model-level configuration, loadable from TOML.
//!
//! ```toml
//! default_parallelism = 8
//!
//! [schedulers]
//! event_hasher = "CONCURRENT CAPACITY(500)"
//! consensus = { type = "SEQUENTIAL", flushing_enabled = true }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::config::TaskSchedulerConfiguration;
use crate::core::error::{Result, WiringError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WiringModelConfig {
    /// Worker threads for CONCURRENT schedulers that do not set their own.
    /// Zero means one per available core.
    pub default_parallelism: usize,

    /// Per-scheduler overrides, keyed by scheduler name.
    pub schedulers: HashMap<String, TaskSchedulerConfiguration>,
}

impl WiringModelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| WiringError::Configuration(format!("Failed to parse model config: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WiringError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            WiringError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::info!(
            "Loaded wiring model config from {} ({} scheduler overrides)",
            path.display(),
            config.schedulers.len()
        );
        Ok(config)
    }

    /// Override configured for a scheduler, if any.
    pub fn scheduler(&self, name: &str) -> Option<&TaskSchedulerConfiguration> {
        self.schedulers.get(name)
    }

    pub fn effective_parallelism(&self) -> usize {
        if self.default_parallelism > 0 {
            return self.default_parallelism;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
