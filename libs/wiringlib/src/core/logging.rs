// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Logging setup for hosts that embed a wiring model.
//!
//! The library itself only emits `tracing` events. Hosts either install their
//! own subscriber or call [`init`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::core::error::{Result, WiringError};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a fmt subscriber filtered by `RUST_LOG` (falls back to `info`).
///
/// Returns an error if a global subscriber is already installed.
pub fn init() -> Result<()> {
    init_with_filter(DEFAULT_LOG_FILTER)
}

/// Like [`init`], but with an explicit fallback filter directive.
pub fn init_with_filter(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| WiringError::Configuration(format!("tracing subscriber: {}", e)))
}
