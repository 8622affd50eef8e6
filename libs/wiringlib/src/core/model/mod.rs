// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod graph;
mod wiring_model;

pub(crate) use wiring_model::ModelShared;
pub use wiring_model::{WiringModel, WiringModelBuilder};

/// Wiring model lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelStatus {
    #[default]
    Initial,
    Starting,
    Started,
    Stopping,
    Stopped,
}
