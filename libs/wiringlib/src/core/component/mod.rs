// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Components wired through explicitly declared handlers.

mod component_wiring;
mod declarations;

pub use component_wiring::ComponentWiring;
pub use declarations::{HandlerDeclarations, WiringComponent};
