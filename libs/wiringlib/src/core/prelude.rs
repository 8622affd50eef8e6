// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use wiringlib::core::prelude::*`.

pub use crate::core::{
    // Components
    component::{ComponentWiring, HandlerDeclarations, WiringComponent},

    // Errors
    error::{Result, WiringError},

    // Model
    model::WiringModel,

    // Scheduling
    scheduling::{TaskScheduler, TaskSchedulerType},

    // Wires
    wires::{InputWire, OutputWire, SolderType},
};
