// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod component;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod observability;
pub mod prelude;
pub mod reservation;
pub mod scheduling;
pub mod transformers;
pub mod wires;

pub use component::{ComponentWiring, HandlerDeclarations, WiringComponent};
pub use config::{TaskSchedulerConfiguration, WiringModelConfig};
pub use error::{Result, WiringError};
pub use model::{ModelStatus, WiringModel, WiringModelBuilder};
pub use observability::{
    EdgeSnapshot, LatencyStats, ModelSnapshot, SchedulerMetricsSink, SchedulerSnapshot,
    TracingMetricsSink,
};
pub use reservation::{Reservation, ReservationWatch};
pub use scheduling::{
    HandlerFailure, TaskScheduler, TaskSchedulerBuilder, TaskSchedulerType, UncaughtHandler,
};
pub use transformers::{
    AdvancedTransformation, FnAdvancedTransformation, RoutableData, RouterAddress, WireRouter,
};
pub use wires::{InputWire, OutputWire, SolderType};
