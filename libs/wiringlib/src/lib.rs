// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dataflow wiring: task schedulers joined by typed input and output wires.

#![allow(clippy::type_complexity)] // Boxed handler signatures are clear in context

pub mod core;

pub use core::{
    AdvancedTransformation, ComponentWiring, EdgeSnapshot, FnAdvancedTransformation,
    HandlerDeclarations, HandlerFailure, InputWire, LatencyStats, ModelSnapshot, ModelStatus,
    OutputWire, Reservation, ReservationWatch, Result, RoutableData, RouterAddress,
    SchedulerMetricsSink, SchedulerSnapshot, SolderType, TaskScheduler, TaskSchedulerBuilder,
    TaskSchedulerConfiguration, TaskSchedulerType, TracingMetricsSink, UncaughtHandler,
    WireRouter, WiringComponent, WiringError, WiringModel, WiringModelBuilder, WiringModelConfig,
};
