// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod builder;
pub mod counter;
pub(crate) mod scheduler;
mod scheduler_type;
mod thread_runner;
mod uncaught;

pub use builder::TaskSchedulerBuilder;
pub use counter::{
    BackpressureObjectCounter, MultiObjectCounter, NoOpObjectCounter, ObjectCounter,
    StandardObjectCounter,
};
pub(crate) use scheduler::SchedulerCore;
pub use scheduler::TaskScheduler;
pub use scheduler_type::TaskSchedulerType;
pub use uncaught::{HandlerFailure, UncaughtHandler, default_uncaught_handler};
