// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Derived wires: filters, transformers, splitters, advanced transformers and routers.
//!
//! Each derived wire is a DIRECT_THREADSAFE scheduler soldered to its upstream
//! wire with PUT, so it shows up in the model graph like any other vertex and
//! runs on whichever thread produced the upstream value.

mod advanced;
mod filter;
mod router;
mod splitter;
mod transformer;

pub use advanced::{AdvancedTransformation, FnAdvancedTransformation};
pub use router::{RoutableData, RouterAddress, WireRouter};

use crate::core::error::Result;
use crate::core::scheduling::TaskSchedulerType;
use crate::core::wires::{InputWire, OutputWire};

impl<R: Clone + Send + 'static> OutputWire<R> {
    /// Build an unbound DIRECT_THREADSAFE vertex named `name`, fed from this wire.
    pub(crate) fn build_direct_vertex<S: Clone + Send + 'static>(
        &self,
        name: &str,
        input_name: &str,
    ) -> Result<(InputWire<R, S>, OutputWire<S>)> {
        let scheduler = self
            .model()?
            .scheduler_builder::<S>(name)
            .with_type(TaskSchedulerType::DirectThreadsafe)
            .build()?;
        let input = scheduler.build_input_wire::<R>(input_name)?;
        self.solder_to(&input);
        Ok((input, scheduler.output_wire()))
    }
}
