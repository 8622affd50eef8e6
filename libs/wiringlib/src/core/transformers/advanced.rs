// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Transformers for values with an explicit lifecycle.
//!
//! For each input value `a`, [`AdvancedTransformation::transform`] runs once
//! per destination so that every destination receives its own `B`. Afterwards
//! [`AdvancedTransformation::input_cleanup`] consumes `a` exactly once, and
//! every `B` a destination did not take is handed to
//! [`AdvancedTransformation::output_cleanup`]. A panicking destination does
//! not keep the others from being served or the input from being cleaned up.

use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use crate::core::error::Result;
use crate::core::wires::OutputWire;

pub trait AdvancedTransformation<A, B>: Send + Sync + 'static {
    /// Produce one output value for one destination.
    fn transform(&self, input: &A) -> B;

    /// Release the input after all destinations have been served.
    fn input_cleanup(&self, input: A);

    /// Release an output value a destination declined.
    fn output_cleanup(&self, output: B);
}

/// [`AdvancedTransformation`] assembled from three closures.
pub struct FnAdvancedTransformation<T, I, O> {
    transform: T,
    input_cleanup: I,
    output_cleanup: O,
}

impl<T, I, O> FnAdvancedTransformation<T, I, O> {
    pub fn new(transform: T, input_cleanup: I, output_cleanup: O) -> Self {
        Self {
            transform,
            input_cleanup,
            output_cleanup,
        }
    }
}

impl<A, B, T, I, O> AdvancedTransformation<A, B> for FnAdvancedTransformation<T, I, O>
where
    T: Fn(&A) -> B + Send + Sync + 'static,
    I: Fn(A) + Send + Sync + 'static,
    O: Fn(B) + Send + Sync + 'static,
{
    fn transform(&self, input: &A) -> B {
        (self.transform)(input)
    }

    fn input_cleanup(&self, input: A) {
        (self.input_cleanup)(input)
    }

    fn output_cleanup(&self, output: B) {
        (self.output_cleanup)(output)
    }
}

impl<A: Clone + Send + 'static> OutputWire<A> {
    /// Wire whose destinations each receive a separately transformed value.
    pub fn build_advanced_transformer<B, X>(
        &self,
        name: &str,
        input_name: &str,
        transformation: X,
    ) -> Result<OutputWire<B>>
    where
        B: Clone + Send + 'static,
        X: AdvancedTransformation<A, B>,
    {
        self.derived("advanced_transformer", name, || {
            let (input, output) = self.build_direct_vertex::<B>(name, input_name)?;
            let destinations = output.clone();
            input.bind_consumer(move |value: A| {
                let delivered = catch_unwind(AssertUnwindSafe(|| {
                    destinations.forward_each(
                        || transformation.transform(&value),
                        |declined| transformation.output_cleanup(declined),
                    )
                }));
                transformation.input_cleanup(value);
                if let Err(payload) = delivered {
                    resume_unwind(payload);
                }
            })?;
            tracing::debug!("[{}] Built advanced transformer {}", self.owner(), name);
            Ok(output)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::core::model::WiringModel;
    use crate::core::reservation::Reservation;
    use crate::core::scheduling::TaskSchedulerType;
    use crate::core::wires::SolderType;

    fn reserving() -> impl AdvancedTransformation<Reservation<u32>, Reservation<u32>> {
        FnAdvancedTransformation::new(
            |r: &Reservation<u32>| r.reserve(),
            |r: Reservation<u32>| r.release(),
            |r: Reservation<u32>| r.release(),
        )
    }

    #[test]
    fn test_each_destination_gets_its_own_reservation() {
        let model = WiringModel::new();
        let source = model
            .scheduler_builder::<Reservation<u32>>("source")
            .with_type(TaskSchedulerType::Direct)
            .build()
            .unwrap();
        let input = source.build_input_wire::<Reservation<u32>>("in").unwrap();
        input.bind(|r| r).unwrap();

        let advanced = source
            .output_wire()
            .build_advanced_transformer("reserve", "data", reserving())
            .unwrap();

        let held = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&held);
        advanced
            .solder_to_consumer("holder", move |r| keep.lock().push(r))
            .unwrap();

        // Never started, so it keeps the one task it accepts.
        let slow = model
            .scheduler_builder::<()>("slow")
            .with_type(TaskSchedulerType::Sequential)
            .with_unhandled_task_capacity(1)
            .build()
            .unwrap();
        let slow_input = slow.build_input_wire::<Reservation<u32>>("data").unwrap();
        slow_input.bind_consumer(drop).unwrap();
        advanced.solder_to_with(&slow_input, SolderType::Offer);

        let first = Reservation::new(1);
        let first_watch = first.watch();
        input.put(first);
        assert_eq!(first_watch.reservation_count(), 2);

        let second = Reservation::new(2);
        let second_watch = second.watch();
        input.put(second);
        assert_eq!(second_watch.reservation_count(), 1);

        held.lock().clear();
        assert!(second_watch.is_released());
        assert_eq!(first_watch.reservation_count(), 1);

        model.stop();
        assert!(first_watch.is_released());
    }

    #[test]
    fn test_no_destinations_still_cleans_input() {
        let model = WiringModel::new();
        let source = model
            .scheduler_builder::<u32>("source")
            .with_type(TaskSchedulerType::Direct)
            .build()
            .unwrap();
        let input = source.build_input_wire::<u32>("in").unwrap();
        input.bind(|x| x).unwrap();

        let transforms = Arc::new(AtomicUsize::new(0));
        let cleanups = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&transforms);
        let c = Arc::clone(&cleanups);
        source
            .output_wire()
            .build_advanced_transformer(
                "unused",
                "data",
                FnAdvancedTransformation::new(
                    move |x: &u32| {
                        t.fetch_add(1, Ordering::SeqCst);
                        *x
                    },
                    move |_: u32| {
                        c.fetch_add(1, Ordering::SeqCst);
                    },
                    |_: u32| {},
                ),
            )
            .unwrap();

        input.put(7);
        assert_eq!(transforms.load(Ordering::SeqCst), 0);
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    }
}
