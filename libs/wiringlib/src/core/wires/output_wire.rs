// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::core::error::{Result, WiringError};
use crate::core::model::{ModelShared, WiringModel};
use crate::core::scheduling::TaskSchedulerType;
use crate::core::wires::{InputWire, SolderType, WireSink};

struct Destination<R> {
    sink: Arc<dyn WireSink<R>>,
    solder: SolderType,
}

impl<R> Clone for Destination<R> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            solder: self.solder,
        }
    }
}

struct DerivedWire {
    type_name: &'static str,
    wire: Box<dyn Any + Send + Sync>,
}

struct OutputWireInner<R> {
    model: Weak<ModelShared>,
    /// Scheduler that produces onto this wire.
    owner: String,
    /// Replaced wholesale on solder so forwarding never holds the lock.
    destinations: RwLock<Arc<Vec<Destination<R>>>>,
    derived: Mutex<HashMap<String, DerivedWire>>,
}

/// Fan-out point for the values a scheduler produces.
///
/// Every forwarded value reaches each soldered input wire in solder order.
/// The last destination receives the original value, the others a clone.
pub struct OutputWire<R> {
    inner: Arc<OutputWireInner<R>>,
}

impl<R> Clone for OutputWire<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for OutputWire<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputWire")
            .field("owner", &self.inner.owner)
            .field("destinations", &self.inner.destinations.read().len())
            .finish()
    }
}

impl<R: Clone + Send + 'static> OutputWire<R> {
    pub(crate) fn new(model: Weak<ModelShared>, owner: &str) -> Self {
        Self {
            inner: Arc::new(OutputWireInner {
                model,
                owner: owner.to_string(),
                destinations: RwLock::new(Arc::new(Vec::new())),
                derived: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Name of the scheduler producing onto this wire.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn destination_count(&self) -> usize {
        self.inner.destinations.read().len()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn model(&self) -> Result<WiringModel> {
        self.inner
            .model
            .upgrade()
            .map(WiringModel::from_shared)
            .ok_or_else(|| {
                WiringError::Runtime(format!(
                    "output wire of {} outlived its model",
                    self.inner.owner
                ))
            })
    }

    /// Solder to `input` with [`SolderType::Put`].
    pub fn solder_to<X>(&self, input: &InputWire<R, X>)
    where
        X: Clone + Send + 'static,
    {
        self.solder_to_with(input, SolderType::Put);
    }

    /// Solder to `input`. Soldering the same input again keeps the first link.
    pub fn solder_to_with<X>(&self, input: &InputWire<R, X>, solder: SolderType)
    where
        X: Clone + Send + 'static,
    {
        let sink: Arc<dyn WireSink<R>> = Arc::new(input.clone());
        {
            let mut destinations = self.inner.destinations.write();
            if let Some(existing) = destinations
                .iter()
                .find(|d| d.sink.wire_id() == sink.wire_id())
            {
                tracing::debug!(
                    "[{}] Already soldered to {}.{} ({}), keeping existing link",
                    self.inner.owner,
                    input.scheduler_name(),
                    input.name(),
                    existing.solder
                );
                return;
            }
            let mut next = Vec::with_capacity(destinations.len() + 1);
            next.extend(destinations.iter().cloned());
            next.push(Destination { sink, solder });
            *destinations = Arc::new(next);
        }

        tracing::debug!(
            "[{}] Soldered to {}.{} ({})",
            self.inner.owner,
            input.scheduler_name(),
            input.name(),
            solder
        );
        if let Some(model) = self.inner.model.upgrade() {
            model.register_edge(&self.inner.owner, input.scheduler_name(), input.name(), solder);
        }
    }

    /// Solder to a new DIRECT_THREADSAFE scheduler named `name` that runs `consumer`.
    pub fn solder_to_consumer<F>(&self, name: &str, consumer: F) -> Result<()>
    where
        F: Fn(R) + Send + Sync + 'static,
    {
        let scheduler = self
            .model()?
            .scheduler_builder::<()>(name)
            .with_type(TaskSchedulerType::DirectThreadsafe)
            .build()?;
        let input = scheduler.build_input_wire::<R>("data")?;
        input.bind_consumer(consumer)?;
        self.solder_to(&input);
        Ok(())
    }

    fn destinations(&self) -> Arc<Vec<Destination<R>>> {
        Arc::clone(&self.inner.destinations.read())
    }

    /// Push `data` to every destination.
    ///
    /// A destination whose handler panics does not stop delivery to the rest.
    /// The first panic is resumed once every destination has been served.
    pub(crate) fn forward(&self, data: R) {
        let destinations = self.destinations();
        let Some((last, rest)) = destinations.split_last() else {
            return;
        };
        let mut failure = None;
        for destination in rest {
            self.deliver_guarded(destination, data.clone(), &mut failure);
        }
        self.deliver_guarded(last, data, &mut failure);
        if let Some(payload) = failure {
            resume_unwind(payload);
        }
    }

    /// Push one freshly made value to each destination.
    ///
    /// `make` runs once per destination, in solder order. Values a destination
    /// did not take go to `declined`. Panics are handled as in [`Self::forward`].
    pub(crate) fn forward_each<M, D>(&self, mut make: M, mut declined: D)
    where
        M: FnMut() -> R,
        D: FnMut(R),
    {
        let mut failure = None;
        for destination in self.destinations().iter() {
            if let Some(value) = self.deliver_guarded(destination, make(), &mut failure) {
                declined(value);
            }
        }
        if let Some(payload) = failure {
            resume_unwind(payload);
        }
    }

    /// Deliver one value, returning it if the destination declined it.
    ///
    /// A panic from a direct destination's handler is stored in `failure`
    /// (the first one wins) instead of unwinding.
    fn deliver_guarded(
        &self,
        destination: &Destination<R>,
        data: R,
        failure: &mut Option<Box<dyn Any + Send>>,
    ) -> Option<R> {
        match catch_unwind(AssertUnwindSafe(|| {
            destination.sink.deliver(data, destination.solder)
        })) {
            Ok(Ok(())) => None,
            Ok(Err(value)) => {
                self.log_declined(destination);
                Some(value)
            }
            Err(payload) => {
                tracing::debug!(
                    "[{}] Handler of {}.{} panicked, continuing with remaining destinations",
                    self.inner.owner,
                    destination.sink.scheduler_name(),
                    destination.sink.wire_name()
                );
                if failure.is_none() {
                    *failure = Some(payload);
                }
                None
            }
        }
    }

    fn log_declined(&self, destination: &Destination<R>) {
        tracing::trace!(
            "[{}] {}.{} did not take value ({})",
            self.inner.owner,
            destination.sink.scheduler_name(),
            destination.sink.wire_name(),
            destination.solder
        );
    }

    /// Return the wire cached under `kind`/`name`, creating it on first use.
    pub(crate) fn derived<W, F>(&self, kind: &str, name: &str, create: F) -> Result<W>
    where
        W: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<W>,
    {
        let key = format!("{}:{}", kind, name);
        let mut derived = self.inner.derived.lock();
        if let Some(existing) = derived.get(&key) {
            return existing.wire.downcast_ref::<W>().cloned().ok_or_else(|| {
                WiringError::DerivedWireTypeMismatch {
                    name: name.to_string(),
                    existing: existing.type_name.to_string(),
                    requested: type_name::<W>().to_string(),
                }
            });
        }

        let wire = create()?;
        derived.insert(
            key,
            DerivedWire {
                type_name: type_name::<W>(),
                wire: Box::new(wire.clone()),
            },
        );
        Ok(wire)
    }
}
