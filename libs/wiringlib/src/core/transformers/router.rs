// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::{Result, WiringError};
use crate::core::model::WiringModel;
use crate::core::scheduling::{TaskScheduler, TaskSchedulerType};
use crate::core::wires::{InputWire, OutputWire};

/// Key type usable as a router address.
pub trait RouterAddress: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<K> RouterAddress for K where K: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

type Payload = Arc<dyn Any + Send + Sync>;

/// A value tagged with the router address it should be sent to.
#[derive(Clone)]
pub struct RoutableData<K> {
    address: K,
    payload: Payload,
}

impl<K: RouterAddress> RoutableData<K> {
    pub fn new<T: Send + Sync + 'static>(address: K, payload: T) -> Self {
        Self {
            address,
            payload: Arc::new(payload),
        }
    }

    pub fn address(&self) -> K {
        self.address
    }

    /// Borrow the payload if it has type `T`.
    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl<K: fmt::Debug> fmt::Debug for RoutableData<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutableData")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

struct Route {
    type_name: &'static str,
    wire: Box<dyn Any + Send + Sync>,
    /// Returns false if the payload had the wrong type.
    forward: Arc<dyn Fn(Payload) -> bool + Send + Sync>,
}

/// Sends each [`RoutableData`] to the output wire registered for its address.
///
/// Data whose address has no output yet is dropped.
pub struct WireRouter<K> {
    scheduler: TaskScheduler<()>,
    input: InputWire<RoutableData<K>, ()>,
    routes: Arc<RwLock<HashMap<K, Route>>>,
}

impl<K> Clone for WireRouter<K> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            input: self.input.clone(),
            routes: Arc::clone(&self.routes),
        }
    }
}

impl<K: RouterAddress> WireRouter<K> {
    /// Create a router scheduler named `name` with one input wire.
    pub fn new(model: &WiringModel, name: &str, input_name: &str) -> Result<Self> {
        let scheduler = model
            .scheduler_builder::<()>(name)
            .with_type(TaskSchedulerType::DirectThreadsafe)
            .build()?;
        let input = scheduler.build_input_wire::<RoutableData<K>>(input_name)?;
        let routes: Arc<RwLock<HashMap<K, Route>>> = Arc::new(RwLock::new(HashMap::new()));

        let table = Arc::clone(&routes);
        let router_name = name.to_string();
        input.bind_consumer(move |data: RoutableData<K>| {
            let forward = table
                .read()
                .get(&data.address)
                .map(|route| (Arc::clone(&route.forward), route.type_name));
            match forward {
                Some((forward, expected)) => {
                    if !forward(data.payload) {
                        tracing::error!(
                            "[{}] Payload for {:?} is not a {}, dropped",
                            router_name,
                            data.address,
                            expected
                        );
                    }
                }
                None => tracing::trace!(
                    "[{}] No output for {:?}, dropped",
                    router_name,
                    data.address
                ),
            }
        })?;

        tracing::debug!("[{}] Built router", name);
        Ok(Self {
            scheduler,
            input,
            routes,
        })
    }

    pub fn name(&self) -> &str {
        self.scheduler.name()
    }

    /// The wire to solder producers of [`RoutableData`] to.
    pub fn input(&self) -> InputWire<RoutableData<K>, ()> {
        self.input.clone()
    }

    /// Output wire for `address`, created on first request.
    ///
    /// Fails if the address was already registered with another type.
    pub fn get_output<T>(&self, address: K) -> Result<OutputWire<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut routes = self.routes.write();
        if let Some(route) = routes.get(&address) {
            return route.wire.downcast_ref::<OutputWire<T>>().cloned().ok_or_else(|| {
                WiringError::RoutedTypeMismatch {
                    router: self.name().to_string(),
                    address: format!("{:?}", address),
                    existing: route.type_name.to_string(),
                    requested: type_name::<T>().to_string(),
                }
            });
        }

        let wire = self.scheduler.build_secondary_output_wire::<T>();
        let target = wire.clone();
        routes.insert(
            address,
            Route {
                type_name: type_name::<T>(),
                wire: Box::new(wire.clone()),
                forward: Arc::new(move |payload: Payload| match payload.downcast::<T>() {
                    Ok(value) => {
                        target.forward(Arc::try_unwrap(value).unwrap_or_else(|v| (*v).clone()));
                        true
                    }
                    Err(_) => false,
                }),
            },
        );
        tracing::debug!("[{}] Registered output for {:?}", self.name(), address);
        Ok(wire)
    }
}

impl<K: RouterAddress> OutputWire<RoutableData<K>> {
    /// Router fed from this wire. Requesting the same `name` again returns the same router.
    pub fn build_router(&self, name: &str) -> Result<WireRouter<K>> {
        self.derived("router", name, || {
            let router = WireRouter::new(&self.model()?, name, "data")?;
            self.solder_to(&router.input());
            Ok(router)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Lane {
        Numbers,
        Words,
        Unused,
    }

    #[test]
    fn test_payload_access() {
        let data = RoutableData::new(Lane::Words, String::from("hi"));
        assert_eq!(data.address(), Lane::Words);
        assert_eq!(data.payload::<String>().map(String::as_str), Some("hi"));
        assert!(data.payload::<u32>().is_none());
    }

    #[test]
    fn test_routes_by_address_and_checks_types() {
        let model = WiringModel::new();
        let router = WireRouter::<Lane>::new(&model, "router", "data").unwrap();

        let numbers = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let words = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let n = Arc::clone(&numbers);
        let w = Arc::clone(&words);
        router
            .get_output::<u64>(Lane::Numbers)
            .unwrap()
            .solder_to_consumer("numbers", move |x| n.lock().push(x))
            .unwrap();
        router
            .get_output::<String>(Lane::Words)
            .unwrap()
            .solder_to_consumer("words", move |s| w.lock().push(s))
            .unwrap();

        let input = router.input();
        input.put(RoutableData::new(Lane::Numbers, 1u64));
        input.put(RoutableData::new(Lane::Words, "one".to_string()));
        input.put(RoutableData::new(Lane::Unused, 5u64));
        // Wrong payload type for the address: dropped.
        input.put(RoutableData::new(Lane::Numbers, "two".to_string()));
        input.put(RoutableData::new(Lane::Numbers, 3u64));

        assert_eq!(*numbers.lock(), vec![1, 3]);
        assert_eq!(*words.lock(), vec!["one".to_string()]);

        let again = router.get_output::<u64>(Lane::Numbers).unwrap();
        assert_eq!(again.destination_count(), 1);
        assert!(matches!(
            router.get_output::<u32>(Lane::Numbers),
            Err(WiringError::RoutedTypeMismatch { .. })
        ));
    }
}
