// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::core::component::declarations::{
    DeclarationKind, FilterFn, HandlerDeclarations, InputFn, TransformFn, WiringComponent,
    filter_signature, input_signature, transform_signature,
};
use crate::core::config::TaskSchedulerConfiguration;
use crate::core::error::{Result, WiringError};
use crate::core::model::WiringModel;
use crate::core::scheduling::TaskScheduler;
use crate::core::transformers::{RoutableData, RouterAddress, WireRouter};
use crate::core::wires::{InputWire, OutputWire};

type PendingBind<C> = Box<dyn FnOnce(&Arc<C>) -> Result<()> + Send>;

struct ComponentWiringInner<C: WiringComponent> {
    name: String,
    scheduler: TaskScheduler<C::Output>,
    declarations: HandlerDeclarations<C>,
    instance: OnceLock<Arc<C>>,
    /// Handler installs waiting for the instance. Guards `instance` updates.
    pending_binds: Mutex<Vec<PendingBind<C>>>,
    input_wires: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

/// Scheduler-backed wiring for a [`WiringComponent`].
///
/// Each declared input handler gets one [`InputWire`], created on first
/// request and returned again on later requests. All handlers feed the
/// scheduler's single output wire. The component instance can be bound
/// before or after wires are requested and soldered; data submitted earlier
/// is held and handled once the instance arrives.
pub struct ComponentWiring<C: WiringComponent> {
    inner: Arc<ComponentWiringInner<C>>,
}

impl<C: WiringComponent> Clone for ComponentWiring<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: WiringComponent> fmt::Debug for ComponentWiring<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentWiring")
            .field("name", &self.inner.name)
            .field("scheduler_type", &self.inner.scheduler.scheduler_type())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl<C: WiringComponent> ComponentWiring<C> {
    /// Wiring whose scheduler is named after the component type.
    pub fn new(model: &WiringModel, config: &TaskSchedulerConfiguration) -> Result<Self> {
        Self::with_name(model, &C::component_name(), config)
    }

    pub fn with_name(
        model: &WiringModel,
        name: &str,
        config: &TaskSchedulerConfiguration,
    ) -> Result<Self> {
        let declarations = HandlerDeclarations::<C>::collect(name)?;
        let scheduler = model
            .scheduler_builder::<C::Output>(name)
            .configure(config)
            .build()?;

        tracing::debug!(
            "[{}] Created component wiring ({})",
            name,
            scheduler.scheduler_type()
        );
        Ok(Self {
            inner: Arc::new(ComponentWiringInner {
                name: name.to_string(),
                scheduler,
                declarations,
                instance: OnceLock::new(),
                pending_binds: Mutex::new(Vec::new()),
                input_wires: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn scheduler(&self) -> &TaskScheduler<C::Output> {
        &self.inner.scheduler
    }

    pub fn is_bound(&self) -> bool {
        self.inner.instance.get().is_some()
    }

    /// Bind the component instance. Wires already requested become live.
    pub fn bind(&self, component: C) -> Result<()> {
        self.bind_shared(Arc::new(component))
    }

    /// Like [`ComponentWiring::bind`] for an instance shared with other code.
    pub fn bind_shared(&self, component: Arc<C>) -> Result<()> {
        let pending = {
            let mut pending = self.inner.pending_binds.lock();
            if self.inner.instance.set(Arc::clone(&component)).is_err() {
                return Err(WiringError::ComponentAlreadyBound(self.inner.name.clone()));
            }
            std::mem::take(&mut *pending)
        };

        tracing::debug!(
            "[{}] Bound component ({} wire(s) waiting)",
            self.inner.name,
            pending.len()
        );
        // Every waiting wire gets bound even when an earlier one fails.
        let mut first_error = None;
        for install in pending {
            if let Err(error) = install(&component) {
                tracing::debug!("[{}] Deferred bind failed: {}", self.inner.name, error);
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Run `install` now if the instance is bound, otherwise when it is.
    fn bind_or_defer(&self, install: PendingBind<C>) -> Result<()> {
        let instance = {
            let mut pending = self.inner.pending_binds.lock();
            match self.inner.instance.get() {
                Some(instance) => Arc::clone(instance),
                None => {
                    pending.push(install);
                    return Ok(());
                }
            }
        };
        install(&instance)
    }

    /// The input wire for the declared handler `name`.
    ///
    /// Fails if `name` is not declared as an input handler taking `T`.
    pub fn input_wire<T: Send + 'static>(&self, name: &str) -> Result<InputWire<T, C::Output>> {
        let handler: InputFn<C, T, C::Output> =
            self.inner
                .declarations
                .lookup(name, DeclarationKind::Input, input_signature::<T>())?;

        let wire = {
            let mut input_wires = self.inner.input_wires.lock();
            if let Some(existing) = input_wires.get(name) {
                if let Some(wire) = existing.downcast_ref::<InputWire<T, C::Output>>() {
                    return Ok(wire.clone());
                }
                return Err(WiringError::Runtime(format!(
                    "[{}] cached input wire {} has an unexpected type",
                    self.inner.name, name
                )));
            }
            let wire = self.inner.scheduler.build_input_wire::<T>(name)?;
            input_wires.insert(name.to_string(), Box::new(wire.clone()));
            wire
        };

        let target = wire.clone();
        self.bind_or_defer(Box::new(move |instance: &Arc<C>| {
            let instance = Arc::clone(instance);
            target.bind_optional(move |data| handler(&instance, data))
        }))?;
        Ok(wire)
    }

    /// The scheduler's output wire, shared by every handler.
    pub fn output_wire(&self) -> OutputWire<C::Output> {
        self.inner.scheduler.output_wire()
    }

    /// Output passed through the declared transformer `name`.
    pub fn transformed_output<S: Clone + Send + 'static>(
        &self,
        name: &str,
    ) -> Result<OutputWire<S>> {
        let transform: TransformFn<C, C::Output, S> = self.inner.declarations.lookup(
            name,
            DeclarationKind::Transformer,
            transform_signature::<C::Output, S>(),
        )?;
        self.component_vertex(&self.output_wire(), "transformer", name, transform)
    }

    /// Output passed through the declared filter `name`.
    pub fn filtered_output(&self, name: &str) -> Result<OutputWire<C::Output>> {
        let predicate: FilterFn<C, C::Output> = self.inner.declarations.lookup(
            name,
            DeclarationKind::Filter,
            filter_signature::<C::Output>(),
        )?;
        self.component_vertex(&self.output_wire(), "filter", name, filter_as_transform(predicate))
    }

    /// Each element of each output collection, in order.
    pub fn split_output<E>(&self) -> Result<OutputWire<E>>
    where
        C::Output: IntoIterator<Item = E>,
        E: Clone + Send + 'static,
    {
        self.output_wire()
            .build_splitter(&format!("{}_split", self.inner.name), "data")
    }

    /// Split output passed through the declared split filter `name`.
    pub fn split_and_filtered_output<E>(&self, name: &str) -> Result<OutputWire<E>>
    where
        C::Output: IntoIterator<Item = E>,
        E: Clone + Send + 'static,
    {
        let predicate: FilterFn<C, E> = self.inner.declarations.lookup(
            name,
            DeclarationKind::SplitFilter,
            filter_signature::<E>(),
        )?;
        self.component_vertex(
            &self.split_output::<E>()?,
            "filter",
            name,
            filter_as_transform(predicate),
        )
    }

    /// Split output passed through the declared split transformer `name`.
    pub fn split_and_transformed_output<E, S>(&self, name: &str) -> Result<OutputWire<S>>
    where
        C::Output: IntoIterator<Item = E>,
        E: Clone + Send + 'static,
        S: Clone + Send + 'static,
    {
        let transform: TransformFn<C, E, S> = self.inner.declarations.lookup(
            name,
            DeclarationKind::SplitTransformer,
            transform_signature::<E, S>(),
        )?;
        self.component_vertex(&self.split_output::<E>()?, "transformer", name, transform)
    }

    /// Output routed by address; the component emits [`RoutableData`].
    pub fn routed_output<K, T>(&self, address: K) -> Result<OutputWire<T>>
    where
        C: WiringComponent<Output = RoutableData<K>>,
        K: RouterAddress,
        T: Clone + Send + Sync + 'static,
    {
        let router: WireRouter<K> = self
            .output_wire()
            .build_router(&format!("{}_router", self.inner.name))?;
        router.get_output::<T>(address)
    }

    /// Split output routed by address; the component emits collections of [`RoutableData`].
    pub fn split_and_routed_output<K, T>(&self, address: K) -> Result<OutputWire<T>>
    where
        C::Output: IntoIterator<Item = RoutableData<K>>,
        K: RouterAddress,
        T: Clone + Send + Sync + 'static,
    {
        let router: WireRouter<K> = self
            .split_output::<RoutableData<K>>()?
            .build_router(&format!("{}_split_router", self.inner.name))?;
        router.get_output::<T>(address)
    }

    /// Direct vertex named `<component>_<name>` that applies `handler` with the bound instance.
    fn component_vertex<A, S>(
        &self,
        upstream: &OutputWire<A>,
        kind: &str,
        name: &str,
        handler: TransformFn<C, A, S>,
    ) -> Result<OutputWire<S>>
    where
        A: Clone + Send + 'static,
        S: Clone + Send + 'static,
    {
        let vertex = format!("{}_{}", self.inner.name, name);
        upstream.derived(kind, &vertex, || {
            let (input, output) = upstream.build_direct_vertex::<S>(&vertex, "data")?;
            self.bind_or_defer(Box::new(move |instance: &Arc<C>| {
                let instance = Arc::clone(instance);
                input.bind_optional(move |data| handler(&instance, data))
            }))?;
            tracing::debug!("[{}] Built {} {}", self.inner.name, kind, vertex);
            Ok(output)
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.scheduler.flush()
    }

    pub fn start_squelching(&self) -> Result<()> {
        self.inner.scheduler.start_squelching()
    }

    pub fn stop_squelching(&self) -> Result<()> {
        self.inner.scheduler.stop_squelching()
    }
}

fn filter_as_transform<C, A>(predicate: FilterFn<C, A>) -> TransformFn<C, A, A>
where
    C: 'static,
    A: 'static,
{
    Arc::new(move |component: &C, data: A| predicate(component, &data).then_some(data))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::core::scheduling::TaskSchedulerType;

    #[derive(Default)]
    struct Adder {
        total: AtomicU64,
    }

    impl WiringComponent for Adder {
        type Output = u64;

        fn declare(handlers: &mut HandlerDeclarations<Self>) {
            handlers
                .handler("add", |adder: &Adder, x: u64| {
                    adder.total.fetch_add(x, Ordering::SeqCst) + x
                })
                .filter("even", |_: &Adder, total: &u64| total % 2 == 0);
        }
    }

    fn direct() -> TaskSchedulerConfiguration {
        TaskSchedulerConfiguration::of_type(TaskSchedulerType::Direct)
    }

    #[test]
    fn test_input_wire_is_singleton() {
        let model = WiringModel::new();
        let wiring = ComponentWiring::<Adder>::new(&model, &direct()).unwrap();
        assert_eq!(wiring.name(), "Adder");

        let first = wiring.input_wire::<u64>("add").unwrap();
        let second = wiring.input_wire::<u64>("add").unwrap();
        assert!(first.ptr_eq(&second));
        assert!(wiring.output_wire().ptr_eq(&wiring.output_wire()));
    }

    #[test]
    fn test_data_before_bind_is_handled_after_bind() {
        let model = WiringModel::new();
        let wiring = ComponentWiring::<Adder>::new(&model, &direct()).unwrap();
        let input = wiring.input_wire::<u64>("add").unwrap();

        input.put(2);
        input.put(3);
        assert!(!input.is_bound());

        let adder = Arc::new(Adder::default());
        wiring.bind_shared(Arc::clone(&adder)).unwrap();
        assert!(input.is_bound());
        assert_eq!(adder.total.load(Ordering::SeqCst), 5);

        assert!(matches!(
            wiring.bind(Adder::default()),
            Err(WiringError::ComponentAlreadyBound(_))
        ));
    }

    #[test]
    fn test_filtered_output_uses_instance() {
        let model = WiringModel::new();
        let wiring = ComponentWiring::<Adder>::new(&model, &direct()).unwrap();
        wiring.bind(Adder::default()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let even = wiring.filtered_output("even").unwrap();
        assert!(even.ptr_eq(&wiring.filtered_output("even").unwrap()));
        even
            .solder_to_consumer("collector", move |x| sink.lock().push(x))
            .unwrap();

        let input = wiring.input_wire::<u64>("add").unwrap();
        for x in [1, 1, 3, 1] {
            input.put(x);
        }
        assert_eq!(*seen.lock(), vec![2, 6]);
    }

    #[test]
    fn test_failed_deferred_bind_does_not_skip_later_wires() {
        let model = WiringModel::new();
        let wiring = ComponentWiring::<Adder>::new(&model, &direct()).unwrap();
        let input = wiring.input_wire::<u64>("add").unwrap();
        let even = wiring.filtered_output("even").unwrap();
        input.bind(|x| x).unwrap();

        assert!(matches!(
            wiring.bind(Adder::default()),
            Err(WiringError::AlreadyBound(_))
        ));
        assert!(wiring.is_bound());
        assert!(!model.check_for_unbound_input_wires());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        even
            .solder_to_consumer("collector", move |x| sink.lock().push(x))
            .unwrap();
        for x in [1, 2, 4] {
            input.put(x);
        }
        assert_eq!(*seen.lock(), vec![2, 4]);
    }

    #[test]
    fn test_lookup_errors() {
        let model = WiringModel::new();
        let wiring = ComponentWiring::<Adder>::new(&model, &direct()).unwrap();
        assert!(matches!(
            wiring.input_wire::<u64>("subtract"),
            Err(WiringError::UndeclaredHandler { .. })
        ));
        assert!(matches!(
            wiring.input_wire::<String>("add"),
            Err(WiringError::SignatureMismatch { .. })
        ));
        assert!(matches!(
            wiring.transformed_output::<String>("even"),
            Err(WiringError::SignatureMismatch { .. })
        ));
    }
}
