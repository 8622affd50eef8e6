// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::error::{Result, WiringError};

/// A component that can be wired with [`ComponentWiring`](super::ComponentWiring).
///
/// Handlers receive `&Self` and may be called from worker threads, so
/// components keep mutable state behind their own synchronization.
pub trait WiringComponent: Send + Sync + Sized + 'static {
    /// Type emitted on the component's primary output wire.
    type Output: Clone + Send + 'static;

    /// Register every handler, transformer and filter by name.
    fn declare(handlers: &mut HandlerDeclarations<Self>);

    /// Scheduler name. Defaults to the type's name without its module path.
    fn component_name() -> String {
        simple_type_name::<Self>()
    }
}

pub(crate) fn simple_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

pub(crate) type InputFn<C, T, R> = Arc<dyn Fn(&C, T) -> Option<R> + Send + Sync>;
pub(crate) type TransformFn<C, A, S> = Arc<dyn Fn(&C, A) -> Option<S> + Send + Sync>;
pub(crate) type FilterFn<C, A> = Arc<dyn Fn(&C, &A) -> bool + Send + Sync>;

/// Output vertex names [`ComponentWiring`](super::ComponentWiring) builds for itself.
const RESERVED_VERTEX_NAMES: [&str; 3] = ["split", "router", "split_router"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclarationKind {
    Input,
    Transformer,
    Filter,
    SplitTransformer,
    SplitFilter,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input handler",
            Self::Transformer => "output transformer",
            Self::Filter => "output filter",
            Self::SplitTransformer => "split transformer",
            Self::SplitFilter => "split filter",
        })
    }
}

struct Declaration {
    kind: DeclarationKind,
    signature: String,
    function: Box<dyn Any + Send + Sync>,
}

/// Named handlers a component exposes, collected by [`WiringComponent::declare`].
pub struct HandlerDeclarations<C> {
    component: String,
    entries: HashMap<String, Declaration>,
    duplicates: Vec<String>,
    reserved: Vec<String>,
    _component: PhantomData<fn(&C)>,
}

impl<C: WiringComponent> HandlerDeclarations<C> {
    pub(crate) fn collect(component: &str) -> Result<Self> {
        let mut declarations = Self {
            component: component.to_string(),
            entries: HashMap::new(),
            duplicates: Vec::new(),
            reserved: Vec::new(),
            _component: PhantomData,
        };
        C::declare(&mut declarations);

        if let Some(name) = declarations.duplicates.first() {
            return Err(WiringError::DuplicateDeclaration {
                component: declarations.component.clone(),
                name: name.clone(),
            });
        }
        if let Some(name) = declarations.reserved.first() {
            return Err(WiringError::ReservedDeclaration {
                component: declarations.component.clone(),
                name: name.clone(),
            });
        }
        tracing::trace!(
            "[{}] Collected {} declaration(s)",
            declarations.component,
            declarations.entries.len()
        );
        Ok(declarations)
    }

    fn insert<F: Any + Send + Sync>(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        signature: String,
        function: F,
    ) -> &mut Self {
        // Output-side declarations become vertices named `<component>_<name>`.
        if kind != DeclarationKind::Input && RESERVED_VERTEX_NAMES.contains(&name) {
            self.reserved.push(name.to_string());
        } else if self.entries.contains_key(name) {
            self.duplicates.push(name.to_string());
        } else {
            self.entries.insert(
                name.to_string(),
                Declaration {
                    kind,
                    signature,
                    function: Box::new(function),
                },
            );
        }
        self
    }

    /// Input handler whose every result goes to the output wire.
    pub fn handler<T, F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&C, T) -> C::Output + Send + Sync + 'static,
    {
        let function: InputFn<C, T, C::Output> = Arc::new(move |c: &C, t: T| Some(handler(c, t)));
        self.insert(name, DeclarationKind::Input, input_signature::<T>(), function)
    }

    /// Input handler that forwards only `Some` results.
    pub fn optional_handler<T, F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&C, T) -> Option<C::Output> + Send + Sync + 'static,
    {
        let function: InputFn<C, T, C::Output> = Arc::new(handler);
        self.insert(name, DeclarationKind::Input, input_signature::<T>(), function)
    }

    /// Input handler with no output.
    pub fn consumer<T, F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn(&C, T) + Send + Sync + 'static,
    {
        let function: InputFn<C, T, C::Output> = Arc::new(move |c: &C, t: T| {
            handler(c, t);
            None
        });
        self.insert(name, DeclarationKind::Input, input_signature::<T>(), function)
    }

    /// Input handler taking no data; its wire has type `InputWire<(), Output>`.
    pub fn trigger<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&C) -> Option<C::Output> + Send + Sync + 'static,
    {
        let function: InputFn<C, (), C::Output> = Arc::new(move |c: &C, _: ()| handler(c));
        self.insert(name, DeclarationKind::Input, input_signature::<()>(), function)
    }

    /// Transformer applied to the component's output.
    pub fn transformer<S, F>(&mut self, name: &str, transform: F) -> &mut Self
    where
        S: Clone + Send + 'static,
        F: Fn(&C, C::Output) -> Option<S> + Send + Sync + 'static,
    {
        let function: TransformFn<C, C::Output, S> = Arc::new(transform);
        let signature = transform_signature::<C::Output, S>();
        self.insert(name, DeclarationKind::Transformer, signature, function)
    }

    /// Filter applied to the component's output.
    pub fn filter<F>(&mut self, name: &str, predicate: F) -> &mut Self
    where
        F: Fn(&C, &C::Output) -> bool + Send + Sync + 'static,
    {
        let function: FilterFn<C, C::Output> = Arc::new(predicate);
        let signature = filter_signature::<C::Output>();
        self.insert(name, DeclarationKind::Filter, signature, function)
    }

    /// Transformer applied to each element of the split output.
    pub fn split_transformer<E, S, F>(&mut self, name: &str, transform: F) -> &mut Self
    where
        E: Send + 'static,
        S: Clone + Send + 'static,
        F: Fn(&C, E) -> Option<S> + Send + Sync + 'static,
    {
        let function: TransformFn<C, E, S> = Arc::new(transform);
        let signature = transform_signature::<E, S>();
        self.insert(name, DeclarationKind::SplitTransformer, signature, function)
    }

    /// Filter applied to each element of the split output.
    pub fn split_filter<E, F>(&mut self, name: &str, predicate: F) -> &mut Self
    where
        E: Send + 'static,
        F: Fn(&C, &E) -> bool + Send + Sync + 'static,
    {
        let function: FilterFn<C, E> = Arc::new(predicate);
        let signature = filter_signature::<E>();
        self.insert(name, DeclarationKind::SplitFilter, signature, function)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Fetch a declared function, checking its kind and type.
    pub(crate) fn lookup<F: Any + Clone>(
        &self,
        name: &str,
        kind: DeclarationKind,
        requested: String,
    ) -> Result<F> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| WiringError::UndeclaredHandler {
                component: self.component.clone(),
                name: name.to_string(),
            })?;

        if entry.kind == kind {
            if let Some(function) = entry.function.downcast_ref::<F>() {
                return Ok(function.clone());
            }
        }

        Err(WiringError::SignatureMismatch {
            component: self.component.clone(),
            name: name.to_string(),
            declared: format!("{} {}", entry.kind, entry.signature),
            requested: format!("{} {}", kind, requested),
        })
    }
}

pub(crate) fn input_signature<T>() -> String {
    format!("({})", type_name::<T>())
}

pub(crate) fn transform_signature<A, S>() -> String {
    format!("({}) -> {}", type_name::<A>(), type_name::<S>())
}

pub(crate) fn filter_signature<A>() -> String {
    format!("(&{}) -> bool", type_name::<A>())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    impl WiringComponent for Counter {
        type Output = u64;

        fn declare(handlers: &mut HandlerDeclarations<Self>) {
            handlers
                .handler("add", |_: &Counter, x: u64| x + 1)
                .consumer("log", |_: &Counter, _: String| {})
                .filter("non_zero", |_: &Counter, x: &u64| *x != 0);
        }
    }

    struct Twice;

    impl WiringComponent for Twice {
        type Output = ();

        fn declare(handlers: &mut HandlerDeclarations<Self>) {
            handlers
                .consumer("x", |_: &Twice, _: u8| {})
                .consumer("x", |_: &Twice, _: u16| {});
        }
    }

    struct Shadowing;

    impl WiringComponent for Shadowing {
        type Output = Vec<u8>;

        fn declare(handlers: &mut HandlerDeclarations<Self>) {
            handlers
                .consumer("router", |_: &Shadowing, _: u8| {})
                .transformer("split", |_: &Shadowing, bytes: Vec<u8>| Some(bytes.len()));
        }
    }

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name::<Counter>(), "Counter");
        assert_eq!(simple_type_name::<Vec<String>>(), "Vec");
        assert_eq!(Counter::component_name(), "Counter");
    }

    #[test]
    fn test_lookup_checks_kind_and_type() {
        let declarations = HandlerDeclarations::<Counter>::collect("Counter").unwrap();

        let add: InputFn<Counter, u64, u64> = declarations
            .lookup("add", DeclarationKind::Input, input_signature::<u64>())
            .unwrap();
        assert_eq!(add(&Counter, 1), Some(2));

        let wrong_type = declarations.lookup::<InputFn<Counter, u32, u64>>(
            "add",
            DeclarationKind::Input,
            input_signature::<u32>(),
        );
        assert!(matches!(wrong_type, Err(WiringError::SignatureMismatch { .. })));

        let wrong_kind = declarations.lookup::<FilterFn<Counter, u64>>(
            "add",
            DeclarationKind::Filter,
            filter_signature::<u64>(),
        );
        assert!(matches!(wrong_kind, Err(WiringError::SignatureMismatch { .. })));

        let missing = declarations.lookup::<InputFn<Counter, u64, u64>>(
            "subtract",
            DeclarationKind::Input,
            input_signature::<u64>(),
        );
        assert!(matches!(missing, Err(WiringError::UndeclaredHandler { .. })));
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let err = HandlerDeclarations::<Twice>::collect("Twice").err().unwrap();
        assert!(matches!(err, WiringError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn test_derived_wire_names_rejected_for_outputs() {
        let err = HandlerDeclarations::<Shadowing>::collect("Shadowing").err().unwrap();
        match err {
            WiringError::ReservedDeclaration { component, name } => {
                assert_eq!(component, "Shadowing");
                assert_eq!(name, "split");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
