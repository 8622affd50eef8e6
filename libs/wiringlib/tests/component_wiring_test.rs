// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Component wiring: wire identity, binding at any point, derived outputs
//! and routing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use wiringlib::core::{
    ComponentWiring, HandlerDeclarations, RoutableData, TaskSchedulerConfiguration,
    TaskSchedulerType, WiringComponent, WiringError, WiringModel,
};

// =============================================================================
// Test components
// =============================================================================

/// Keeps a running total and reports it after every change.
#[derive(Default)]
struct Accumulator {
    total: AtomicU64,
}

impl WiringComponent for Accumulator {
    type Output = u64;

    fn declare(handlers: &mut HandlerDeclarations<Self>) {
        handlers
            .handler("add", |acc: &Accumulator, x: u64| {
                acc.total.fetch_add(x, Ordering::SeqCst) + x
            })
            .handler("add_text", |acc: &Accumulator, s: String| {
                let x: u64 = s.parse().unwrap_or(0);
                acc.total.fetch_add(x, Ordering::SeqCst) + x
            })
            .optional_handler("reset", |acc: &Accumulator, x: u64| {
                acc.total.store(x, Ordering::SeqCst);
                None
            })
            .trigger("report", |acc: &Accumulator| {
                Some(acc.total.load(Ordering::SeqCst))
            })
            .transformer("describe", |_: &Accumulator, total: u64| {
                Some(format!("total={}", total))
            })
            .filter("large", |_: &Accumulator, total: &u64| *total >= 10);
    }
}

/// Emits each word of a sentence.
struct Tokenizer;

impl WiringComponent for Tokenizer {
    type Output = Vec<String>;

    fn declare(handlers: &mut HandlerDeclarations<Self>) {
        handlers
            .handler("sentence", |_: &Tokenizer, s: String| {
                s.split_whitespace().map(str::to_string).collect()
            })
            .split_filter("long", |_: &Tokenizer, word: &String| word.len() > 3)
            .split_transformer("length", |_: &Tokenizer, word: String| Some(word.len()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    Numbers,
    Words,
}

/// Sends numbers and words to different channels.
struct Dispatcher;

impl WiringComponent for Dispatcher {
    type Output = RoutableData<Channel>;

    fn declare(handlers: &mut HandlerDeclarations<Self>) {
        handlers.handler("raw", |_: &Dispatcher, s: String| match s.parse::<u64>() {
            Ok(n) => RoutableData::new(Channel::Numbers, n),
            Err(_) => RoutableData::new(Channel::Words, s),
        });
    }
}

fn collector<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |x| sink.lock().push(x))
}

fn sequential() -> TaskSchedulerConfiguration {
    TaskSchedulerConfiguration::of_type(TaskSchedulerType::Sequential).with_flushing(true)
}

fn direct() -> TaskSchedulerConfiguration {
    TaskSchedulerConfiguration::of_type(TaskSchedulerType::Direct)
}

// =============================================================================
// Identity and binding
// =============================================================================

#[test]
fn test_wires_are_singletons() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Accumulator>::new(&model, &sequential()).unwrap();

    let add = wiring.input_wire::<u64>("add").unwrap();
    assert!(add.ptr_eq(&wiring.input_wire::<u64>("add").unwrap()));
    assert!(!wiring
        .input_wire::<String>("add_text")
        .unwrap()
        .scheduler_name()
        .is_empty());
    assert!(wiring.output_wire().ptr_eq(&wiring.output_wire()));
    assert!(
        wiring
            .transformed_output::<String>("describe")
            .unwrap()
            .ptr_eq(&wiring.transformed_output::<String>("describe").unwrap())
    );
    assert_eq!(model.scheduler_names().len(), 2);
}

/// Where, relative to building and using the wiring, the instance is bound.
#[derive(Debug, Clone, Copy)]
enum BindLocation {
    BeforeWires,
    AfterWires,
    AfterData,
}

fn run_with_bind_location(location: BindLocation) {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Accumulator>::new(&model, &sequential()).unwrap();
    if let BindLocation::BeforeWires = location {
        wiring.bind(Accumulator::default()).unwrap();
    }

    let add = wiring.input_wire::<u64>("add").unwrap();
    let add_text = wiring.input_wire::<String>("add_text").unwrap();
    let report = wiring.input_wire::<()>("report").unwrap();
    let (described, sink) = collector::<String>();
    wiring
        .transformed_output::<String>("describe")
        .unwrap()
        .solder_to_consumer("describedSink", sink)
        .unwrap();
    if let BindLocation::AfterWires = location {
        wiring.bind(Accumulator::default()).unwrap();
    }

    add.put(1);
    add_text.put("2".to_string());
    report.put(());
    if let BindLocation::AfterData = location {
        wiring.bind(Accumulator::default()).unwrap();
    }

    model.start().unwrap();
    wiring.flush().unwrap();
    assert_eq!(
        *described.lock(),
        vec!["total=1", "total=3", "total=3"],
        "bind location {:?}",
        location
    );
    model.stop();
}

#[test]
fn test_bind_location_does_not_lose_data() {
    for location in [
        BindLocation::BeforeWires,
        BindLocation::AfterWires,
        BindLocation::AfterData,
    ] {
        run_with_bind_location(location);
    }
}

#[test]
fn test_unbound_component_blocks_start() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Accumulator>::new(&model, &sequential()).unwrap();
    wiring.input_wire::<u64>("add").unwrap();
    assert!(matches!(
        model.start(),
        Err(WiringError::UnboundInputWires(_))
    ));

    wiring.bind(Accumulator::default()).unwrap();
    assert!(wiring.is_bound());
    model.start().unwrap();
    assert!(matches!(
        wiring.bind(Accumulator::default()),
        Err(WiringError::ComponentAlreadyBound(_))
    ));
    model.stop();
}

#[test]
fn test_undeclared_and_mismatched_requests_fail() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Accumulator>::new(&model, &direct()).unwrap();

    assert!(matches!(
        wiring.input_wire::<u64>("multiply"),
        Err(WiringError::UndeclaredHandler { .. })
    ));
    assert!(matches!(
        wiring.input_wire::<u32>("add"),
        Err(WiringError::SignatureMismatch { .. })
    ));
    assert!(matches!(
        wiring.filtered_output("describe"),
        Err(WiringError::SignatureMismatch { .. })
    ));
    assert!(matches!(
        wiring.transformed_output::<u64>("describe"),
        Err(WiringError::SignatureMismatch { .. })
    ));
}

#[test]
fn test_custom_name_and_duplicate_wiring() {
    let model = WiringModel::new();
    let first = ComponentWiring::<Accumulator>::with_name(&model, "left", &direct()).unwrap();
    assert_eq!(first.name(), "left");
    assert_eq!(first.scheduler().scheduler_type(), TaskSchedulerType::Direct);

    ComponentWiring::<Accumulator>::new(&model, &direct()).unwrap();
    assert!(matches!(
        ComponentWiring::<Accumulator>::new(&model, &direct()),
        Err(WiringError::DuplicateScheduler(_))
    ));
}

// =============================================================================
// Derived outputs
// =============================================================================

#[test]
fn test_filtered_and_optional_outputs() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Accumulator>::new(&model, &direct()).unwrap();
    wiring.bind(Accumulator::default()).unwrap();

    let (all, all_sink) = collector::<u64>();
    let (large, large_sink) = collector::<u64>();
    wiring
        .output_wire()
        .solder_to_consumer("allSink", all_sink)
        .unwrap();
    wiring
        .filtered_output("large")
        .unwrap()
        .solder_to_consumer("largeSink", large_sink)
        .unwrap();

    let add = wiring.input_wire::<u64>("add").unwrap();
    let reset = wiring.input_wire::<u64>("reset").unwrap();
    add.put(4);
    add.put(7);
    reset.put(0);
    add.put(5);

    assert_eq!(*all.lock(), vec![4, 11, 5]);
    assert_eq!(*large.lock(), vec![11]);
}

#[test]
fn test_split_outputs() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Tokenizer>::new(&model, &direct()).unwrap();

    let (words, words_sink) = collector::<String>();
    let (long, long_sink) = collector::<String>();
    let (lengths, lengths_sink) = collector::<usize>();
    wiring
        .split_output::<String>()
        .unwrap()
        .solder_to_consumer("wordsSink", words_sink)
        .unwrap();
    wiring
        .split_and_filtered_output::<String>("long")
        .unwrap()
        .solder_to_consumer("longSink", long_sink)
        .unwrap();
    wiring
        .split_and_transformed_output::<String, usize>("length")
        .unwrap()
        .solder_to_consumer("lengthsSink", lengths_sink)
        .unwrap();

    let sentence = wiring.input_wire::<String>("sentence").unwrap();
    sentence.put("the quick brown fox".to_string());
    wiring.bind(Tokenizer).unwrap();

    assert_eq!(*words.lock(), vec!["the", "quick", "brown", "fox"]);
    assert_eq!(*long.lock(), vec!["quick", "brown"]);
    assert_eq!(*lengths.lock(), vec![3, 5, 5, 3]);
}

#[test]
fn test_routed_output() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<Dispatcher>::new(&model, &direct()).unwrap();
    wiring.bind(Dispatcher).unwrap();

    let (numbers, numbers_sink) = collector::<u64>();
    let (words, words_sink) = collector::<String>();
    wiring
        .routed_output::<Channel, u64>(Channel::Numbers)
        .unwrap()
        .solder_to_consumer("numbersSink", numbers_sink)
        .unwrap();
    wiring
        .routed_output::<Channel, String>(Channel::Words)
        .unwrap()
        .solder_to_consumer("wordsSink", words_sink)
        .unwrap();
    assert!(matches!(
        wiring.routed_output::<Channel, String>(Channel::Numbers),
        Err(WiringError::RoutedTypeMismatch { .. })
    ));

    let raw = wiring.input_wire::<String>("raw").unwrap();
    for s in ["1", "one", "2"] {
        raw.put(s.to_string());
    }
    assert_eq!(*numbers.lock(), vec![1, 2]);
    assert_eq!(*words.lock(), vec!["one".to_string()]);
}

/// Emits batches of routed values.
struct BatchDispatcher;

impl WiringComponent for BatchDispatcher {
    type Output = Vec<RoutableData<Channel>>;

    fn declare(handlers: &mut HandlerDeclarations<Self>) {
        handlers.handler("batch", |_: &BatchDispatcher, n: u64| {
            vec![
                RoutableData::new(Channel::Numbers, n),
                RoutableData::new(Channel::Words, n.to_string()),
            ]
        });
    }
}

#[test]
fn test_split_and_routed_output() {
    let model = WiringModel::new();
    let wiring = ComponentWiring::<BatchDispatcher>::new(&model, &direct()).unwrap();
    wiring.bind(BatchDispatcher).unwrap();

    let (words, words_sink) = collector::<String>();
    wiring
        .split_and_routed_output::<Channel, String>(Channel::Words)
        .unwrap()
        .solder_to_consumer("wordsSink", words_sink)
        .unwrap();

    wiring.input_wire::<u64>("batch").unwrap().put(42);
    assert_eq!(*words.lock(), vec!["42".to_string()]);
}
