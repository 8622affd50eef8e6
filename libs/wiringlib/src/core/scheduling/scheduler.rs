// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::error::{Result, WiringError, validate_name};
use crate::core::model::WiringModel;
use crate::core::observability::{SchedulerMetricsSink, SchedulerSnapshot, SchedulerStats};
use crate::core::scheduling::counter::ObjectCounter;
use crate::core::scheduling::thread_runner::{SchedulerMessage, run_worker_loop};
use crate::core::scheduling::uncaught::panic_message;
use crate::core::scheduling::{HandlerFailure, TaskSchedulerType, UncaughtHandler};
use crate::core::wires::{InputWire, OutputWire, SolderType};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SchedulerState {
    #[default]
    Initial,
    Started,
    Stopping,
    Stopped,
}

/// Outcome of asking a scheduler to take one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Accepted,
    /// Not taken: OFFER at capacity, scheduler stopped, or NO_OP.
    Rejected,
}

/// Settings resolved by the builder.
pub(crate) struct SchedulerSettings {
    pub name: String,
    pub scheduler_type: TaskSchedulerType,
    pub capacity: Option<u64>,
    pub parallelism: usize,
    pub flushing_enabled: bool,
    pub squelching_enabled: bool,
    pub primary_counter: Arc<dyn ObjectCounter>,
    pub on_ramp: Arc<dyn ObjectCounter>,
    pub off_ramp: Arc<dyn ObjectCounter>,
    pub uncaught: UncaughtHandler,
    pub metrics: Option<Arc<dyn SchedulerMetricsSink>>,
}

/// Type-erased scheduler state shared by the typed handle, its wires and its workers.
pub(crate) struct SchedulerCore {
    name: String,
    scheduler_type: TaskSchedulerType,
    capacity: Option<u64>,
    parallelism: usize,
    flushing_enabled: bool,
    squelching_enabled: bool,
    squelching: AtomicBool,
    accepting: AtomicBool,
    primary_counter: Arc<dyn ObjectCounter>,
    on_ramp: Arc<dyn ObjectCounter>,
    off_ramp: Arc<dyn ObjectCounter>,
    uncaught: UncaughtHandler,
    metrics: Option<Arc<dyn SchedulerMetricsSink>>,
    stats: SchedulerStats,
    message_writer: crossbeam_channel::Sender<SchedulerMessage>,
    message_reader: crossbeam_channel::Receiver<SchedulerMessage>,
    state: Mutex<SchedulerState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    input_wire_names: Mutex<HashSet<String>>,
}

impl fmt::Debug for SchedulerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("name", &self.name)
            .field("scheduler_type", &self.scheduler_type)
            .field("capacity", &self.capacity)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Releases one off-ramp count when dropped, so a panicking direct handler
/// does not leak a count.
struct OffRampGuard<'a>(&'a dyn ObjectCounter);

impl Drop for OffRampGuard<'_> {
    fn drop(&mut self) {
        self.0.off_ramp();
    }
}

impl SchedulerCore {
    pub(crate) fn new(settings: SchedulerSettings) -> Self {
        let (message_writer, message_reader) = crossbeam_channel::unbounded();
        Self {
            name: settings.name,
            scheduler_type: settings.scheduler_type,
            capacity: settings.capacity,
            parallelism: settings.parallelism,
            flushing_enabled: settings.flushing_enabled,
            squelching_enabled: settings.squelching_enabled,
            squelching: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
            primary_counter: settings.primary_counter,
            on_ramp: settings.on_ramp,
            off_ramp: settings.off_ramp,
            uncaught: settings.uncaught,
            metrics: settings.metrics,
            stats: SchedulerStats::default(),
            message_writer,
            message_reader,
            state: Mutex::new(SchedulerState::Initial),
            workers: Mutex::new(Vec::new()),
            input_wire_names: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn scheduler_type(&self) -> TaskSchedulerType {
        self.scheduler_type
    }

    pub(crate) fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    pub(crate) fn unprocessed_task_count(&self) -> i64 {
        self.primary_counter.count()
    }

    pub(crate) fn is_squelching(&self) -> bool {
        self.squelching.load(Ordering::Acquire)
    }

    pub(crate) fn reserve_input_wire_name(&self, wire: &str) -> Result<()> {
        validate_name(wire)?;
        if !self.input_wire_names.lock().insert(wire.to_string()) {
            return Err(WiringError::DuplicateInputWire {
                scheduler: self.name.clone(),
                wire: wire.to_string(),
            });
        }
        Ok(())
    }

    /// Apply the on-ramp rule for `solder` and report whether the item was taken.
    pub(crate) fn admit(&self, solder: SolderType) -> Admission {
        if self.scheduler_type == TaskSchedulerType::NoOp {
            return Admission::Rejected;
        }
        if !self.accepting.load(Ordering::Acquire) {
            tracing::trace!("[{}] Stopped, rejecting {} submission", self.name, solder);
            return Admission::Rejected;
        }

        match solder {
            SolderType::Put => {
                self.on_ramp.on_ramp();
                Admission::Accepted
            }
            SolderType::Offer => {
                if self.on_ramp.attempt_on_ramp() {
                    Admission::Accepted
                } else {
                    tracing::trace!("[{}] At capacity, offer declined", self.name);
                    Admission::Rejected
                }
            }
            SolderType::Inject => {
                self.on_ramp.force_on_ramp();
                Admission::Accepted
            }
        }
    }

    /// Run an admitted unit of work on the calling thread. Panics propagate.
    pub(crate) fn run_inline<F: FnOnce()>(&self, work: F) {
        let _off_ramp = OffRampGuard(self.off_ramp.as_ref());
        let started = Instant::now();
        work();
        self.record_handled(started);
    }

    /// Queue an admitted task for the worker threads.
    pub(crate) fn enqueue(&self, task: Task) {
        if let Err(crossbeam_channel::SendError(message)) =
            self.message_writer.send(SchedulerMessage::Run(task))
        {
            // The core owns the reader, so this only happens during teardown.
            self.discard(message);
        }
    }

    /// Run one queued task on a worker thread.
    pub(crate) fn execute_queued(&self, task: Task) {
        if self.is_squelching() {
            drop(task);
            self.stats.record_discarded();
        } else {
            let started = Instant::now();
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(()) => self.record_handled(started),
                Err(payload) => {
                    self.stats.record_failure();
                    let failure = HandlerFailure {
                        scheduler: self.name.clone(),
                        message: panic_message(&*payload),
                    };
                    // A panicking uncaught handler must not take the worker down.
                    if catch_unwind(AssertUnwindSafe(|| (self.uncaught)(&failure))).is_err() {
                        tracing::error!("[{}] Uncaught handler panicked on: {}", self.name, failure);
                    }
                }
            }
        }

        self.off_ramp.off_ramp();
        if let Some(metrics) = &self.metrics {
            metrics.report_queue_depth(&self.name, self.primary_counter.count());
        }
    }

    fn record_handled(&self, started: Instant) {
        let latency = started.elapsed();
        self.stats.record_handled(latency);
        if let Some(metrics) = &self.metrics {
            metrics.report_task_latency(&self.name, latency);
        }
    }

    fn discard(&self, message: SchedulerMessage) {
        match message {
            SchedulerMessage::Run(task) => {
                drop(task);
                self.stats.record_discarded();
                self.off_ramp.off_ramp();
            }
            SchedulerMessage::Flush(done) => {
                let _ = done.send(());
            }
            SchedulerMessage::StopProcessing => {}
        }
    }

    fn worker_count(&self) -> usize {
        match self.scheduler_type {
            TaskSchedulerType::Sequential => 1,
            TaskSchedulerType::Concurrent => self.parallelism.max(1),
            _ => 0,
        }
    }

    /// Spawn worker threads. No-op unless the scheduler is still initial.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        let mut state = self.state.lock();
        if *state != SchedulerState::Initial {
            return Ok(());
        }

        let mut workers = self.workers.lock();
        for worker_index in 0..self.worker_count() {
            let core = Arc::clone(self);
            let message_reader = self.message_reader.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", self.name, worker_index))
                .spawn(move || run_worker_loop(core, message_reader, worker_index))?;
            workers.push(handle);
        }

        *state = SchedulerState::Started;
        tracing::debug!(
            "[{}] Started {} with {} worker(s)",
            self.name,
            self.scheduler_type,
            workers.len()
        );
        Ok(())
    }

    /// Stop taking work, let workers drain what is queued, then join them.
    pub(crate) fn stop(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SchedulerState::Stopping | SchedulerState::Stopped) {
            return;
        }
        *state = SchedulerState::Stopping;
        drop(state);
        self.accepting.store(false, Ordering::Release);

        let workers = std::mem::take(&mut *self.workers.lock());
        for _ in &workers {
            let _ = self.message_writer.send(SchedulerMessage::StopProcessing);
        }
        for handle in workers {
            if handle.join().is_err() {
                tracing::warn!("[{}] Worker thread panicked", self.name);
            }
        }

        // Anything left was never run: either the scheduler never started, or
        // it raced in behind the stop messages.
        let mut leftover = 0usize;
        while let Ok(message) = self.message_reader.try_recv() {
            if matches!(message, SchedulerMessage::Run(_)) {
                leftover += 1;
            }
            self.discard(message);
        }
        if leftover > 0 {
            tracing::debug!("[{}] Discarded {} unhandled task(s) on stop", self.name, leftover);
        }

        *self.state.lock() = SchedulerState::Stopped;
        tracing::debug!("[{}] Stopped", self.name);
    }

    pub(crate) fn flush(&self) -> Result<()> {
        if !self.flushing_enabled {
            return Err(WiringError::NotSupported(format!(
                "flushing is not enabled on scheduler {}",
                self.name
            )));
        }
        if !self.scheduler_type.is_queued() {
            return Ok(());
        }
        if *self.state.lock() != SchedulerState::Started {
            return Err(WiringError::NotRunning(format!(
                "scheduler {} cannot be flushed before it is started",
                self.name
            )));
        }

        match self.scheduler_type {
            TaskSchedulerType::Sequential => {
                let (done_writer, done_reader) = crossbeam_channel::bounded(1);
                self.message_writer
                    .send(SchedulerMessage::Flush(done_writer))
                    .map_err(|_| WiringError::Runtime(format!("[{}] queue closed", self.name)))?;
                done_reader.recv().map_err(|_| {
                    WiringError::Runtime(format!("[{}] flush abandoned by worker", self.name))
                })
            }
            _ => {
                self.primary_counter.wait_until_empty();
                Ok(())
            }
        }
    }

    pub(crate) fn set_squelching(&self, squelch: bool) -> Result<()> {
        if !self.squelching_enabled {
            return Err(WiringError::NotSupported(format!(
                "squelching is not enabled on scheduler {}",
                self.name
            )));
        }
        self.squelching.store(squelch, Ordering::Release);
        tracing::debug!(
            "[{}] Squelching {}",
            self.name,
            if squelch { "started" } else { "stopped" }
        );
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            name: self.name.clone(),
            scheduler_type: self.scheduler_type,
            capacity: self.capacity,
            unprocessed_task_count: self.unprocessed_task_count(),
            tasks_handled: self.stats.tasks_handled(),
            tasks_discarded: self.stats.tasks_discarded(),
            handler_failures: self.stats.handler_failures(),
            squelching: self.is_squelching(),
            latency: self.stats.latency(),
        }
    }
}

/// Typed handle on a scheduler producing values of type `R`.
///
/// Cloning yields another handle on the same scheduler.
pub struct TaskScheduler<R> {
    core: Arc<SchedulerCore>,
    model: WiringModel,
    output: OutputWire<R>,
}

impl<R> Clone for TaskScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            model: self.model.clone(),
            output: self.output.clone(),
        }
    }
}

impl<R> fmt::Debug for TaskScheduler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskScheduler").field(&self.core).finish()
    }
}

impl<R: Clone + Send + 'static> TaskScheduler<R> {
    pub(crate) fn new(core: Arc<SchedulerCore>, model: WiringModel) -> Self {
        let output = OutputWire::new(model.downgrade(), core.name());
        Self {
            core,
            model,
            output,
        }
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn scheduler_type(&self) -> TaskSchedulerType {
        self.core.scheduler_type()
    }

    /// Unhandled-task capacity, `None` when unbounded.
    pub fn capacity(&self) -> Option<u64> {
        self.core.capacity()
    }

    pub fn model(&self) -> &WiringModel {
        &self.model
    }

    /// The wire carrying every non-empty handler result.
    pub fn output_wire(&self) -> OutputWire<R> {
        self.output.clone()
    }

    /// Create a named input wire feeding this scheduler. Names are unique per scheduler.
    pub fn build_input_wire<T: Send + 'static>(&self, name: &str) -> Result<InputWire<T, R>> {
        self.core.reserve_input_wire_name(name)?;
        let wire = InputWire::new(
            name,
            Arc::clone(&self.core),
            self.output.clone(),
        );
        self.model.shared().register_input_wire(wire.probe());
        tracing::trace!("[{}] Built input wire {}", self.name(), name);
        Ok(wire)
    }

    /// An extra output wire owned by this scheduler, forwarded to by hand.
    pub fn build_secondary_output_wire<S: Clone + Send + 'static>(&self) -> OutputWire<S> {
        OutputWire::new(self.model.downgrade(), self.core.name())
    }

    /// Unhandled tasks (queued plus executing), or -1 when not tracked.
    pub fn unprocessed_task_count(&self) -> i64 {
        self.core.unprocessed_task_count()
    }

    /// Block until all work submitted before the call has been handled.
    pub fn flush(&self) -> Result<()> {
        self.core.flush()
    }

    pub fn start_squelching(&self) -> Result<()> {
        self.core.set_squelching(true)
    }

    pub fn stop_squelching(&self) -> Result<()> {
        self.core.set_squelching(false)
    }

    pub fn is_squelching(&self) -> bool {
        self.core.is_squelching()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.core.snapshot()
    }
}
