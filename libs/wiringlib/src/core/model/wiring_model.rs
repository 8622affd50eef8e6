// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::core::config::WiringModelConfig;
use crate::core::error::{Result, WiringError};
use crate::core::model::graph::{ModelEdge, ModelGraph, ModelVertex};
use crate::core::model::ModelStatus;
use crate::core::observability::{EdgeSnapshot, ModelSnapshot, SchedulerMetricsSink};
use crate::core::scheduling::{
    HandlerFailure, SchedulerCore, TaskSchedulerBuilder, UncaughtHandler,
    default_uncaught_handler,
};
use crate::core::wires::{InputWireProbe, SolderType};

/// State shared by a model, its schedulers' output wires and every handle.
pub(crate) struct ModelShared {
    config: WiringModelConfig,
    metrics: Option<Arc<dyn SchedulerMetricsSink>>,
    uncaught: UncaughtHandler,
    status: Mutex<ModelStatus>,
    schedulers: RwLock<Vec<Arc<SchedulerCore>>>,
    input_wires: Mutex<Vec<Weak<dyn InputWireProbe>>>,
    edges: Mutex<Vec<ModelEdge>>,
}

impl ModelShared {
    pub(crate) fn config(&self) -> &WiringModelConfig {
        &self.config
    }

    pub(crate) fn metrics_sink(&self) -> Option<Arc<dyn SchedulerMetricsSink>> {
        self.metrics.clone()
    }

    pub(crate) fn uncaught_handler(&self) -> UncaughtHandler {
        Arc::clone(&self.uncaught)
    }

    /// Add a scheduler, starting it straight away if the model is running.
    pub(crate) fn register_scheduler(&self, core: Arc<SchedulerCore>) -> Result<()> {
        let status = self.status.lock();
        {
            let mut schedulers = self.schedulers.write();
            if schedulers.iter().any(|s| s.name() == core.name()) {
                return Err(WiringError::DuplicateScheduler(core.name().to_string()));
            }
            schedulers.push(Arc::clone(&core));
        }
        if *status == ModelStatus::Started {
            core.start()?;
        }
        Ok(())
    }

    pub(crate) fn register_input_wire(&self, probe: Weak<dyn InputWireProbe>) {
        self.input_wires.lock().push(probe);
    }

    pub(crate) fn register_edge(
        &self,
        source: &str,
        target: &str,
        input_wire: &str,
        solder: SolderType,
    ) {
        let edge = ModelEdge {
            source: source.to_string(),
            target: target.to_string(),
            input_wire: input_wire.to_string(),
            solder,
        };
        let mut edges = self.edges.lock();
        if !edges.contains(&edge) {
            edges.push(edge);
        }
    }

    fn unbound_input_wires(&self) -> Vec<String> {
        let mut input_wires = self.input_wires.lock();
        input_wires.retain(|probe| probe.strong_count() > 0);
        input_wires
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|probe| !probe.is_bound())
            .map(|probe| probe.label())
            .collect()
    }

    fn graph(&self) -> ModelGraph {
        let vertices = self
            .schedulers
            .read()
            .iter()
            .map(|core| ModelVertex {
                name: core.name().to_string(),
                scheduler_type: core.scheduler_type(),
                capacity: core.capacity(),
            })
            .collect();
        ModelGraph::build(vertices, &self.edges.lock())
    }
}

/// Builder for [`WiringModel`].
pub struct WiringModelBuilder {
    config: WiringModelConfig,
    metrics: Option<Arc<dyn SchedulerMetricsSink>>,
    uncaught: Option<UncaughtHandler>,
}

impl WiringModelBuilder {
    fn new() -> Self {
        Self {
            config: WiringModelConfig::default(),
            metrics: None,
            uncaught: None,
        }
    }

    pub fn with_config(mut self, config: WiringModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Sink receiving per-task measurements from every scheduler.
    pub fn with_metrics_sink<S: SchedulerMetricsSink + 'static>(mut self, sink: S) -> Self {
        self.metrics = Some(Arc::new(sink));
        self
    }

    /// Uncaught handler used by schedulers that do not set their own.
    pub fn with_uncaught_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        self.uncaught = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> WiringModel {
        WiringModel {
            shared: Arc::new(ModelShared {
                config: self.config,
                metrics: self.metrics,
                uncaught: self.uncaught.unwrap_or_else(default_uncaught_handler),
                status: Mutex::new(ModelStatus::Initial),
                schedulers: RwLock::new(Vec::new()),
                input_wires: Mutex::new(Vec::new()),
                edges: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// The graph of schedulers and wires, and its lifecycle.
///
/// Cloning yields another handle on the same model.
#[derive(Clone)]
pub struct WiringModel {
    shared: Arc<ModelShared>,
}

impl Default for WiringModel {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for WiringModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiringModel")
            .field("status", &self.status())
            .field("schedulers", &self.shared.schedulers.read().len())
            .field("edges", &self.shared.edges.lock().len())
            .finish()
    }
}

impl WiringModel {
    pub fn builder() -> WiringModelBuilder {
        WiringModelBuilder::new()
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn shared(&self) -> &ModelShared {
        &self.shared
    }

    pub(crate) fn downgrade(&self) -> Weak<ModelShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn from_shared(shared: Arc<ModelShared>) -> Self {
        Self { shared }
    }

    pub fn config(&self) -> &WiringModelConfig {
        self.shared.config()
    }

    pub fn status(&self) -> ModelStatus {
        *self.shared.status.lock()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ModelStatus::Started
    }

    /// Start building a scheduler. The name must be unique within the model.
    pub fn scheduler_builder<R: Clone + Send + 'static>(
        &self,
        name: impl Into<String>,
    ) -> TaskSchedulerBuilder<R> {
        TaskSchedulerBuilder::new(self.clone(), name)
    }

    pub fn scheduler_names(&self) -> Vec<String> {
        self.shared
            .schedulers
            .read()
            .iter()
            .map(|core| core.name().to_string())
            .collect()
    }

    /// Start every scheduler's workers.
    ///
    /// Fails if any input wire is still unbound. Graph problems found by the
    /// checks below are logged but do not prevent starting.
    pub fn start(&self) -> Result<()> {
        let mut status = self.shared.status.lock();
        match *status {
            ModelStatus::Initial => {}
            ModelStatus::Started => return Ok(()),
            other => {
                return Err(WiringError::Runtime(format!(
                    "cannot start wiring model in state {:?}",
                    other
                )));
            }
        }

        let unbound = self.shared.unbound_input_wires();
        if !unbound.is_empty() {
            return Err(WiringError::UnboundInputWires(unbound));
        }

        *status = ModelStatus::Starting;
        self.check_for_cyclical_backpressure();
        self.check_for_illegal_direct_scheduler_usage();

        let schedulers: Vec<Arc<SchedulerCore>> = self.shared.schedulers.read().clone();
        for core in &schedulers {
            if let Err(e) = core.start() {
                tracing::error!("[{}] Failed to start: {}", core.name(), e);
                for started in &schedulers {
                    started.stop();
                }
                *status = ModelStatus::Stopped;
                return Err(e);
            }
        }

        *status = ModelStatus::Started;
        tracing::info!("Wiring model started with {} scheduler(s)", schedulers.len());
        Ok(())
    }

    /// Stop every scheduler, upstream first when the graph allows it.
    ///
    /// Queued work is drained before workers exit. Work submitted afterwards
    /// is dropped (puts) or declined (offers).
    pub fn stop(&self) {
        {
            let mut status = self.shared.status.lock();
            if matches!(*status, ModelStatus::Stopping | ModelStatus::Stopped) {
                return;
            }
            *status = ModelStatus::Stopping;
        }

        let schedulers: Vec<Arc<SchedulerCore>> = self.shared.schedulers.read().clone();
        let by_name: HashMap<&str, &Arc<SchedulerCore>> =
            schedulers.iter().map(|core| (core.name(), core)).collect();
        let order = self
            .shared
            .graph()
            .topological_order()
            .unwrap_or_else(|| self.scheduler_names());

        for name in &order {
            if let Some(core) = by_name.get(name.as_str()) {
                core.stop();
            }
        }

        *self.shared.status.lock() = ModelStatus::Stopped;
        tracing::info!("Wiring model stopped");
    }

    /// True if some cycle of PUT edges could deadlock on backpressure.
    ///
    /// Unbounded and NO_OP schedulers, and OFFER or INJECT edges, break cycles.
    pub fn check_for_cyclical_backpressure(&self) -> bool {
        let cycles = self.shared.graph().backpressure_cycles();
        for cycle in &cycles {
            tracing::error!("Cyclical backpressure detected: {}", cycle.join(" -> "));
        }
        !cycles.is_empty()
    }

    /// True if a DIRECT scheduler can be called from a CONCURRENT scheduler or
    /// from more than one queued scheduler.
    pub fn check_for_illegal_direct_scheduler_usage(&self) -> bool {
        let problems = self.shared.graph().illegal_direct_usage();
        for problem in &problems {
            tracing::error!("Illegal direct scheduler usage: {}", problem);
        }
        !problems.is_empty()
    }

    /// True if any input wire has no handler bound.
    pub fn check_for_unbound_input_wires(&self) -> bool {
        let unbound = self.shared.unbound_input_wires();
        for label in &unbound {
            tracing::warn!("Input wire {} is not bound", label);
        }
        !unbound.is_empty()
    }

    /// Mermaid flowchart of schedulers and solder links.
    pub fn generate_wiring_diagram(&self) -> String {
        self.shared.graph().mermaid()
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        let schedulers = self
            .shared
            .schedulers
            .read()
            .iter()
            .map(|core| core.snapshot())
            .collect();
        let edges = self
            .shared
            .edges
            .lock()
            .iter()
            .map(|edge| EdgeSnapshot {
                source: edge.source.clone(),
                target: edge.target.clone(),
                input_wire: edge.input_wire.clone(),
                solder_type: edge.solder,
            })
            .collect();
        ModelSnapshot {
            running: self.is_running(),
            schedulers,
            edges,
        }
    }
}
