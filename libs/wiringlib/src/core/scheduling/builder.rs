// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::config::TaskSchedulerConfiguration;
use crate::core::error::{Result, WiringError, validate_name};
use crate::core::model::WiringModel;
use crate::core::scheduling::counter::{
    BackpressureObjectCounter, MultiObjectCounter, NoOpObjectCounter, ObjectCounter,
    StandardObjectCounter,
};
use crate::core::scheduling::scheduler::{SchedulerCore, SchedulerSettings};
use crate::core::scheduling::{HandlerFailure, TaskScheduler, TaskSchedulerType, UncaughtHandler};

/// Builder for [`TaskScheduler`]. Obtained from [`WiringModel::scheduler_builder`].
///
/// Settings found under the scheduler's name in the model configuration are
/// applied last and override values set in code.
pub struct TaskSchedulerBuilder<R> {
    model: WiringModel,
    name: String,
    scheduler_type: TaskSchedulerType,
    capacity: Option<u64>,
    parallelism: Option<usize>,
    flushing_enabled: bool,
    squelching_enabled: bool,
    on_ramp: Option<Arc<dyn ObjectCounter>>,
    off_ramp: Option<Arc<dyn ObjectCounter>>,
    uncaught: Option<UncaughtHandler>,
    _output: PhantomData<fn() -> R>,
}

impl<R: Clone + Send + 'static> TaskSchedulerBuilder<R> {
    pub(crate) fn new(model: WiringModel, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
            scheduler_type: TaskSchedulerType::default(),
            capacity: None,
            parallelism: None,
            flushing_enabled: false,
            squelching_enabled: false,
            on_ramp: None,
            off_ramp: None,
            uncaught: None,
            _output: PhantomData,
        }
    }

    pub fn with_type(mut self, scheduler_type: TaskSchedulerType) -> Self {
        self.scheduler_type = scheduler_type;
        self
    }

    /// Bound the number of unhandled tasks. Ignored by non-queued schedulers.
    pub fn with_unhandled_task_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Worker threads for a CONCURRENT scheduler.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    pub fn with_flushing_enabled(mut self, enabled: bool) -> Self {
        self.flushing_enabled = enabled;
        self
    }

    pub fn with_squelching_enabled(mut self, enabled: bool) -> Self {
        self.squelching_enabled = enabled;
        self
    }

    /// Extra counter incremented whenever work enters this scheduler.
    pub fn with_on_ramp(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.on_ramp = Some(counter);
        self
    }

    /// Extra counter decremented whenever this scheduler finishes a task.
    pub fn with_off_ramp(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.off_ramp = Some(counter);
        self
    }

    pub fn with_uncaught_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        self.uncaught = Some(Arc::new(handler));
        self
    }

    /// Apply every field set in `config`.
    pub fn configure(mut self, config: &TaskSchedulerConfiguration) -> Self {
        if let Some(scheduler_type) = config.scheduler_type {
            self.scheduler_type = scheduler_type;
        }
        if let Some(capacity) = config.unhandled_task_capacity {
            self.capacity = Some(capacity);
        }
        if let Some(parallelism) = config.parallelism {
            self.parallelism = Some(parallelism);
        }
        if let Some(flushing) = config.flushing_enabled {
            self.flushing_enabled = flushing;
        }
        if let Some(squelching) = config.squelching_enabled {
            self.squelching_enabled = squelching;
        }
        self
    }

    pub fn build(mut self) -> Result<TaskScheduler<R>> {
        validate_name(&self.name)?;

        if let Some(config) = self.model.config().scheduler(&self.name).cloned() {
            tracing::debug!("[{}] Applying configured override: {}", self.name, config);
            self = self.configure(&config);
        }

        let scheduler_type = self.scheduler_type;
        if self.squelching_enabled && !scheduler_type.is_queued() {
            return Err(WiringError::Configuration(format!(
                "scheduler {}: squelching requires a SEQUENTIAL or CONCURRENT scheduler, not {}",
                self.name, scheduler_type
            )));
        }
        if self.capacity == Some(0) && scheduler_type.is_queued() {
            return Err(WiringError::Configuration(format!(
                "scheduler {}: unhandled task capacity must be positive",
                self.name
            )));
        }

        let capacity = if scheduler_type.is_queued() {
            self.capacity
        } else {
            if self.capacity.is_some() {
                tracing::debug!(
                    "[{}] Capacity ignored for {} scheduler",
                    self.name,
                    scheduler_type
                );
            }
            None
        };

        let primary_counter: Arc<dyn ObjectCounter> = match (scheduler_type.is_queued(), capacity)
        {
            (true, Some(capacity)) => {
                Arc::new(BackpressureObjectCounter::new(self.name.clone(), capacity))
            }
            (true, None) => Arc::new(StandardObjectCounter::new()),
            (false, _) => Arc::new(NoOpObjectCounter),
        };
        let on_ramp = combine(&primary_counter, self.on_ramp.take());
        let off_ramp = combine(&primary_counter, self.off_ramp.take());

        let parallelism = self
            .parallelism
            .unwrap_or_else(|| self.model.config().effective_parallelism())
            .max(1);

        let uncaught = self
            .uncaught
            .take()
            .unwrap_or_else(|| self.model.shared().uncaught_handler());

        let core = Arc::new(SchedulerCore::new(SchedulerSettings {
            name: self.name.clone(),
            scheduler_type,
            capacity,
            parallelism,
            flushing_enabled: self.flushing_enabled,
            squelching_enabled: self.squelching_enabled,
            primary_counter,
            on_ramp,
            off_ramp,
            uncaught,
            metrics: self.model.shared().metrics_sink(),
        }));

        self.model.shared().register_scheduler(Arc::clone(&core))?;

        tracing::debug!(
            "[{}] Built {} scheduler (capacity: {:?})",
            self.name,
            scheduler_type,
            capacity
        );
        Ok(TaskScheduler::new(core, self.model))
    }
}

fn combine(
    primary: &Arc<dyn ObjectCounter>,
    external: Option<Arc<dyn ObjectCounter>>,
) -> Arc<dyn ObjectCounter> {
    match external {
        Some(external) => Arc::new(MultiObjectCounter::new(vec![Arc::clone(primary), external])),
        None => Arc::clone(primary),
    }
}
