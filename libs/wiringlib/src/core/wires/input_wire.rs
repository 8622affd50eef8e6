// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::core::error::{Result, WiringError};
use crate::core::scheduling::SchedulerCore;
use crate::core::scheduling::scheduler::Admission;
use crate::core::wires::{OutputWire, SolderType};

static NEXT_WIRE_ID: AtomicU64 = AtomicU64::new(1);

type Handler<T, R> = Box<dyn Fn(T) -> Option<R> + Send + Sync>;

/// Typed destination an output wire can hand data to.
pub(crate) trait WireSink<T>: Send + Sync {
    fn wire_id(&self) -> u64;

    fn scheduler_name(&self) -> &str;

    fn wire_name(&self) -> &str;

    /// Submit `data` under `solder`'s rules, handing it back if not taken.
    fn deliver(&self, data: T, solder: SolderType) -> std::result::Result<(), T>;
}

/// Binding status of an input wire, as seen by the model.
pub(crate) trait InputWireProbe: Send + Sync {
    fn is_bound(&self) -> bool;

    fn label(&self) -> String;
}

struct InputWireInner<T, R> {
    id: u64,
    name: String,
    core: Arc<SchedulerCore>,
    output: OutputWire<R>,
    handler: OnceLock<Handler<T, R>>,
    /// Data that reached the handler stage before a handler was bound.
    parked: Mutex<Vec<T>>,
}

impl<T: Send + 'static, R: Clone + Send + 'static> InputWireInner<T, R> {
    fn handle(&self, data: T) {
        let handler = {
            let mut parked = self.parked.lock();
            match self.handler.get() {
                Some(handler) => handler,
                None => {
                    parked.push(data);
                    tracing::trace!(
                        "[{}] Input wire {} not bound yet, holding data ({} held)",
                        self.core.name(),
                        self.name,
                        parked.len()
                    );
                    return;
                }
            }
        };

        if let Some(result) = handler(data) {
            self.output.forward(result);
        }
    }

    fn submit(self: &Arc<Self>, data: T, solder: SolderType) -> std::result::Result<(), T> {
        match self.core.admit(solder) {
            Admission::Rejected => Err(data),
            Admission::Accepted => {
                if self.core.scheduler_type().is_direct() {
                    self.core.run_inline(|| self.handle(data));
                } else {
                    let inner = Arc::clone(self);
                    self.core.enqueue(Box::new(move || inner.handle(data)));
                }
                Ok(())
            }
        }
    }
}

impl<T, R> InputWireProbe for InputWireInner<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn is_bound(&self) -> bool {
        self.handler.get().is_some()
    }

    fn label(&self) -> String {
        format!("{}.{}", self.core.name(), self.name)
    }
}

/// A typed entry point into a scheduler.
///
/// Data submitted here is handled by the bound handler under the owning
/// scheduler's discipline. A non-empty result goes to the scheduler's output
/// wire. Clones refer to the same wire.
pub struct InputWire<T, R> {
    inner: Arc<InputWireInner<T, R>>,
}

impl<T, R> Clone for InputWire<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R> fmt::Debug for InputWire<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputWire")
            .field("scheduler", &self.inner.core.name())
            .field("name", &self.inner.name)
            .field("bound", &self.inner.handler.get().is_some())
            .finish()
    }
}

impl<T: Send + 'static, R: Clone + Send + 'static> InputWire<T, R> {
    pub(crate) fn new(name: &str, core: Arc<SchedulerCore>, output: OutputWire<R>) -> Self {
        Self {
            inner: Arc::new(InputWireInner {
                id: NEXT_WIRE_ID.fetch_add(1, Ordering::Relaxed),
                name: name.to_string(),
                core,
                output,
                handler: OnceLock::new(),
                parked: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn probe(&self) -> Weak<dyn InputWireProbe> {
        let weak: Weak<InputWireInner<T, R>> = Arc::downgrade(&self.inner);
        weak
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn scheduler_name(&self) -> &str {
        self.inner.core.name()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.handler.get().is_some()
    }

    /// True if both handles refer to the same wire.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Bind a handler whose every result is forwarded.
    pub fn bind<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        self.install(Box::new(move |data| Some(handler(data))))
    }

    /// Bind a handler that forwards only `Some` results.
    pub fn bind_optional<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(T) -> Option<R> + Send + Sync + 'static,
    {
        self.install(Box::new(handler))
    }

    /// Bind a handler that never produces output.
    pub fn bind_consumer<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.install(Box::new(move |data| {
            handler(data);
            None
        }))
    }

    fn install(&self, handler: Handler<T, R>) -> Result<()> {
        let parked = {
            let mut parked = self.inner.parked.lock();
            if self.inner.handler.set(handler).is_err() {
                return Err(WiringError::AlreadyBound(self.inner.label()));
            }
            std::mem::take(&mut *parked)
        };

        tracing::debug!(
            "[{}] Bound input wire {} ({} held item(s) released)",
            self.scheduler_name(),
            self.name(),
            parked.len()
        );

        // Held items already passed admission once.
        let direct = self.inner.core.scheduler_type().is_direct();
        for data in parked {
            if direct {
                self.inner.handle(data);
            } else if let Err(data) = self.inner.submit(data, SolderType::Inject) {
                drop(data);
                tracing::debug!(
                    "[{}] Dropped held item for {}: scheduler no longer accepting",
                    self.scheduler_name(),
                    self.name()
                );
            }
        }
        Ok(())
    }

    /// Submit, blocking while the scheduler is at capacity.
    ///
    /// Data put into a stopped or NO_OP scheduler is dropped.
    pub fn put(&self, data: T) {
        if self.inner.submit(data, SolderType::Put).is_err() {
            tracing::trace!("[{}] Put to {} discarded", self.scheduler_name(), self.name());
        }
    }

    /// Submit if there is capacity right now. Returns false if declined.
    pub fn offer(&self, data: T) -> bool {
        self.inner.submit(data, SolderType::Offer).is_ok()
    }

    /// Like [`InputWire::offer`], handing declined data back to the caller.
    pub fn try_offer(&self, data: T) -> std::result::Result<(), T> {
        self.inner.submit(data, SolderType::Offer)
    }

    /// Submit immediately, ignoring capacity.
    pub fn inject(&self, data: T) {
        if self.inner.submit(data, SolderType::Inject).is_err() {
            tracing::trace!("[{}] Inject to {} discarded", self.scheduler_name(), self.name());
        }
    }
}

impl<T: Send + 'static, R: Clone + Send + 'static> WireSink<T> for InputWire<T, R> {
    fn wire_id(&self) -> u64 {
        self.inner.id
    }

    fn scheduler_name(&self) -> &str {
        self.inner.core.name()
    }

    fn wire_name(&self) -> &str {
        &self.inner.name
    }

    fn deliver(&self, data: T, solder: SolderType) -> std::result::Result<(), T> {
        self.inner.submit(data, solder)
    }
}
