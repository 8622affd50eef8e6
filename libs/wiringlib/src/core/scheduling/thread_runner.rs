// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Worker thread loop for queued schedulers.

use std::sync::Arc;

use crate::core::scheduling::SchedulerCore;
use crate::core::scheduling::scheduler::Task;

/// Messages carried on a scheduler's queue.
pub(crate) enum SchedulerMessage {
    /// Run one task.
    Run(Task),
    /// Signal the sender once every message ahead of this one has been taken.
    Flush(crossbeam_channel::Sender<()>),
    /// Exit the worker loop. Messages queued earlier are still handled.
    StopProcessing,
}

/// Run a worker until it receives [`SchedulerMessage::StopProcessing`].
pub(crate) fn run_worker_loop(
    core: Arc<SchedulerCore>,
    message_reader: crossbeam_channel::Receiver<SchedulerMessage>,
    worker_index: usize,
) {
    tracing::debug!(
        "[{}] Worker {} started ({})",
        core.name(),
        worker_index,
        core.scheduler_type()
    );

    loop {
        match message_reader.recv() {
            Ok(SchedulerMessage::Run(task)) => core.execute_queued(task),
            Ok(SchedulerMessage::Flush(done)) => {
                // The flusher may have given up; nothing to do then.
                let _ = done.send(());
            }
            Ok(SchedulerMessage::StopProcessing) => {
                tracing::trace!("[{}] Worker {} received stop", core.name(), worker_index);
                break;
            }
            Err(_) => {
                tracing::trace!("[{}] Worker {} queue disconnected", core.name(), worker_index);
                break;
            }
        }
    }

    tracing::debug!("[{}] Worker {} stopped", core.name(), worker_index);
}
