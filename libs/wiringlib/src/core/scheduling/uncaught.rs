// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A handler that panicked on a queued scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Scheduler whose handler failed.
    pub scheduler: String,
    /// Panic payload rendered as text.
    pub message: String,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler on {} failed: {}", self.scheduler, self.message)
    }
}

/// Receives handler failures from queued schedulers. Called on the worker thread.
pub type UncaughtHandler = Arc<dyn Fn(&HandlerFailure) + Send + Sync>;

/// Logs the failure and lets the worker carry on.
pub fn default_uncaught_handler() -> UncaughtHandler {
    Arc::new(|failure: &HandlerFailure| {
        tracing::error!(
            "[{}] Uncaught handler failure: {}",
            failure.scheduler,
            failure.message
        );
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");

        let payload = std::panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 7");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(panic_message(&*payload), "non-string panic payload");
    }

    #[test]
    fn test_failure_display() {
        let failure = HandlerFailure {
            scheduler: "hasher".into(),
            message: "boom".into(),
        };
        assert_eq!(failure.to_string(), "handler on hasher failed: boom");
    }
}
