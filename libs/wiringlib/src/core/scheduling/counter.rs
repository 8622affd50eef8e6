// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Unhandled-task accounting.
//!
//! Every queued scheduler owns an on-ramp counter (incremented when work is
//! submitted) and an off-ramp counter (decremented when a handler returns).
//! Usually both are the same counter. Sharing a counter between several
//! schedulers bounds the total work in flight across all of them.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Counts objects entering and leaving part of the wiring graph.
pub trait ObjectCounter: Send + Sync + fmt::Debug {
    /// Count one object, blocking while the counter is at capacity.
    fn on_ramp(&self);

    /// Count one object if there is room. Returns false without blocking otherwise.
    fn attempt_on_ramp(&self) -> bool;

    /// Count one object regardless of capacity.
    fn force_on_ramp(&self);

    /// Release one object.
    fn off_ramp(&self);

    /// Objects currently counted, or -1 if this counter does not track counts.
    fn count(&self) -> i64;

    /// Block until the count reaches zero.
    fn wait_until_empty(&self);
}

#[derive(Debug, Default)]
struct CountState {
    count: Mutex<i64>,
    changed: Condvar,
}

impl CountState {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count < 0 {
            tracing::warn!("Object counter released more objects than it counted");
        }
        drop(count);
        self.changed.notify_all();
    }

    fn get(&self) -> i64 {
        *self.count.lock()
    }

    fn wait_until_empty(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.changed.wait(&mut count);
        }
    }
}

/// Counter that tracks nothing and never blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObjectCounter;

impl ObjectCounter for NoOpObjectCounter {
    fn on_ramp(&self) {}

    fn attempt_on_ramp(&self) -> bool {
        true
    }

    fn force_on_ramp(&self) {}

    fn off_ramp(&self) {}

    fn count(&self) -> i64 {
        -1
    }

    fn wait_until_empty(&self) {}
}

/// Unbounded counter: tracks the count but never blocks on it.
#[derive(Debug, Default)]
pub struct StandardObjectCounter {
    state: CountState,
}

impl StandardObjectCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectCounter for StandardObjectCounter {
    fn on_ramp(&self) {
        self.state.increment();
    }

    fn attempt_on_ramp(&self) -> bool {
        self.state.increment();
        true
    }

    fn force_on_ramp(&self) {
        self.state.increment();
    }

    fn off_ramp(&self) {
        self.state.decrement();
    }

    fn count(&self) -> i64 {
        self.state.get()
    }

    fn wait_until_empty(&self) {
        self.state.wait_until_empty();
    }
}

/// Bounded counter: `on_ramp` blocks while `capacity` objects are counted.
#[derive(Debug)]
pub struct BackpressureObjectCounter {
    name: String,
    capacity: u64,
    state: CountState,
}

impl BackpressureObjectCounter {
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
            state: CountState::default(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn limit(&self) -> i64 {
        i64::try_from(self.capacity).unwrap_or(i64::MAX)
    }
}

impl ObjectCounter for BackpressureObjectCounter {
    fn on_ramp(&self) {
        let limit = self.limit();
        let mut count = self.state.count.lock();
        if *count >= limit {
            tracing::trace!("[{}] At capacity ({}), waiting", self.name, self.capacity);
        }
        while *count >= limit {
            self.state.changed.wait(&mut count);
        }
        *count += 1;
    }

    fn attempt_on_ramp(&self) -> bool {
        let mut count = self.state.count.lock();
        if *count >= self.limit() {
            return false;
        }
        *count += 1;
        true
    }

    fn force_on_ramp(&self) {
        self.state.increment();
    }

    fn off_ramp(&self) {
        self.state.decrement();
    }

    fn count(&self) -> i64 {
        self.state.get()
    }

    fn wait_until_empty(&self) {
        self.state.wait_until_empty();
    }
}

/// Fans one ramp operation out to several counters.
///
/// The first counter is the primary one and supplies [`ObjectCounter::count`].
#[derive(Debug)]
pub struct MultiObjectCounter {
    counters: Vec<Arc<dyn ObjectCounter>>,
}

impl MultiObjectCounter {
    pub fn new(counters: Vec<Arc<dyn ObjectCounter>>) -> Self {
        Self { counters }
    }
}

impl ObjectCounter for MultiObjectCounter {
    fn on_ramp(&self) {
        for counter in &self.counters {
            counter.on_ramp();
        }
    }

    fn attempt_on_ramp(&self) -> bool {
        for (index, counter) in self.counters.iter().enumerate() {
            if !counter.attempt_on_ramp() {
                for acquired in &self.counters[..index] {
                    acquired.off_ramp();
                }
                return false;
            }
        }
        true
    }

    fn force_on_ramp(&self) {
        for counter in &self.counters {
            counter.force_on_ramp();
        }
    }

    fn off_ramp(&self) {
        for counter in &self.counters {
            counter.off_ramp();
        }
    }

    fn count(&self) -> i64 {
        self.counters.first().map_or(-1, |c| c.count())
    }

    fn wait_until_empty(&self) {
        for counter in &self.counters {
            counter.wait_until_empty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_no_op_counter_is_untracked() {
        let counter = NoOpObjectCounter;
        counter.on_ramp();
        counter.force_on_ramp();
        assert!(counter.attempt_on_ramp());
        assert_eq!(counter.count(), -1);
        counter.wait_until_empty();
    }

    #[test]
    fn test_standard_counter_never_declines() {
        let counter = StandardObjectCounter::new();
        for _ in 0..1000 {
            assert!(counter.attempt_on_ramp());
        }
        assert_eq!(counter.count(), 1000);
        for _ in 0..1000 {
            counter.off_ramp();
        }
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_backpressure_attempt_declines_at_capacity() {
        let counter = BackpressureObjectCounter::new("test", 2);
        assert!(counter.attempt_on_ramp());
        assert!(counter.attempt_on_ramp());
        assert!(!counter.attempt_on_ramp());
        counter.force_on_ramp();
        assert_eq!(counter.count(), 3);
        counter.off_ramp();
        counter.off_ramp();
        assert!(counter.attempt_on_ramp());
    }

    #[test]
    fn test_backpressure_on_ramp_blocks_until_off_ramp() {
        let counter = Arc::new(BackpressureObjectCounter::new("test", 1));
        counter.on_ramp();

        let passed = Arc::new(AtomicBool::new(false));
        let handle = {
            let counter = Arc::clone(&counter);
            let passed = Arc::clone(&passed);
            std::thread::spawn(move || {
                counter.on_ramp();
                passed.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!passed.load(Ordering::SeqCst));

        counter.off_ramp();
        handle.join().unwrap();
        assert!(passed.load(Ordering::SeqCst));
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_wait_until_empty() {
        let counter = Arc::new(StandardObjectCounter::new());
        for _ in 0..3 {
            counter.on_ramp();
        }
        let releaser = {
            let counter = Arc::clone(&counter);
            std::thread::spawn(move || {
                for _ in 0..3 {
                    std::thread::sleep(Duration::from_millis(5));
                    counter.off_ramp();
                }
            })
        };
        counter.wait_until_empty();
        assert_eq!(counter.count(), 0);
        releaser.join().unwrap();
    }

    #[test]
    fn test_multi_counter_rolls_back_partial_attempt() {
        let roomy: Arc<dyn ObjectCounter> = Arc::new(BackpressureObjectCounter::new("roomy", 10));
        let full = Arc::new(BackpressureObjectCounter::new("full", 1));
        full.on_ramp();
        let multi = MultiObjectCounter::new(vec![
            Arc::clone(&roomy),
            full.clone() as Arc<dyn ObjectCounter>,
        ]);

        assert!(!multi.attempt_on_ramp());
        assert_eq!(roomy.count(), 0);
        assert_eq!(full.count(), 1);

        full.off_ramp();
        assert!(multi.attempt_on_ramp());
        assert_eq!(multi.count(), 1);
        assert_eq!(full.count(), 1);
    }
}
