// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reference-counted handles for values fanned out through the wiring.
//!
//! A [`Reservation`] keeps its value alive and counts towards the value's
//! reservation count. Cloning (or [`Reservation::reserve`]) adds a
//! reservation, dropping (or [`Reservation::release`]) removes one. The
//! count can only move through these operations, so each reservation is
//! released exactly once.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Reserved<T> {
    value: T,
    reservations: AtomicUsize,
}

/// One reservation on a shared value.
pub struct Reservation<T> {
    inner: Arc<Reserved<T>>,
}

impl<T> Reservation<T> {
    /// Wrap `value`, returning its first reservation.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Reserved {
                value,
                reservations: AtomicUsize::new(1),
            }),
        }
    }

    /// Take another reservation on the same value.
    pub fn reserve(&self) -> Self {
        self.inner.reservations.fetch_add(1, Ordering::AcqRel);
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Give up this reservation.
    pub fn release(self) {
        drop(self);
    }

    /// Outstanding reservations on the value, including this one.
    pub fn reservation_count(&self) -> usize {
        self.inner.reservations.load(Ordering::Acquire)
    }

    /// Observer that reads the count without holding a reservation.
    pub fn watch(&self) -> ReservationWatch<T> {
        ReservationWatch {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Clone for Reservation<T> {
    fn clone(&self) -> Self {
        self.reserve()
    }
}

impl<T> Drop for Reservation<T> {
    fn drop(&mut self) {
        if self.inner.reservations.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::trace!("Last reservation released");
        }
    }
}

impl<T> Deref for Reservation<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Reservation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation")
            .field("value", &self.inner.value)
            .field("reservations", &self.reservation_count())
            .finish()
    }
}

/// Read-only view of a value's reservation count.
pub struct ReservationWatch<T> {
    inner: Arc<Reserved<T>>,
}

impl<T> ReservationWatch<T> {
    pub fn reservation_count(&self) -> usize {
        self.inner.reservations.load(Ordering::Acquire)
    }

    /// True once every reservation has been released.
    pub fn is_released(&self) -> bool {
        self.reservation_count() == 0
    }
}

impl<T> Clone for ReservationWatch<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let first = Reservation::new(String::from("event"));
        let watch = first.watch();
        assert_eq!(watch.reservation_count(), 1);

        let second = first.reserve();
        let third = second.clone();
        assert_eq!(watch.reservation_count(), 3);
        assert_eq!(third.as_str(), "event");

        first.release();
        drop(second);
        assert_eq!(watch.reservation_count(), 1);
        assert!(!watch.is_released());

        drop(third);
        assert!(watch.is_released());
    }

    #[test]
    fn test_concurrent_reservations_balance() {
        let root = Reservation::new(0u8);
        let watch = root.watch();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let local = root.reserve();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let extra = local.reserve();
                        drop(extra);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(watch.reservation_count(), 1);
        drop(root);
        assert!(watch.is_released());
    }
}
