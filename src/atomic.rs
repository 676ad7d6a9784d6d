//! Atomic numeric primitives (spec §4.2).

use std::sync::atomic::{AtomicU64, Ordering};

/// An atomic `f64`, stored as its bit pattern in an [`AtomicU64`].
///
/// Mirrors the compare-and-swap idiom `metrics`'s own `GaugeFn` impl for
/// `AtomicU64` uses (`metrics/src/atomics.rs`), generalized with the extra
/// operations spec §4.2 requires (`max`, `get_and_set`).
#[derive(Debug, Default)]
pub struct AtomicDouble(AtomicU64);

impl AtomicDouble {
    /// Creates a new atomic double initialized to `value`.
    pub fn new(value: f64) -> Self {
        AtomicDouble(AtomicU64::new(value.to_bits()))
    }

    /// Loads the current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Stores `value` unconditionally.
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Compares the current bit pattern against `current` and swaps in
    /// `new` if they match. Returns the previous value.
    pub fn compare_and_set(&self, current: f64, new: f64) -> bool {
        self.0
            .compare_exchange(current.to_bits(), new.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stores `value` and returns the previous one.
    pub fn get_and_set(&self, value: f64) -> f64 {
        f64::from_bits(self.0.swap(value.to_bits(), Ordering::AcqRel))
    }

    /// Adds `delta` to the current value and returns the new value.
    pub fn add_and_get(&self, delta: f64) -> f64 {
        loop {
            let current_bits = self.0.load(Ordering::Acquire);
            let current = f64::from_bits(current_bits);
            let next = current + delta;
            if self
                .0
                .compare_exchange_weak(current_bits, next.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return next;
            }
        }
    }

    /// Sets the current value to `max(current, value)`, as a CAS loop so
    /// concurrent updates never lose the running maximum.
    pub fn max(&self, value: f64) {
        loop {
            let current_bits = self.0.load(Ordering::Acquire);
            let current = f64::from_bits(current_bits);
            if value <= current {
                return;
            }
            if self
                .0
                .compare_exchange_weak(current_bits, value.to_bits(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn basic_get_set() {
        let d = AtomicDouble::new(1.5);
        assert_eq!(d.get(), 1.5);
        d.set(2.5);
        assert_eq!(d.get(), 2.5);
    }

    #[test]
    fn get_and_set_returns_previous() {
        let d = AtomicDouble::new(1.0);
        assert_eq!(d.get_and_set(9.0), 1.0);
        assert_eq!(d.get(), 9.0);
    }

    #[test]
    fn add_and_get_accumulates() {
        let d = AtomicDouble::new(0.0);
        assert_eq!(d.add_and_get(5.0), 5.0);
        assert_eq!(d.add_and_get(2.5), 7.5);
    }

    #[test]
    fn max_never_loses_concurrent_maximum() {
        let d = Arc::new(AtomicDouble::new(0.0));
        let mut handles = Vec::new();
        for i in 1..=100 {
            let d = Arc::clone(&d);
            handles.push(thread::spawn(move || d.max(i as f64)));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(d.get(), 100.0);
    }

    #[test]
    fn compare_and_set_fails_on_mismatch() {
        let d = AtomicDouble::new(1.0);
        assert!(!d.compare_and_set(2.0, 3.0));
        assert_eq!(d.get(), 1.0);
        assert!(d.compare_and_set(1.0, 3.0));
        assert_eq!(d.get(), 3.0);
    }
}
