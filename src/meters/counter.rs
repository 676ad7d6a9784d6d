//! Counter meter (spec §4.4).

use crate::atomic::AtomicDouble;
use crate::clock::Clock;
use crate::id::Id;
use crate::measurement::{Measurement, Statistic};
use crate::meters::core::MeterCore;
use std::sync::Arc;

/// A monotonically increasing delta since the last harvest.
#[derive(Debug, Clone)]
pub struct Counter {
    core: Arc<MeterCore>,
    delta: Arc<AtomicDouble>,
}

impl Counter {
    /// Creates a new counter for `id`.
    pub fn new(id: Id, clock: Clock) -> Self {
        Counter { core: Arc::new(MeterCore::new(id, clock)), delta: Arc::new(AtomicDouble::new(0.0)) }
    }

    /// The counter's identifier.
    pub fn id(&self) -> &Id {
        self.core.id()
    }

    /// Adds one.
    pub fn increment(&self) {
        self.add(1.0);
    }

    /// Adds `amount`. NaN and negative amounts are ignored (spec §4.4,
    /// §7 "invalid input on update").
    pub fn add(&self, amount: f64) {
        if amount.is_nan() || amount < 0.0 {
            return;
        }
        self.delta.add_and_get(amount);
        self.core.touch();
    }

    /// `true` if no update has been seen within `ttl_nanos`.
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.core.is_expired(ttl_nanos)
    }

    /// Harvests and resets the accumulated delta. Returns no measurements
    /// when the delta is zero (spec §4.4 "a counter with a zero delta over
    /// a step is omitted").
    pub fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let value = self.delta.get_and_set(0.0);
        if value == 0.0 {
            return Vec::new();
        }
        let id = self.core.id().clone().with_tag("statistic", Statistic::Count.as_str());
        vec![Measurement::new(id, timestamp_millis, value, Statistic::Count)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_nan_amounts_are_ignored() {
        let (clock, _mock) = Clock::mock();
        let counter = Counter::new(Id::new("c"), clock);
        counter.add(-5.0);
        counter.add(f64::NAN);
        counter.increment();
        let measurements = counter.measure(0);
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].value, 1.0);
    }

    #[test]
    fn zero_delta_emits_nothing() {
        let (clock, _mock) = Clock::mock();
        let counter = Counter::new(Id::new("c"), clock);
        assert!(counter.measure(0).is_empty());
    }

    #[test]
    fn measure_resets_the_accumulator() {
        let (clock, _mock) = Clock::mock();
        let counter = Counter::new(Id::new("c"), clock);
        counter.add(10.0);
        let first = counter.measure(0);
        assert_eq!(first[0].value, 10.0);
        assert!(counter.measure(1).is_empty(), "second measure should see zero delta");
    }
}
