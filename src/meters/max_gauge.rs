//! Max-gauge meter (spec §4.4).
//!
//! The source has divergent behavior for whether a max-gauge should ever
//! emit `0` to mean "saw activity but all zero" (spec §9 Open Questions).
//! This implementation takes the strict reading spec §4.4 states alongside
//! it — "values ≤ 0 suppress emission" — and never stores or emits a
//! non-positive value; see `DESIGN.md`.

use crate::atomic::AtomicDouble;
use crate::clock::Clock;
use crate::id::Id;
use crate::measurement::{Measurement, Statistic};
use crate::meters::core::MeterCore;
use std::sync::Arc;

/// Accumulates the maximum positive value observed since the last harvest.
#[derive(Debug, Clone)]
pub struct MaxGauge {
    core: Arc<MeterCore>,
    max: Arc<AtomicDouble>,
}

impl MaxGauge {
    /// Creates a new max-gauge for `id`.
    pub fn new(id: Id, clock: Clock) -> Self {
        MaxGauge { core: Arc::new(MeterCore::new(id, clock)), max: Arc::new(AtomicDouble::new(0.0)) }
    }

    /// The max-gauge's identifier.
    pub fn id(&self) -> &Id {
        self.core.id()
    }

    /// Folds `value` into the running maximum. Non-positive and NaN values
    /// are ignored entirely.
    pub fn update(&self, value: f64) {
        if value.is_nan() || value <= 0.0 {
            return;
        }
        self.max.max(value);
        self.core.touch();
    }

    /// `true` if no update has been seen within `ttl_nanos`.
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.core.is_expired(ttl_nanos)
    }

    /// Harvests and resets the running maximum to zero. Emits nothing when
    /// no positive value was recorded this step.
    pub fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let value = self.max.get_and_set(0.0);
        if value <= 0.0 {
            return Vec::new();
        }
        let id = self.core.id().clone().with_tag("statistic", Statistic::Max.as_str());
        vec![Measurement::new(id, timestamp_millis, value, Statistic::Max)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_updates_suppress_emission() {
        let (clock, _mock) = Clock::mock();
        let gauge = MaxGauge::new(Id::new("m"), clock);
        gauge.update(0.0);
        gauge.update(-5.0);
        assert!(gauge.measure(0).is_empty());
    }

    #[test]
    fn keeps_the_running_maximum() {
        let (clock, _mock) = Clock::mock();
        let gauge = MaxGauge::new(Id::new("m"), clock);
        gauge.update(3.0);
        gauge.update(9.0);
        gauge.update(4.0);
        let measurements = gauge.measure(0);
        assert_eq!(measurements[0].value, 9.0);
    }

    #[test]
    fn resets_after_harvest() {
        let (clock, _mock) = Clock::mock();
        let gauge = MaxGauge::new(Id::new("m"), clock);
        gauge.update(9.0);
        gauge.measure(0);
        assert!(gauge.measure(1).is_empty());
    }
}
