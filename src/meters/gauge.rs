//! Gauge meter (spec §4.4).

use crate::atomic::AtomicDouble;
use crate::clock::Clock;
use crate::id::Id;
use crate::measurement::{Measurement, Statistic};
use crate::meters::core::MeterCore;
use std::sync::Arc;

/// A last-writer-wins sampled value.
#[derive(Debug, Clone)]
pub struct Gauge {
    core: Arc<MeterCore>,
    value: Arc<AtomicDouble>,
}

impl Gauge {
    /// Creates a new gauge for `id`, initially unset (NaN).
    pub fn new(id: Id, clock: Clock) -> Self {
        Gauge { core: Arc::new(MeterCore::new(id, clock)), value: Arc::new(AtomicDouble::new(f64::NAN)) }
    }

    /// The gauge's identifier.
    pub fn id(&self) -> &Id {
        self.core.id()
    }

    /// Records `value` as the current sample.
    pub fn set(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.value.set(value);
        self.core.touch();
    }

    /// The last recorded value, or NaN if none since the last harvest.
    pub fn value(&self) -> f64 {
        self.value.get()
    }

    /// `true` if no update has been seen within `ttl_nanos`.
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.core.is_expired(ttl_nanos)
    }

    /// Harvests and resets to NaN, so the next harvest without a new `set`
    /// emits nothing (spec §4.4 "NaN suppresses emission").
    pub fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let value = self.value.get_and_set(f64::NAN);
        if value.is_nan() {
            return Vec::new();
        }
        let id = self.core.id().clone().with_tag("statistic", Statistic::Gauge.as_str());
        vec![Measurement::new(id, timestamp_millis, value, Statistic::Gauge)]
    }
}
