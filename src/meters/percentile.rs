//! Percentile variants (spec §4.4): a base Timer/DistributionSummary plus
//! lazily allocated per-bucket sub-counters.

use crate::buckets::PercentileBuckets;
use crate::clock::Clock;
use crate::id::Id;
use crate::measurement::{Measurement, Statistic};
use crate::meters::{DistributionSummary, Timer};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn percentile_tag(prefix: char, index: usize) -> String {
    format!("{prefix}{index:04X}")
}

/// A Timer decorated with percentile-bucket sub-counters.
#[derive(Debug, Clone)]
pub struct PercentileTimer {
    base: Timer,
    buckets: Arc<DashMap<usize, AtomicU64>>,
    min_nanos: i64,
    max_nanos: i64,
}

impl PercentileTimer {
    /// Creates a percentile timer clamping recorded durations to
    /// `[min, max]` before bucketing, to cap worst-case cardinality.
    pub fn new(id: Id, clock: Clock, min: Duration, max: Duration) -> Self {
        PercentileTimer {
            base: Timer::new(id, clock),
            buckets: Arc::new(DashMap::new()),
            min_nanos: min.as_nanos().min(i64::MAX as u128) as i64,
            max_nanos: max.as_nanos().min(i64::MAX as u128) as i64,
        }
    }

    /// The timer's identifier.
    pub fn id(&self) -> &Id {
        self.base.id()
    }

    /// Records a duration on the base timer and its owning bucket.
    pub fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos().min(i64::MAX as u128) as i64;
        if nanos < 0 {
            return;
        }
        self.base.record(duration);
        let clamped = nanos.clamp(self.min_nanos, self.max_nanos);
        let index = PercentileBuckets::index_of(clamped);
        self.buckets.entry(index).or_insert_with(|| AtomicU64::new(0)).fetch_add(1, Ordering::AcqRel);
    }

    /// `true` if no update has been seen within `ttl_nanos`.
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.base.is_expired(ttl_nanos)
    }

    /// Harvests the base timer's four measurements plus one `percentile`
    /// measurement per touched bucket.
    pub fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let mut measurements = self.base.measure(timestamp_millis);
        for entry in self.buckets.iter() {
            let count = entry.value().swap(0, Ordering::AcqRel);
            if count == 0 {
                continue;
            }
            let tag = percentile_tag('T', *entry.key());
            let id = self
                .base
                .id()
                .clone()
                .with_tag("statistic", Statistic::Percentile.as_str())
                .with_tag("percentile", tag);
            measurements.push(Measurement::new(id, timestamp_millis, count as f64, Statistic::Percentile));
        }
        measurements
    }
}

/// A DistributionSummary decorated with percentile-bucket sub-counters.
#[derive(Debug, Clone)]
pub struct PercentileDistributionSummary {
    base: DistributionSummary,
    buckets: Arc<DashMap<usize, AtomicU64>>,
    min: i64,
    max: i64,
}

impl PercentileDistributionSummary {
    /// Creates a percentile summary clamping recorded amounts to
    /// `[min, max]` before bucketing.
    pub fn new(id: Id, clock: Clock, min: i64, max: i64) -> Self {
        PercentileDistributionSummary {
            base: DistributionSummary::new(id, clock),
            buckets: Arc::new(DashMap::new()),
            min,
            max,
        }
    }

    /// The summary's identifier.
    pub fn id(&self) -> &Id {
        self.base.id()
    }

    /// Records an amount on the base summary and its owning bucket.
    pub fn record(&self, amount: f64) {
        if amount.is_nan() || amount < 0.0 {
            return;
        }
        self.base.record(amount);
        let clamped = (amount as i64).clamp(self.min, self.max);
        let index = PercentileBuckets::index_of(clamped);
        self.buckets.entry(index).or_insert_with(|| AtomicU64::new(0)).fetch_add(1, Ordering::AcqRel);
    }

    /// `true` if no update has been seen within `ttl_nanos`.
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.base.is_expired(ttl_nanos)
    }

    /// Harvests the base summary's four measurements plus one `percentile`
    /// measurement per touched bucket.
    pub fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let mut measurements = self.base.measure(timestamp_millis);
        for entry in self.buckets.iter() {
            let count = entry.value().swap(0, Ordering::AcqRel);
            if count == 0 {
                continue;
            }
            let tag = percentile_tag('D', *entry.key());
            let id = self
                .base
                .id()
                .clone()
                .with_tag("statistic", Statistic::Percentile.as_str())
                .with_tag("percentile", tag);
            measurements.push(Measurement::new(id, timestamp_millis, count as f64, Statistic::Percentile));
        }
        measurements
    }
}
