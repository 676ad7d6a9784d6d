//! Distribution summary meter (spec §4.4) — like [`super::timer::Timer`]
//! but over unitless amounts rather than durations.

use crate::atomic::AtomicDouble;
use crate::clock::Clock;
use crate::id::Id;
use crate::measurement::{Measurement, Statistic};
use crate::meters::core::MeterCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Records unitless amounts, harvesting
/// `count`/`totalAmount`/`totalOfSquares`/`max` each step.
#[derive(Debug, Clone)]
pub struct DistributionSummary {
    core: Arc<MeterCore>,
    count: Arc<AtomicU64>,
    total_amount: Arc<AtomicDouble>,
    total_of_squares: Arc<AtomicDouble>,
    max: Arc<AtomicDouble>,
}

impl DistributionSummary {
    /// Creates a new distribution summary for `id`.
    pub fn new(id: Id, clock: Clock) -> Self {
        DistributionSummary {
            core: Arc::new(MeterCore::new(id, clock)),
            count: Arc::new(AtomicU64::new(0)),
            total_amount: Arc::new(AtomicDouble::new(0.0)),
            total_of_squares: Arc::new(AtomicDouble::new(0.0)),
            max: Arc::new(AtomicDouble::new(0.0)),
        }
    }

    /// The summary's identifier.
    pub fn id(&self) -> &Id {
        self.core.id()
    }

    /// Records `amount`. Negative amounts are ignored; zero is counted but
    /// contributes nothing to the totals.
    pub fn record(&self, amount: f64) {
        if amount.is_nan() || amount < 0.0 {
            return;
        }
        self.count.fetch_add(1, Ordering::AcqRel);
        if amount > 0.0 {
            self.total_amount.add_and_get(amount);
            self.total_of_squares.add_and_get(amount * amount);
            self.max.max(amount);
        }
        self.core.touch();
    }

    /// `true` if no update has been seen within `ttl_nanos`.
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.core.is_expired(ttl_nanos)
    }

    /// Harvests and resets all four accumulators. Emits nothing if `count`
    /// was zero this step.
    pub fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let count = self.count.swap(0, Ordering::AcqRel);
        if count == 0 {
            return Vec::new();
        }
        let total = self.total_amount.get_and_set(0.0);
        let squares = self.total_of_squares.get_and_set(0.0);
        let max = self.max.get_and_set(0.0);

        let base = self.core.id();
        vec![
            Measurement::new(
                base.clone().with_tag("statistic", Statistic::Count.as_str()),
                timestamp_millis,
                count as f64,
                Statistic::Count,
            ),
            Measurement::new(
                base.clone().with_tag("statistic", Statistic::TotalAmount.as_str()),
                timestamp_millis,
                total,
                Statistic::TotalAmount,
            ),
            Measurement::new(
                base.clone().with_tag("statistic", Statistic::TotalOfSquares.as_str()),
                timestamp_millis,
                squares,
                Statistic::TotalOfSquares,
            ),
            Measurement::new(
                base.clone().with_tag("statistic", Statistic::Max.as_str()),
                timestamp_millis,
                max,
                Statistic::Max,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reconstructs_population_stddev_from_spec_scenario_three() {
        let (clock, _mock) = Clock::mock();
        let summary = DistributionSummary::new(Id::new("d"), clock);
        let values = [0.1, 0.2, 0.7, 0.8, 0.1, 0.4, 0.6, 0.9, 0.1, 1.0, 0.0, 0.5, 0.4];
        for v in values {
            summary.record(v);
        }
        let measurements = summary.measure(0);
        let n = measurements[0].value;
        let total = measurements[1].value;
        let total_of_squares = measurements[2].value;

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let population_variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let population_stddev = population_variance.sqrt();

        let reconstructed_variance = (n * total_of_squares - total * total) / (n * n);
        let reconstructed_stddev = reconstructed_variance.sqrt();

        assert_eq!(n, values.len() as f64);
        assert_relative_eq!(reconstructed_stddev, population_stddev, epsilon = 1e-12);
    }

    #[test]
    fn negative_amounts_are_ignored() {
        let (clock, _mock) = Clock::mock();
        let summary = DistributionSummary::new(Id::new("d"), clock);
        summary.record(-1.0);
        assert!(summary.measure(0).is_empty());
    }
}
