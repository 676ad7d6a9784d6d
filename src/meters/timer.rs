//! Timer meter (spec §4.4).

use crate::atomic::AtomicDouble;
use crate::clock::Clock;
use crate::id::Id;
use crate::measurement::{Measurement, Statistic};
use crate::meters::core::MeterCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Records durations, harvesting `count`/`totalTime`/`totalOfSquares`/`max`
/// each step.
///
/// `totalOfSquares` accumulates in seconds² as an `f64` rather than
/// nanoseconds² as a wide integer, per spec §4.4's "survives long runs
/// without overflow" requirement — seconds-scale values keep the square
/// well within `f64`'s exponent range for any realistic duration.
#[derive(Debug, Clone)]
pub struct Timer {
    core: Arc<MeterCore>,
    count: Arc<AtomicU64>,
    total_seconds: Arc<AtomicDouble>,
    total_of_squares: Arc<AtomicDouble>,
    max_seconds: Arc<AtomicDouble>,
}

impl Timer {
    /// Creates a new timer for `id`.
    pub fn new(id: Id, clock: Clock) -> Self {
        Timer {
            core: Arc::new(MeterCore::new(id, clock)),
            count: Arc::new(AtomicU64::new(0)),
            total_seconds: Arc::new(AtomicDouble::new(0.0)),
            total_of_squares: Arc::new(AtomicDouble::new(0.0)),
            max_seconds: Arc::new(AtomicDouble::new(0.0)),
        }
    }

    /// The timer's identifier.
    pub fn id(&self) -> &Id {
        self.core.id()
    }

    /// Records a duration. Negative durations are ignored; zero is counted
    /// but contributes nothing to the totals (spec §8 boundary behavior).
    pub fn record(&self, duration: Duration) {
        self.record_nanos(duration.as_nanos().min(i64::MAX as u128) as i64);
    }

    /// Records a duration given as (possibly negative) nanoseconds.
    pub fn record_nanos(&self, nanos: i64) {
        if nanos < 0 {
            return;
        }
        let seconds = nanos as f64 / 1_000_000_000.0;
        self.count.fetch_add(1, Ordering::AcqRel);
        if seconds > 0.0 {
            self.total_seconds.add_and_get(seconds);
            self.total_of_squares.add_and_get(seconds * seconds);
            self.max_seconds.max(seconds);
        }
        self.core.touch();
    }

    /// Times `f`, recording the elapsed monotonic duration on every exit
    /// path, including unwinding (spec §9 "timed blocks via closures").
    pub fn record_closure<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Recorder<'a> {
            timer: &'a Timer,
            start_nanos: u64,
        }
        impl Drop for Recorder<'_> {
            fn drop(&mut self) {
                let elapsed = self.timer.core.clock().now_nanos().saturating_sub(self.start_nanos);
                self.timer.record_nanos(elapsed as i64);
            }
        }
        let _guard = Recorder { timer: self, start_nanos: self.core.clock().now_nanos() };
        f()
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
        let total = self.total_seconds.get_and_set(0.0);
        let squares = self.total_of_squares.get_and_set(0.0);
        let max = self.max_seconds.get_and_set(0.0);

        let base = self.core.id();
        vec![
            Measurement::new(
                base.clone().with_tag("statistic", Statistic::Count.as_str()),
                timestamp_millis,
                count as f64,
                Statistic::Count,
            ),
            Measurement::new(
                base.clone().with_tag("statistic", Statistic::TotalTime.as_str()),
                timestamp_millis,
                total,
                Statistic::TotalTime,
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
    fn negative_durations_are_ignored() {
        let (clock, _mock) = Clock::mock();
        let timer = Timer::new(Id::new("t"), clock);
        timer.record_nanos(-1);
        assert!(timer.measure(0).is_empty());
    }

    #[test]
    fn zero_duration_counts_but_contributes_nothing() {
        let (clock, _mock) = Clock::mock();
        let timer = Timer::new(Id::new("t"), clock);
        timer.record_nanos(0);
        let measurements = timer.measure(0);
        assert_eq!(measurements[0].value, 1.0); // count
        assert_eq!(measurements[1].value, 0.0); // totalTime
    }

    #[test]
    fn single_record_matches_spec_scenario_two() {
        let (clock, _mock) = Clock::mock();
        let timer = Timer::new(Id::new("t"), clock);
        timer.record(Duration::from_millis(42));
        let measurements = timer.measure(0);
        assert_eq!(measurements[0].value, 1.0);
        assert_relative_eq!(measurements[1].value, 0.042, epsilon = 1e-12);
        assert_relative_eq!(measurements[2].value, 0.042 * 0.042, epsilon = 1e-12);
        assert_relative_eq!(measurements[3].value, 0.042, epsilon = 1e-12);
    }

    #[test]
    fn record_closure_records_on_panic_unwind() {
        let (clock, _mock) = Clock::mock();
        let timer = Timer::new(Id::new("t"), clock);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            timer.record_closure(|| panic!("boom"))
        }));
        assert!(result.is_err());
        assert_eq!(timer.measure(0)[0].value, 1.0);
    }
}
