//! Step-aligned harvest pipeline (spec §4.6), grounded in the flush-loop
//! shape of `metrics-exporter-dogstatsd/src/forwarder/sync.rs` (a dedicated
//! thread sleeping between ticks, `tracing` at each boundary) generalized
//! from a fixed-interval flush to wall-clock step alignment, at-most-one
//! in-flight tick, and backward-clock-jump realignment.

use crate::id::{Id, Tag};
use crate::measurement::{DsType, Measurement};
use crate::registry::Registry;
use crate::validate;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Normalizes and sanitizes one harvest tick's worth of raw meter output.
pub struct Harvester {
    registry: Registry,
    step: Duration,
    common_tags: HashMap<String, String>,
    valid_tag_characters: fn(char) -> bool,
}

impl Harvester {
    /// Creates a harvester over `registry`, applying `common_tags` and
    /// sanitizing with `valid_tag_characters` on every tick.
    pub fn new(
        registry: Registry,
        step: Duration,
        common_tags: HashMap<String, String>,
        valid_tag_characters: fn(char) -> bool,
    ) -> Self {
        Harvester { registry, step, common_tags, valid_tag_characters }
    }

    /// Runs one harvest tick for the step boundary `timestamp_millis`:
    /// expiry sweep, per-meter `measure()`, rate normalization, common-tag
    /// merge, and egress sanitization.
    pub fn tick(&self, timestamp_millis: i64) -> Vec<Measurement> {
        self.registry.sweep_expired();
        let step_secs = self.step.as_secs_f64();

        let raw = self.registry.harvest(timestamp_millis);
        trace!(raw_count = raw.len(), timestamp_millis, "harvested raw measurements");

        let normalized: Vec<Measurement> = raw
            .into_iter()
            .filter(|m| !m.is_nan())
            .map(|m| self.normalize(m, step_secs))
            .map(|m| self.apply_common_tags(m))
            .filter_map(|m| validate::sanitize_measurement(m, self.valid_tag_characters))
            .collect();

        debug!(emitted = normalized.len(), timestamp_millis, "harvest tick complete");
        normalized
    }

    fn normalize(&self, measurement: Measurement, step_secs: f64) -> Measurement {
        match DsType::for_statistic(measurement.statistic) {
            DsType::Rate => Measurement { value: measurement.value / step_secs, ..measurement },
            DsType::Gauge | DsType::Sum => measurement,
        }
    }

    fn apply_common_tags(&self, measurement: Measurement) -> Measurement {
        if self.common_tags.is_empty() {
            return measurement;
        }
        let tags: Vec<Tag> = self.common_tags.iter().map(|(k, v)| Tag::new(k.clone(), v.clone())).collect();
        // Common tags win on key collision by default (spec §4.6); applying
        // them last via `with_tags` (later entries override) implements
        // that without a separate "configured override" path, which this
        // implementation doesn't expose.
        let id = measurement.id.clone().with_tags(tags);
        Measurement { id, ..measurement }
    }
}

/// Weighted-average rate reconstruction for a cumulative counter sampled at
/// arbitrary times (spec §4.6 "legacy mode"), for platform collectors that
/// report a running total rather than a per-step delta.
#[derive(Default)]
pub struct CumulativeRateTracker {
    previous: DashMap<Id, (f64, i64)>,
}

impl CumulativeRateTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        CumulativeRateTracker { previous: DashMap::new() }
    }

    /// Folds a new cumulative sample `(value, timestamp_millis)` in for
    /// `id`, returning the per-second rate since the prior sample. Returns
    /// `None` (suppressing emission) if this is the first sample, or if
    /// more than two steps have elapsed since the last one (spec §4.6
    /// "emit NaN rather than amortize" across a gap — modeled here as
    /// `None` instead of a literal NaN measurement).
    pub fn rate(&self, id: &Id, value: f64, timestamp_millis: i64, step: Duration) -> Option<f64> {
        let previous = self.previous.insert(id.clone(), (value, timestamp_millis));
        let (prev_value, prev_timestamp) = previous?;

        let elapsed_millis = timestamp_millis - prev_timestamp;
        if elapsed_millis <= 0 {
            return None;
        }
        if elapsed_millis as u128 > 2 * step.as_millis() {
            return None;
        }

        let rate = (value - prev_value) / (elapsed_millis as f64 / 1_000.0);
        Some(rate.max(0.0))
    }
}

enum SchedulerState {
    Stopped,
    Running,
    Stopping,
}

/// The single-threaded cooperative scheduler firing [`Harvester::tick`] at
/// each step boundary (spec's Scheduler lifecycle: `Stopped -> Running ->
/// Stopping -> Stopped`).
pub struct Scheduler {
    clock: crate::clock::Clock,
    step: Duration,
    harvester: Arc<Harvester>,
    on_tick: Arc<dyn Fn(Vec<Measurement>) + Send + Sync>,
    state: Arc<Mutex<SchedulerState>>,
    shutdown: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Builds a scheduler that calls `on_tick` with each tick's sanitized
    /// measurements — typically handing them to the publisher's batcher.
    pub fn new(
        clock: crate::clock::Clock,
        step: Duration,
        harvester: Harvester,
        on_tick: impl Fn(Vec<Measurement>) + Send + Sync + 'static,
    ) -> Self {
        Scheduler {
            clock,
            step,
            harvester: Arc::new(harvester),
            on_tick: Arc::new(on_tick),
            state: Arc::new(Mutex::new(SchedulerState::Stopped)),
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Starts the scheduler thread. A no-op (with a warning) if already
    /// running.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        if matches!(*state, SchedulerState::Running) {
            warn!("scheduler start() called while already running");
            return;
        }
        *state = SchedulerState::Running;
        self.shutdown.store(false, Ordering::Release);

        let clock = self.clock.clone();
        let step = self.step;
        let harvester = Arc::clone(&self.harvester);
        let on_tick = Arc::clone(&self.on_tick);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = std::thread::Builder::new()
            .name("metrics-harvest".into())
            .spawn(move || run_loop(clock, step, harvester, on_tick, shutdown))
            .expect("failed to spawn harvest scheduler thread");

        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Signals the scheduler to exit after its current tick, then flushes
    /// one final harvest synchronously before returning (spec's Scheduler
    /// lifecycle "`stop()` MUST flush one final harvest synchronously").
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            *state = SchedulerState::Stopping;
        }
        self.shutdown.store(true, Ordering::Release);

        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }

        let timestamp_millis = self.clock.wall_time_millis();
        let measurements = self.harvester.tick(timestamp_millis);
        (self.on_tick)(measurements);

        *self.state.lock().unwrap() = SchedulerState::Stopped;
    }
}

fn run_loop(
    clock: crate::clock::Clock,
    step: Duration,
    harvester: Arc<Harvester>,
    on_tick: Arc<dyn Fn(Vec<Measurement>) + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) {
    let mut last_boundary = clock.step_boundary_millis(step);

    while !shutdown.load(Ordering::Acquire) {
        let sleep_nanos = clock.nanos_until_next_boundary(step);
        std::thread::sleep(Duration::from_nanos(sleep_nanos));
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let boundary = clock.step_boundary_millis(step);
        let step_millis = step.as_millis().max(1) as i64;

        if boundary < last_boundary - step_millis {
            // Clock jumped backward by more than one step: realign instead
            // of emitting for the skipped window (spec §4.6).
            warn!(boundary, last_boundary, "clock jumped backward, realigning harvest schedule");
            last_boundary = boundary;
            continue;
        }

        if boundary <= last_boundary {
            // Overran into the same or an earlier boundary: skip rather
            // than queue a second tick (spec §4.6 at-most-one-in-flight).
            continue;
        }

        last_boundary = boundary;
        let measurements = harvester.tick(boundary);
        on_tick(measurements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use std::time::Duration;

    fn harvester_with(registry: Registry) -> Harvester {
        Harvester::new(registry, Duration::from_secs(5), HashMap::new(), |c| c.is_ascii_alphanumeric() || c == '.')
    }

    #[test]
    fn counter_rate_is_divided_by_step_seconds() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let counter = registry.counter(Id::new("requests"));
        counter.add(15.0);

        let harvester = harvester_with(registry);
        let measurements = harvester.tick(0);
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].value, 3.0); // 15 / 5s, spec scenario 1
    }

    #[test]
    fn common_tags_are_merged_in_and_win_on_collision() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let counter = registry.counter(Id::new("requests").with_tag("region", "user-supplied"));
        counter.increment();

        let mut common_tags = HashMap::new();
        common_tags.insert("region".to_string(), "us-east-1".to_string());
        let harvester =
            Harvester::new(registry, Duration::from_secs(5), common_tags, |c| c.is_ascii_alphanumeric() || c == '-');
        let measurements = harvester.tick(0);
        assert_eq!(measurements[0].id.tag("region"), Some("us-east-1"));
    }

    #[test]
    fn gauge_values_are_not_divided_by_step() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let gauge = registry.gauge(Id::new("pool.size"));
        gauge.set(42.0);

        let harvester = harvester_with(registry);
        let measurements = harvester.tick(0);
        assert_eq!(measurements[0].value, 42.0);
    }

    #[test]
    fn cumulative_rate_tracker_suppresses_first_sample() {
        let tracker = CumulativeRateTracker::new();
        let id = Id::new("platform.gc.count");
        assert!(tracker.rate(&id, 100.0, 0, Duration::from_secs(5)).is_none());
        assert_eq!(tracker.rate(&id, 150.0, 5_000, Duration::from_secs(5)), Some(10.0));
    }

    #[test]
    fn cumulative_rate_tracker_suppresses_across_a_gap() {
        let tracker = CumulativeRateTracker::new();
        let id = Id::new("platform.gc.count");
        tracker.rate(&id, 100.0, 0, Duration::from_secs(5));
        assert!(tracker.rate(&id, 200.0, 20_000, Duration::from_secs(5)).is_none());
    }

    #[test]
    fn empty_step_emits_no_measurements() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let _gauge = registry.gauge(Id::new("idle"));
        let harvester = harvester_with(registry);
        assert!(harvester.tick(0).is_empty());
    }
}
