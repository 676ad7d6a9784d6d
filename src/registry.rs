//! Meter registry (spec §4.5), grounded on `metrics-util`'s DashMap-backed
//! registry (`metrics-util/src/registry.rs`: `self.map.entry(key).or_insert_with(init)`
//! as the compute-if-absent primitive) generalized to the meter variants in
//! spec §4.4, plus the TTL expiry sweep from `metrics-util/src/registry/recency.rs`'s
//! generation-tracking idea, applied here directly against each meter's own
//! `lastUpdate` timestamp rather than a side table.

use crate::clock::Clock;
use crate::error::MeterError;
use crate::id::Id;
use crate::measurement::Measurement;
use crate::meters::{
    BucketCounter, BucketTimer, Counter, DistributionSummary, Gauge, MaxGauge, PercentileDistributionSummary,
    PercentileTimer, Timer,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Tag keys the registry writes onto interned identifiers itself
/// (`statistic` to disambiguate meter kinds on the same base id, `percentile`
/// for the `T<HHHH>`/`D<HHHH>` sub-counter tag). Caller-supplied ids carrying
/// one of these would silently collide with that machinery, so registration
/// rejects them instead (spec §7 "invalid identifier... rejected at
/// construction").
const RESERVED_TAG_KEYS: [&str; 3] = ["statistic", "atlas.dstype", "percentile"];

/// Checks `id` against the two construction-time rejection rules spec §7
/// names: an empty name, or a caller-supplied reserved tag key.
fn validate_id(id: &Id) -> Result<(), MeterError> {
    if id.name().is_empty() {
        return Err(MeterError::InvalidIdentifier);
    }
    for key in RESERVED_TAG_KEYS {
        if id.tag(key).is_some() {
            return Err(MeterError::ReservedTagKey(key.to_string()));
        }
    }
    Ok(())
}

/// A capability interface for platform-specific introspection (memory
/// pools, GC, thread counts). Spec §9 "Runtime reflection on platform
/// beans" is replaced by this narrow contract: providers are registered
/// once at startup and polled on every harvest tick, rather than loaded via
/// reflection.
pub trait PlatformCollector: Send + Sync {
    /// Produces zero or more measurements reflecting the current platform
    /// state, stamped with `timestamp_millis`.
    fn collect(&self, timestamp_millis: i64) -> Vec<Measurement>;
}

/// The live meter state for one interned identifier.
#[derive(Clone)]
enum Meter {
    Counter(Counter),
    Gauge(Gauge),
    MaxGauge(MaxGauge),
    Timer(Timer),
    DistributionSummary(DistributionSummary),
    PercentileTimer(PercentileTimer),
    PercentileDistributionSummary(PercentileDistributionSummary),
    BucketCounter(BucketCounter),
    BucketTimer(BucketTimer),
}

impl Meter {
    fn measure(&self, timestamp_millis: i64) -> Vec<Measurement> {
        match self {
            Meter::Counter(m) => m.measure(timestamp_millis),
            Meter::Gauge(m) => m.measure(timestamp_millis),
            Meter::MaxGauge(m) => m.measure(timestamp_millis),
            Meter::Timer(m) => m.measure(timestamp_millis),
            Meter::DistributionSummary(m) => m.measure(timestamp_millis),
            Meter::PercentileTimer(m) => m.measure(timestamp_millis),
            Meter::PercentileDistributionSummary(m) => m.measure(timestamp_millis),
            Meter::BucketCounter(m) => m.measure(timestamp_millis),
            Meter::BucketTimer(m) => m.measure(timestamp_millis),
        }
    }

    fn is_expired(&self, ttl_nanos: u64) -> bool {
        match self {
            Meter::Counter(m) => m.is_expired(ttl_nanos),
            Meter::Gauge(m) => m.is_expired(ttl_nanos),
            Meter::MaxGauge(m) => m.is_expired(ttl_nanos),
            Meter::Timer(m) => m.is_expired(ttl_nanos),
            Meter::DistributionSummary(m) => m.is_expired(ttl_nanos),
            Meter::PercentileTimer(m) => m.is_expired(ttl_nanos),
            Meter::PercentileDistributionSummary(m) => m.is_expired(ttl_nanos),
            Meter::BucketCounter(m) => m.is_expired(ttl_nanos),
            Meter::BucketTimer(m) => m.is_expired(ttl_nanos),
        }
    }
}

/// Shared registry state. `pub(crate)` so meter variants that must register
/// their own children (the bucket wrapper, spec §4.4) can hold a
/// [`Weak`] reference and call back into it without a reference cycle
/// through [`Registry`] itself.
pub(crate) struct RegistryInner {
    meters: DashMap<Id, Meter>,
    clock: Clock,
    ttl: Duration,
    platform_collectors: RwLock<Vec<Arc<dyn PlatformCollector>>>,
}

impl RegistryInner {
    fn keyed(&self, id: Id, kind: &'static str) -> Id {
        id.with_tag("statistic", kind)
    }

    pub(crate) fn counter(self: &Arc<Self>, id: Id) -> Counter {
        let key = self.keyed(id, "counter");
        match self.meters.entry(key.clone()).or_insert_with(|| Meter::Counter(Counter::new(key, self.clock.clone()))).value() {
            Meter::Counter(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn gauge(self: &Arc<Self>, id: Id) -> Gauge {
        let key = self.keyed(id, "gaugeWrapper");
        match self.meters.entry(key.clone()).or_insert_with(|| Meter::Gauge(Gauge::new(key, self.clock.clone()))).value() {
            Meter::Gauge(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn max_gauge(self: &Arc<Self>, id: Id) -> MaxGauge {
        let key = self.keyed(id, "maxGaugeWrapper");
        match self
            .meters
            .entry(key.clone())
            .or_insert_with(|| Meter::MaxGauge(MaxGauge::new(key, self.clock.clone())))
            .value()
        {
            Meter::MaxGauge(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    pub(crate) fn timer(self: &Arc<Self>, id: Id) -> Timer {
        let key = self.keyed(id, "timerWrapper");
        match self.meters.entry(key.clone()).or_insert_with(|| Meter::Timer(Timer::new(key, self.clock.clone()))).value() {
            Meter::Timer(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn distribution_summary(self: &Arc<Self>, id: Id) -> DistributionSummary {
        let key = self.keyed(id, "distSummaryWrapper");
        match self
            .meters
            .entry(key.clone())
            .or_insert_with(|| Meter::DistributionSummary(DistributionSummary::new(key, self.clock.clone())))
            .value()
        {
            Meter::DistributionSummary(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn percentile_timer(self: &Arc<Self>, id: Id, min: Duration, max: Duration) -> PercentileTimer {
        let key = self.keyed(id, "percentileTimerWrapper");
        match self
            .meters
            .entry(key.clone())
            .or_insert_with(|| Meter::PercentileTimer(PercentileTimer::new(key, self.clock.clone(), min, max)))
            .value()
        {
            Meter::PercentileTimer(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn percentile_distribution_summary(self: &Arc<Self>, id: Id, min: i64, max: i64) -> PercentileDistributionSummary {
        let key = self.keyed(id, "percentileDistSummaryWrapper");
        match self
            .meters
            .entry(key.clone())
            .or_insert_with(|| {
                Meter::PercentileDistributionSummary(PercentileDistributionSummary::new(key, self.clock.clone(), min, max))
            })
            .value()
        {
            Meter::PercentileDistributionSummary(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn bucket_counter(self: &Arc<Self>, id: Id, bucket_fn: crate::buckets::BucketFn, registry: Weak<RegistryInner>) -> BucketCounter {
        let key = self.keyed(id, "bucketCounterWrapper");
        match self
            .meters
            .entry(key.clone())
            .or_insert_with(|| Meter::BucketCounter(BucketCounter::new(key, bucket_fn, registry)))
            .value()
        {
            Meter::BucketCounter(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }

    fn bucket_timer(self: &Arc<Self>, id: Id, bucket_fn: crate::buckets::BucketFn, registry: Weak<RegistryInner>) -> BucketTimer {
        let key = self.keyed(id, "bucketTimerWrapper");
        match self
            .meters
            .entry(key.clone())
            .or_insert_with(|| Meter::BucketTimer(BucketTimer::new(key, bucket_fn, registry)))
            .value()
        {
            Meter::BucketTimer(m) => m.clone(),
            _ => unreachable!("statistic tag guarantees a unique meter kind per key"),
        }
    }
}

/// The interning map from identifier to live meter state, shared across the
/// update hot path and the harvest scheduler.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Creates an empty registry using `clock` for timestamps and TTL
    /// tracking, expiring meters after `ttl`.
    pub fn new(clock: Clock, ttl: Duration) -> Self {
        Registry {
            inner: Arc::new(RegistryInner {
                meters: DashMap::new(),
                clock,
                ttl,
                platform_collectors: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Interns (or looks up) a [`Counter`] for `id`. An invalid `id` (empty
    /// name, or a reserved tag key) is logged and falls back to a detached,
    /// fully functional counter that is never interned or harvested — the
    /// caller gets a real meter, never an error (spec §7).
    pub fn counter(&self, id: impl Into<Id>) -> Counter {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.counter(id),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid counter identifier, returning a no-op counter");
                Counter::new(id, self.inner.clock.clone())
            }
        }
    }

    /// Interns (or looks up) a [`Gauge`] for `id`. See [`Registry::counter`]
    /// for the invalid-identifier fallback.
    pub fn gauge(&self, id: impl Into<Id>) -> Gauge {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.gauge(id),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid gauge identifier, returning a no-op gauge");
                Gauge::new(id, self.inner.clock.clone())
            }
        }
    }

    /// Interns (or looks up) a [`MaxGauge`] for `id`. See
    /// [`Registry::counter`] for the invalid-identifier fallback.
    pub fn max_gauge(&self, id: impl Into<Id>) -> MaxGauge {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.max_gauge(id),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid max-gauge identifier, returning a no-op max-gauge");
                MaxGauge::new(id, self.inner.clock.clone())
            }
        }
    }

    /// Interns (or looks up) a [`Timer`] for `id`. See [`Registry::counter`]
    /// for the invalid-identifier fallback.
    pub fn timer(&self, id: impl Into<Id>) -> Timer {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.timer(id),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid timer identifier, returning a no-op timer");
                Timer::new(id, self.inner.clock.clone())
            }
        }
    }

    /// Interns (or looks up) a [`DistributionSummary`] for `id`. See
    /// [`Registry::counter`] for the invalid-identifier fallback.
    pub fn distribution_summary(&self, id: impl Into<Id>) -> DistributionSummary {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.distribution_summary(id),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid distribution summary identifier, returning a no-op one");
                DistributionSummary::new(id, self.inner.clock.clone())
            }
        }
    }

    /// Interns (or looks up) a [`PercentileTimer`] for `id`. See
    /// [`Registry::counter`] for the invalid-identifier fallback.
    pub fn percentile_timer(&self, id: impl Into<Id>, min: Duration, max: Duration) -> PercentileTimer {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.percentile_timer(id, min, max),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid percentile timer identifier, returning a no-op one");
                PercentileTimer::new(id, self.inner.clock.clone(), min, max)
            }
        }
    }

    /// Interns (or looks up) a [`PercentileDistributionSummary`] for `id`.
    /// See [`Registry::counter`] for the invalid-identifier fallback.
    pub fn percentile_distribution_summary(&self, id: impl Into<Id>, min: i64, max: i64) -> PercentileDistributionSummary {
        let id = id.into();
        match validate_id(&id) {
            Ok(()) => self.inner.percentile_distribution_summary(id, min, max),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid percentile distribution summary identifier, returning a no-op one");
                PercentileDistributionSummary::new(id, self.inner.clock.clone(), min, max)
            }
        }
    }

    /// Interns (or looks up) a [`BucketCounter`] for `id`, whose children
    /// are themselves interned as plain counters in this registry. See
    /// [`Registry::counter`] for the invalid-identifier fallback (the
    /// fallback wrapper's children never reach the registry either, since
    /// they always inherit their parent's rejected id's tags).
    pub fn bucket_counter(&self, id: impl Into<Id>, bucket_fn: crate::buckets::BucketFn) -> BucketCounter {
        let id = id.into();
        let registry = Arc::downgrade(&self.inner);
        match validate_id(&id) {
            Ok(()) => self.inner.bucket_counter(id, bucket_fn, registry),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid bucket counter identifier, returning a no-op one");
                BucketCounter::new(id, bucket_fn, registry)
            }
        }
    }

    /// Interns (or looks up) a [`BucketTimer`] for `id`, whose children are
    /// themselves interned as plain timers in this registry. See
    /// [`Registry::counter`] for the invalid-identifier fallback.
    pub fn bucket_timer(&self, id: impl Into<Id>, bucket_fn: crate::buckets::BucketFn) -> BucketTimer {
        let id = id.into();
        let registry = Arc::downgrade(&self.inner);
        match validate_id(&id) {
            Ok(()) => self.inner.bucket_timer(id, bucket_fn, registry),
            Err(err) => {
                warn!(%err, id = ?id, "rejecting invalid bucket timer identifier, returning a no-op one");
                BucketTimer::new(id, bucket_fn, registry)
            }
        }
    }

    /// Registers a platform introspection provider, polled on every harvest
    /// tick alongside user meters (spec §9).
    pub fn register_platform_collector(&self, collector: Arc<dyn PlatformCollector>) {
        self.inner.platform_collectors.write().push(collector);
    }

    /// Polls every registered platform collector.
    pub fn collect_platform_measurements(&self, timestamp_millis: i64) -> Vec<Measurement> {
        self.inner
            .platform_collectors
            .read()
            .iter()
            .flat_map(|collector| collector.collect(timestamp_millis))
            .collect()
    }

    /// Harvests every live meter, returning all non-empty measurement
    /// batches. Iteration sees a weakly consistent snapshot: concurrent
    /// inserts during the sweep may or may not be observed, but the call
    /// never panics or double-counts (spec §4.5).
    pub fn harvest(&self, timestamp_millis: i64) -> Vec<Measurement> {
        let mut out = self.collect_platform_measurements(timestamp_millis);
        for entry in self.inner.meters.iter() {
            out.extend(entry.value().measure(timestamp_millis));
        }
        out
    }

    /// Removes meters that have not been updated within the configured
    /// TTL. Safe to call concurrently with updates: a meter touched between
    /// the expiry check and the removal is simply dropped from the
    /// registry on this sweep like any other expired meter, and the caller's
    /// existing handle keeps accepting updates in memory without harm —
    /// but those updates are lost to harvesting unless the caller looks the
    /// meter up again (e.g. via [`Registry::counter`]), which re-interns a
    /// fresh one under the same id. See `DESIGN.md`'s "Resurrection of
    /// expired meter handles" for why this implementation doesn't thread a
    /// registry back-reference through every meter variant to re-insert the
    /// original handle.
    pub fn sweep_expired(&self) {
        let ttl_nanos = self.inner.ttl.as_nanos().min(u64::MAX as u128) as u64;
        let mut removed = 0usize;
        self.inner.meters.retain(|_, meter| {
            let expired = meter.is_expired(ttl_nanos);
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            trace!(removed, "expiration sweep removed stale meters");
        } else {
            debug!("expiration sweep found nothing to remove");
        }
    }

    /// Number of live (interned) meters, for diagnostics and tests.
    pub fn len(&self) -> usize {
        self.inner.meters.len()
    }

    /// `true` if no meters are currently interned.
    pub fn is_empty(&self) -> bool {
        self.inner.meters.is_empty()
    }
}
