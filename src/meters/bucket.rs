//! Bucket variants (spec §4.4): a bucket function shards a meter by value
//! range into independently interned children.

use crate::buckets::BucketFn;
use crate::id::Id;
use crate::measurement::Measurement;
use crate::meters::{Counter, Timer};
use crate::registry::RegistryInner;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// A Counter wrapper that delegates each `record` to a child counter
/// selected by a bucket label.
#[derive(Clone)]
pub struct BucketCounter {
    id: Id,
    bucket_fn: BucketFn,
    registry: Weak<RegistryInner>,
    children: Arc<DashMap<String, Counter>>,
}

impl BucketCounter {
    pub(crate) fn new(id: Id, bucket_fn: BucketFn, registry: Weak<RegistryInner>) -> Self {
        BucketCounter { id, bucket_fn, registry, children: Arc::new(DashMap::new()) }
    }

    /// The wrapper's own identifier (not emitted directly — see
    /// [`BucketCounter::measure`]).
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Looks up (or creates) the child counter for `amount`'s bucket and
    /// adds `amount` to it.
    pub fn record(&self, amount: f64) {
        let label = self.bucket_fn.apply_nanos(amount as i64);
        let child = match self.children.get(label) {
            Some(existing) => existing.clone(),
            None => {
                let registry = self.registry.upgrade().expect("registry dropped while bucket counter still live");
                let child_id = self.id.clone().with_tag("bucket", label.to_string());
                let child = registry.counter(child_id);
                self.children.insert(label.to_string(), child.clone());
                child
            }
        };
        child.add(amount);
    }

    /// Always empty: children are registered directly and harvested
    /// independently (spec §4.4).
    pub fn measure(&self, _timestamp_millis: i64) -> Vec<Measurement> {
        Vec::new()
    }

    /// The wrapper itself never expires independently of its children; it
    /// holds no accumulator of its own.
    pub fn is_expired(&self, _ttl_nanos: u64) -> bool {
        false
    }
}

/// A Timer wrapper that delegates each `record` to a child timer selected
/// by a bucket label.
#[derive(Clone)]
pub struct BucketTimer {
    id: Id,
    bucket_fn: BucketFn,
    registry: Weak<RegistryInner>,
    children: Arc<DashMap<String, Timer>>,
}

impl BucketTimer {
    pub(crate) fn new(id: Id, bucket_fn: BucketFn, registry: Weak<RegistryInner>) -> Self {
        BucketTimer { id, bucket_fn, registry, children: Arc::new(DashMap::new()) }
    }

    /// The wrapper's own identifier.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Looks up (or creates) the child timer for `duration`'s bucket and
    /// records `duration` on it.
    pub fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos().min(i64::MAX as u128) as i64;
        let label = self.bucket_fn.apply_nanos(nanos);
        let child = match self.children.get(label) {
            Some(existing) => existing.clone(),
            None => {
                let registry = self.registry.upgrade().expect("registry dropped while bucket timer still live");
                let child_id = self.id.clone().with_tag("bucket", label.to_string());
                let child = registry.timer(child_id);
                self.children.insert(label.to_string(), child.clone());
                child
            }
        };
        child.record(duration);
    }

    /// Always empty: children are registered directly and harvested
    /// independently (spec §4.4).
    pub fn measure(&self, _timestamp_millis: i64) -> Vec<Measurement> {
        Vec::new()
    }

    /// The wrapper itself never expires independently of its children.
    pub fn is_expired(&self, _ttl_nanos: u64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::BucketFn;
    use crate::clock::Clock;
    use crate::registry::Registry;

    #[test]
    fn record_delegates_to_the_labeled_child_counter() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let bucket_fn = BucketFn::latency(Duration::from_secs(60));
        let wrapper = registry.bucket_counter(Id::new("calls"), bucket_fn);

        wrapper.record(6_000_000_000.0); // 6s -> "07s" bucket
        wrapper.record(6_500_000_000.0); // also "07s"

        let child = registry.counter(Id::new("calls").with_tag("bucket", "07s"));
        assert_eq!(child.measure(0)[0].value, 6_000_000_000.0 + 6_500_000_000.0);
    }

    #[test]
    fn wrapper_measure_is_always_empty() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let bucket_fn = BucketFn::latency(Duration::from_secs(60));
        let wrapper = registry.bucket_timer(Id::new("calls"), bucket_fn);
        wrapper.record(Duration::from_secs(1));
        assert!(wrapper.measure(0).is_empty());
    }
}
