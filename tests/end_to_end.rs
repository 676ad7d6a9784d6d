//! Integration tests assembling `Registry`, `Harvester`, and
//! `publish::batch` together, covering the worked scenarios the unit tests
//! only exercise in isolation.

use std::collections::HashMap;
use std::time::Duration;

use stepwise_metrics::buckets::BucketFn;
use stepwise_metrics::harvest::Harvester;
use stepwise_metrics::id::Id;
use stepwise_metrics::measurement::Statistic;
use stepwise_metrics::publish::{decode_batch, encode_batch};
use stepwise_metrics::registry::Registry;
use stepwise_metrics::Clock;

fn default_valid(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '^')
}

#[test]
fn counter_emits_once_then_goes_silent_across_two_ticks() {
    let (clock, _mock) = Clock::mock();
    let registry = Registry::new(clock, Duration::from_secs(900));
    let harvester = Harvester::new(registry.clone(), Duration::from_secs(5), HashMap::new(), default_valid);

    let requests = registry.counter(Id::new("requests"));
    requests.add(15.0);

    let first = harvester.tick(0);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].value, 3.0); // 15 over a 5s step

    let second = harvester.tick(5_000);
    assert!(second.is_empty(), "a step with no new activity emits nothing");
}

#[test]
fn percentile_timer_bucket_tags_survive_the_full_harvest_pipeline() {
    let (clock, _mock) = Clock::mock();
    let registry = Registry::new(clock, Duration::from_secs(900));
    let harvester = Harvester::new(registry.clone(), Duration::from_secs(5), HashMap::new(), default_valid);

    let timer = registry.percentile_timer(Id::new("api.latency"), Duration::from_nanos(0), Duration::from_secs(60));
    timer.record(Duration::from_millis(42));

    let measurements = harvester.tick(0);
    let percentile = measurements
        .iter()
        .find(|m| m.statistic == Statistic::Percentile)
        .expect("percentile sub-counter should be emitted");

    let tag = percentile.id.tag("percentile").unwrap();
    assert!(tag.starts_with('T'));
    assert_eq!(percentile.id.tag("atlas.dstype"), Some("sum"));
}

#[test]
fn bucket_counter_children_are_harvested_as_independent_counters() {
    let (clock, _mock) = Clock::mock();
    let registry = Registry::new(clock, Duration::from_secs(900));
    let harvester = Harvester::new(registry.clone(), Duration::from_secs(5), HashMap::new(), default_valid);

    let bucket_fn = BucketFn::latency(Duration::from_secs(60));
    let calls = registry.bucket_counter(Id::new("calls"), bucket_fn);
    calls.record(6_000_000_000.0);
    calls.record(70_000_000_000.0); // past max -> "slow"

    let measurements = harvester.tick(0);
    let names_and_buckets: Vec<(&str, Option<&str>)> =
        measurements.iter().map(|m| (m.id.name(), m.id.tag("bucket"))).collect();

    assert!(names_and_buckets.iter().any(|(name, bucket)| *name == "calls" && *bucket == Some("07s")));
    assert!(names_and_buckets.iter().any(|(name, bucket)| *name == "calls" && *bucket == Some("slow")));
}

#[test]
fn expired_meter_drops_out_of_harvest_and_a_fresh_lookup_starts_clean() {
    let (clock, mock) = Clock::mock();
    let registry = Registry::new(clock, Duration::from_secs(900));
    let harvester = Harvester::new(registry.clone(), Duration::from_secs(5), HashMap::new(), default_valid);

    let counter = registry.counter(Id::new("ephemeral"));
    counter.increment();
    harvester.tick(0);

    mock.increment(Duration::from_secs(901).as_nanos() as u64);
    assert!(harvester.tick(901_000).is_empty(), "expired meter is swept before harvesting");
    assert!(registry.is_empty());

    let fresh = registry.counter(Id::new("ephemeral"));
    fresh.increment();
    let measurements = harvester.tick(902_000);
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].value, 1.0 / 5.0);
}

#[test]
fn a_full_harvest_ticks_measurements_round_trip_the_wire_format() {
    let (clock, _mock) = Clock::mock();
    let registry = Registry::new(clock, Duration::from_secs(900));
    let harvester = Harvester::new(registry.clone(), Duration::from_secs(5), HashMap::new(), default_valid);

    registry.counter(Id::new("requests").with_tag("region", "us")).add(12.0);
    registry.gauge(Id::new("pool.size")).set(8.0);
    registry.max_gauge(Id::new("queue.depth")).update(3.0);

    let measurements = harvester.tick(0);
    assert_eq!(measurements.len(), 3);

    let payload = encode_batch(&measurements);
    let decoded = decode_batch(&payload);
    assert_eq!(decoded.len(), 3);

    let requests = decoded.iter().find(|r| r.tags.contains(&("name".to_string(), "requests".to_string()))).unwrap();
    assert_eq!(requests.op, 0);
    assert_eq!(requests.value, 12.0 / 5.0);

    let pool = decoded.iter().find(|r| r.tags.contains(&("name".to_string(), "pool.size".to_string()))).unwrap();
    assert_eq!(pool.op, 10);
    assert_eq!(pool.value, 8.0);
}

#[test]
fn common_tags_are_present_on_every_emitted_measurement() {
    let (clock, _mock) = Clock::mock();
    let registry = Registry::new(clock, Duration::from_secs(900));
    let mut common_tags = HashMap::new();
    common_tags.insert("app".to_string(), "checkout".to_string());
    let harvester = Harvester::new(registry.clone(), Duration::from_secs(5), common_tags, default_valid);

    registry.counter(Id::new("orders")).increment();
    let measurements = harvester.tick(0);

    assert!(measurements.iter().all(|m| m.id.tag("app") == Some("checkout")));
}
