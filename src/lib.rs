//! A high-frequency metrics instrumentation library with step-aligned
//! harvest and publication.
//!
//! Hot-path updates (`counter.increment()`, `timer.record(..)`, ...) are
//! lock-free and allocation-free. A background scheduler (see
//! [`harvest::Scheduler`]) wakes at each step boundary, harvests every live
//! meter through [`registry::Registry`], normalizes and sanitizes the
//! result, and hands it to [`publish::Publisher`] for delivery.
//!
//! ```no_run
//! use std::time::Duration;
//! use stepwise_metrics::{clock::Clock, config::Config, id::Id, registry::Registry};
//!
//! let config = Config::builder().uri("https://example.invalid/publish").build().unwrap();
//! let registry = Registry::new(Clock::new(), config.meter_ttl());
//! let requests = registry.counter(Id::new("requests").with_tag("region", "us-east-1"));
//! requests.increment();
//! ```

pub mod atomic;
pub mod buckets;
pub mod clock;
pub mod config;
pub mod error;
pub mod global;
pub mod harvest;
pub mod id;
pub mod measurement;
pub mod meters;
pub mod publish;
pub mod registry;
pub mod validate;

pub use clock::Clock;
pub use config::{Config, ConfigBuilder};
pub use error::{ConfigError, MeterError, PublishError};
pub use global::{
    bucket_counter, bucket_timer, counter, distribution_summary, gauge, global_registry, max_gauge,
    set_global_registry, timer,
};
pub use harvest::{Harvester, Scheduler};
pub use id::{Id, Tag};
pub use measurement::{DsType, Measurement, Statistic};
pub use publish::Publisher;
pub use registry::{PlatformCollector, Registry};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn end_to_end_harvest_tick_produces_sanitized_measurements() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let requests = registry.counter(Id::new("requests").with_tag("region", "us east"));
        requests.add(10.0);

        let harvester = Harvester::new(registry, Duration::from_secs(5), Default::default(), |c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '^')
        });
        let measurements = harvester.tick(0);

        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].value, 2.0); // 10 / 5s step
        assert_eq!(measurements[0].id.tag("region"), Some("us_east"));
        assert_eq!(measurements[0].id.tag("atlas.dstype"), Some("rate"));
    }
}
