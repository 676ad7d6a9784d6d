//! Global registry bridge (spec §9 "Globals"): a single writer-once slot,
//! so library code can record metrics without threading a [`Registry`]
//! through every call site, while application startup still owns
//! construction and configuration.
//!
//! Mirrors the "install a recorder, fall back to a no-op default" shape of
//! `metrics`'s own `set_recorder`/`recorder()` facade: [`set_global_registry`]
//! lets `main` install a configured [`Registry`] once, and the free
//! functions below (`counter`, `gauge`, ...) work either way, lazily
//! constructing a default registry on first use if nothing was installed.

use crate::buckets::BucketFn;
use crate::id::Id;
use crate::meters::{BucketCounter, BucketTimer, Counter, DistributionSummary, Gauge, MaxGauge, Timer};
use crate::registry::Registry;
use crate::Clock;
use once_cell::sync::OnceCell;
use std::time::Duration;

static GLOBAL: OnceCell<Registry> = OnceCell::new();

const DEFAULT_METER_TTL: Duration = Duration::from_secs(15 * 60);

/// Installs `registry` as the process-wide global. Returns the registry
/// back on `Err` if one was already installed — the slot is write-once,
/// matching spec §9's "single writer-once slot" rather than a
/// last-writer-wins global.
pub fn set_global_registry(registry: Registry) -> Result<(), Registry> {
    GLOBAL.set(registry)
}

/// The process-wide registry, if one has been installed.
pub fn global_registry() -> Option<&'static Registry> {
    GLOBAL.get()
}

/// The process-wide registry: whatever was installed via
/// [`set_global_registry`], or a lazily constructed default (real clock,
/// 15 minute meter TTL) if nothing was installed yet.
fn registry() -> &'static Registry {
    GLOBAL.get_or_init(|| Registry::new(Clock::new(), DEFAULT_METER_TTL))
}

/// Interns (or looks up) a [`Counter`] on the global registry.
pub fn counter(id: impl Into<Id>) -> Counter {
    registry().counter(id)
}

/// Interns (or looks up) a [`Gauge`] on the global registry.
pub fn gauge(id: impl Into<Id>) -> Gauge {
    registry().gauge(id)
}

/// Interns (or looks up) a [`MaxGauge`] on the global registry.
pub fn max_gauge(id: impl Into<Id>) -> MaxGauge {
    registry().max_gauge(id)
}

/// Interns (or looks up) a [`Timer`] on the global registry.
pub fn timer(id: impl Into<Id>) -> Timer {
    registry().timer(id)
}

/// Interns (or looks up) a [`DistributionSummary`] on the global registry.
pub fn distribution_summary(id: impl Into<Id>) -> DistributionSummary {
    registry().distribution_summary(id)
}

/// Interns (or looks up) a [`BucketCounter`] on the global registry.
pub fn bucket_counter(id: impl Into<Id>, bucket_fn: BucketFn) -> BucketCounter {
    registry().bucket_counter(id, bucket_fn)
}

/// Interns (or looks up) a [`BucketTimer`] on the global registry.
pub fn bucket_timer(id: impl Into<Id>, bucket_fn: BucketFn) -> BucketTimer {
    registry().bucket_timer(id, bucket_fn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // `set_global_registry`/`global_registry` share one process-wide slot,
    // so both behaviors are exercised in a single test to avoid ordering
    // flakiness across the crate's test binary.
    #[test]
    fn global_slot_is_write_once() {
        assert!(global_registry().is_none() || global_registry().is_some());

        let (clock, _mock) = Clock::mock();
        let registry = Registry::new(clock, Duration::from_secs(900));
        let first_install = set_global_registry(registry);

        let (clock2, _mock2) = Clock::mock();
        let second = Registry::new(clock2, Duration::from_secs(900));
        let second_install = set_global_registry(second);

        // Whichever of this test or another concurrently-run test in the
        // same binary won the race, exactly one subsequent install fails
        // and the slot is populated afterward.
        assert!(first_install.is_err() || second_install.is_err());
        assert!(global_registry().is_some());
    }

    #[test]
    fn free_functions_work_without_an_explicit_install() {
        // Shares the process-wide slot with `global_slot_is_write_once`, so
        // this only asserts that calling a free function never panics and
        // always resolves to *some* registry, installed or lazily defaulted.
        let c = counter(Id::new("global.smoke.counter"));
        c.increment();
    }
}
