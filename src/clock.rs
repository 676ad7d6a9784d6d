//! Time source (spec §4.1 "step alignment", §4.7 "harvest scheduling").
//!
//! Wraps [`quanta::Clock`] the way `metrics`'s own `Sink`/`Receiver` carry a
//! `Clock` field (`metrics/src/sink.rs`, `metrics/src/receiver.rs`): one
//! clock instance is built at startup and threaded through the registry and
//! harvest scheduler, so tests can swap in [`quanta::Clock::mock`] and
//! control time deterministically.

use quanta::{Clock as QuantaClock, Instant};
use std::time::Duration;

/// The wall-clock plus monotonic time source used throughout the pipeline.
///
/// `quanta::Instant` has no fixed epoch, so wall-clock timestamps are
/// derived by anchoring one `(Instant, unix millis)` pair at construction
/// and measuring every later timestamp as an offset from it. This keeps
/// `wall_time_millis` mockable through the same `quanta::Mock` handle that
/// drives step-boundary alignment, instead of calling `SystemTime::now()`
/// directly.
#[derive(Clone)]
pub struct Clock {
    inner: QuantaClock,
    epoch_instant: Instant,
    epoch_unix_millis: i64,
}

impl Clock {
    /// The real, OS-backed clock.
    pub fn new() -> Self {
        Self::anchored(QuantaClock::new())
    }

    /// A clock whose `now()` can be driven by hand via the returned
    /// [`quanta::Mock`] handle, for deterministic tests of step-boundary
    /// alignment and TTL expiry.
    pub fn mock() -> (Self, std::sync::Arc<quanta::Mock>) {
        let (inner, mock) = QuantaClock::mock();
        (Self::anchored(inner), mock)
    }

    fn anchored(inner: QuantaClock) -> Self {
        let epoch_instant = inner.now();
        let epoch_unix_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Clock { inner, epoch_instant, epoch_unix_millis }
    }

    /// Current time as nanoseconds since an arbitrary, monotonic epoch.
    /// Only valid for computing deltas against other values from the same
    /// [`Clock`] instance. Goes through `Instant`/`saturating_duration_since`
    /// rather than `quanta::Clock::raw()`, whose ticks are an uncalibrated
    /// hardware counter and not nanosecond-denominated on real hardware.
    pub fn now_nanos(&self) -> u64 {
        self.inner.now().saturating_duration_since(self.epoch_instant).as_nanos() as u64
    }

    /// Wall-clock time as milliseconds since the Unix epoch, used to stamp
    /// outgoing measurements (spec §3).
    pub fn wall_time_millis(&self) -> i64 {
        let elapsed = self.inner.now().saturating_duration_since(self.epoch_instant);
        self.epoch_unix_millis + elapsed.as_millis() as i64
    }

    /// The start of the step window containing `now`, in milliseconds since
    /// the Unix epoch, per spec §4.7's step-boundary alignment.
    pub fn step_boundary_millis(&self, step: Duration) -> i64 {
        let step_millis = step.as_millis().max(1) as i64;
        let now = self.wall_time_millis();
        now - now.rem_euclid(step_millis)
    }

    /// Nanoseconds until the next step boundary, used by the harvest
    /// scheduler to sleep until the next tick.
    pub fn nanos_until_next_boundary(&self, step: Duration) -> u64 {
        let step_nanos = step.as_nanos().max(1) as i64;
        let now_millis = self.wall_time_millis();
        let now_nanos = now_millis as i64 * 1_000_000;
        let remainder = now_nanos.rem_euclid(step_nanos);
        (step_nanos - remainder) as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
