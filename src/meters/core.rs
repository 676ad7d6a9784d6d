//! Shared meter state (spec §9 "Inheritance across meter variants").
//!
//! Every meter variant embeds a [`MeterCore`] rather than inheriting from a
//! common base class, mirroring the sum-type redesign spec §9 calls for:
//! `{id, clock, lastUpdateNanos}` plus per-variant accumulator state.

use crate::clock::Clock;
use crate::id::Id;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fields common to every meter variant.
#[derive(Debug)]
pub struct MeterCore {
    id: Id,
    clock: Clock,
    last_update_nanos: AtomicU64,
}

impl MeterCore {
    /// Creates a new core for `id`, stamped as just-updated.
    pub fn new(id: Id, clock: Clock) -> Self {
        let now = clock.now_nanos();
        MeterCore { id, clock, last_update_nanos: AtomicU64::new(now) }
    }

    /// The meter's identifier.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// The clock this meter's timestamps are drawn from.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Records that an update just happened, for TTL tracking.
    pub fn touch(&self) {
        self.last_update_nanos.store(self.clock.now_nanos(), Ordering::Release);
    }

    /// Nanoseconds (on this meter's clock) since the last update.
    pub fn nanos_since_update(&self) -> u64 {
        let now = self.clock.now_nanos();
        now.saturating_sub(self.last_update_nanos.load(Ordering::Acquire))
    }

    /// `true` if no update has been observed within `ttl_nanos` (spec §4.5
    /// expiration GC).
    pub fn is_expired(&self, ttl_nanos: u64) -> bool {
        self.nanos_since_update() > ttl_nanos
    }
}
