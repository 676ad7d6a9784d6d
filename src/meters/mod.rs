//! Meter variants (spec §4.4): Counter, Gauge, MaxGauge, Timer,
//! DistributionSummary, and the percentile/bucket composites that wrap
//! them. Every variant shares a [`core::MeterCore`] rather than a common
//! base class (spec §9).

mod bucket;
mod core;
mod counter;
mod distribution_summary;
mod gauge;
mod max_gauge;
mod percentile;
mod timer;

pub use bucket::{BucketCounter, BucketTimer};
pub use counter::Counter;
pub use distribution_summary::DistributionSummary;
pub use gauge::Gauge;
pub use max_gauge::MaxGauge;
pub use percentile::{PercentileDistributionSummary, PercentileTimer};
pub use timer::Timer;
