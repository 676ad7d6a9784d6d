//! Harvest output (spec §3 "Measurement", §4.6 normalization tags).

use crate::id::Id;

/// The reserved `statistic` tag value distinguishing sub-measurements of a
/// compound meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    /// `count` — number of events, reported as a rate.
    Count,
    /// `totalTime` — accumulated seconds.
    TotalTime,
    /// `totalAmount` — accumulated amount (unitless).
    TotalAmount,
    /// `totalOfSquares` — accumulated sum of squares, for stddev reconstruction.
    TotalOfSquares,
    /// `max` — maximum observed value since the last harvest.
    Max,
    /// `gauge` — last-writer-wins sampled value.
    Gauge,
    /// `percentile` — a sub-counter of a percentile meter.
    Percentile,
    /// `activeTasks` — platform-style gauge of in-flight work.
    ActiveTasks,
    /// `duration` — platform-style gauge of elapsed time.
    Duration,
}

impl Statistic {
    /// The reserved tag value the wire format and egress path use.
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::TotalTime => "totalTime",
            Statistic::TotalAmount => "totalAmount",
            Statistic::TotalOfSquares => "totalOfSquares",
            Statistic::Max => "max",
            Statistic::Gauge => "gauge",
            Statistic::Percentile => "percentile",
            Statistic::ActiveTasks => "activeTasks",
            Statistic::Duration => "duration",
        }
    }
}

/// The reserved `atlas.dstype` tag describing how the backend should
/// aggregate a value across its own reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsType {
    /// Per-second rate; the harvest pipeline divides by step duration.
    Rate,
    /// Point-in-time sample; emitted as-is.
    Gauge,
    /// Pre-aggregated total; the backend sums across sources.
    Sum,
}

impl DsType {
    /// The reserved tag value.
    pub fn as_str(&self) -> &'static str {
        match self {
            DsType::Rate => "rate",
            DsType::Gauge => "gauge",
            DsType::Sum => "sum",
        }
    }

    /// The dstype implied by a given statistic, absent an explicit override.
    pub fn for_statistic(statistic: Statistic) -> Self {
        match statistic {
            Statistic::Count | Statistic::TotalTime | Statistic::TotalAmount | Statistic::TotalOfSquares => {
                DsType::Rate
            }
            Statistic::Gauge | Statistic::Max | Statistic::ActiveTasks | Statistic::Duration => DsType::Gauge,
            Statistic::Percentile => DsType::Sum,
        }
    }
}

/// A single `(identifier, timestamp, value)` harvest output (spec §3).
#[derive(Debug, Clone)]
pub struct Measurement {
    /// The identifier this measurement was harvested for, already tagged
    /// with `statistic` (and `atlas.dstype` once normalized).
    pub id: Id,
    /// The step-boundary instant this measurement was computed for, as
    /// milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    /// The raw value. Normalization (rate conversion) happens in the
    /// harvest pipeline, not here.
    pub value: f64,
    /// Which statistic this measurement represents.
    pub statistic: Statistic,
}

impl Measurement {
    /// Creates a new measurement.
    pub fn new(id: Id, timestamp_millis: i64, value: f64, statistic: Statistic) -> Self {
        Measurement { id, timestamp_millis, value, statistic }
    }

    /// `true` if the value is NaN, which suppresses emission everywhere in
    /// this pipeline (spec §4.4, §4.8).
    pub fn is_nan(&self) -> bool {
        self.value.is_nan()
    }
}
