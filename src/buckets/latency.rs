//! Latency/age bucket functions (spec §4.3).
//!
//! Given `(max, unit)`, produces a total function from a signed duration to
//! a human-readable label, used to shard a meter by value range (the
//! "bucket variant" in spec §4.4). Labels are fixed-width, zero-padded
//! decimal strings with a unit suffix chosen from a ladder running from
//! nanoseconds up through days, so that lexicographic sort of the labels
//! matches numeric order of the underlying durations.
//!
//! The spec's own worked example shows two different widths for labels
//! produced from the same `max` ("07s" next to "015s"); per the Open
//! Question recorded in `DESIGN.md`, this implementation always emits a
//! single, consistent width per bucket function rather than reproducing
//! that inconsistency.

use std::time::Duration;

const UNIT_LADDER: &[(i64, &str)] = &[
    (1, "ns"),
    (1_000, "us"),
    (1_000_000, "ms"),
    (1_000_000_000, "s"),
    (60_000_000_000, "min"),
    (3_600_000_000_000, "h"),
    (86_400_000_000_000, "day"),
];

fn choose_unit(max_nanos: i64) -> (i64, &'static str) {
    // Pick the largest unit in which `max` still renders as at least `2`,
    // so a `max` that lands exactly on a unit boundary (e.g. 60s == 1min)
    // doesn't trivially round down to "1" of the coarser unit.
    let mut chosen = UNIT_LADDER[0];
    for &(divisor, suffix) in UNIT_LADDER {
        if max_nanos / divisor >= 2 {
            chosen = (divisor, suffix);
        }
    }
    chosen
}

fn format_label(nanos: i64, divisor: i64, suffix: &str, width: usize) -> String {
    let scaled = (nanos / divisor).max(0);
    format!("{scaled:0width$}{suffix}", width = width)
}

/// Which end of the `[0, max]` range is subdivided finely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Buckets at `max/8, max/4, max/2, max` — fine detail near zero.
    Zero,
    /// Buckets at `max - max/2, max - max/4, max - max/8, max` — fine detail
    /// near `max`.
    Max,
}

/// The words used for the underflow (negative) and overflow (`> max`)
/// buckets. Latency buckets and age buckets use different vocabulary for
/// the same shape of function (spec §4.3, §8 scenario 6).
#[derive(Debug, Clone, Copy)]
pub struct BucketWords {
    /// Label for values below zero.
    pub underflow: &'static str,
    /// Label for values above `max`.
    pub overflow: &'static str,
}

/// Words for a latency bucket function: negative durations shouldn't
/// happen, and a value past `max` is just "slow".
pub const LATENCY_WORDS: BucketWords = BucketWords { underflow: "negative_latency", overflow: "slow" };

/// Words for an age bucket function: something "younger" than zero is in
/// the "future", and something past `max` is "old".
pub const AGE_WORDS: BucketWords = BucketWords { underflow: "future", overflow: "old" };

/// A total function from a signed duration (in nanoseconds) to a bucket
/// label.
#[derive(Debug, Clone)]
pub struct BucketFn {
    boundaries: Vec<(i64, String)>,
    words: BucketWords,
}

impl BucketFn {
    fn build(max: Duration, bias: Bias, words: BucketWords) -> Self {
        let max_nanos = max.as_nanos().min(i64::MAX as u128) as i64;
        let (divisor, suffix) = choose_unit(max_nanos);
        let max_scaled = max_nanos / divisor;
        let width = max_scaled.to_string().len().max(2);

        let offsets = match bias {
            Bias::Zero => [max_nanos / 8, max_nanos / 4, max_nanos / 2, max_nanos],
            Bias::Max => [
                max_nanos - max_nanos / 2,
                max_nanos - max_nanos / 4,
                max_nanos - max_nanos / 8,
                max_nanos,
            ],
        };

        let boundaries = offsets
            .into_iter()
            .map(|nanos| (nanos, format_label(nanos, divisor, suffix, width)))
            .collect();

        BucketFn { boundaries, words }
    }

    /// Builds a zero-biased latency bucket function for durations up to
    /// `max`.
    pub fn latency(max: Duration) -> Self {
        Self::build(max, Bias::Zero, LATENCY_WORDS)
    }

    /// Builds a max-biased latency bucket function for durations up to
    /// `max`.
    pub fn latency_max_biased(max: Duration) -> Self {
        Self::build(max, Bias::Max, LATENCY_WORDS)
    }

    /// Builds a zero-biased age bucket function for ages up to `max`.
    pub fn age(max: Duration) -> Self {
        Self::build(max, Bias::Zero, AGE_WORDS)
    }

    /// Builds a max-biased age bucket function for ages up to `max`.
    pub fn age_max_biased(max: Duration) -> Self {
        Self::build(max, Bias::Max, AGE_WORDS)
    }

    /// Maps a signed nanosecond duration to its bucket label.
    pub fn apply_nanos(&self, nanos: i64) -> &str {
        if nanos < 0 {
            return self.words.underflow;
        }
        for (boundary, label) in &self.boundaries {
            if nanos <= *boundary {
                return label;
            }
        }
        self.words.overflow
    }

    /// Maps a [`Duration`] to its bucket label. Use [`BucketFn::apply_nanos`]
    /// directly for values that may be negative.
    pub fn apply(&self, value: Duration) -> &str {
        self.apply_nanos(value.as_nanos().min(i64::MAX as u128) as i64)
    }
}
