//! Percentile bucket schema (spec §4.3).
//!
//! A fixed table of bucket boundaries built once at first use. Every
//! non-negative `i64` value falls into exactly one bucket;
//! [`PercentileBuckets::index_of`] finds it via binary search, and
//! [`PercentileBuckets::percentile`] reconstructs an approximate percentile
//! from per-bucket counts by linearly interpolating within the target
//! bucket.
//!
//! Below a value of 50 the table is dense (every integer is its own
//! boundary) since a 2% step is less than one integer and can't be held
//! exactly. From 50 up, each boundary grows by `prev / 50` (integer
//! division), which keeps the step at or under 2% of the previous boundary
//! for every step — so `upper_bound(index_of(v)) <= v * 1.02` holds for
//! every `v` above the dense region, not just approximately. That growth
//! rate needs roughly two thousand boundaries to span the positive `i64`
//! range, short of the `0x10000` (four hex digit) ceiling the `T<HHHH>`/
//! `D<HHHH>` tag encoding imposes on bucket indices.

use std::sync::OnceLock;

fn build_boundaries() -> Vec<i64> {
    let mut boundaries: Vec<i64> = Vec::with_capacity(2200);
    boundaries.push(0);

    let mut prev: i64 = 0;
    while prev < i64::MAX / 2 {
        let step = (prev / 50).max(1);
        prev += step;
        boundaries.push(prev);
    }

    boundaries.push(i64::MAX);
    boundaries
}

fn boundaries() -> &'static [i64] {
    static TABLE: OnceLock<Vec<i64>> = OnceLock::new();
    TABLE.get_or_init(build_boundaries)
}

/// The fixed percentile bucket table.
///
/// Stateless: all operations consult the process-wide table built once on
/// first access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentileBuckets;

impl PercentileBuckets {
    /// Number of buckets in the table.
    pub fn length() -> usize {
        boundaries().len()
    }

    /// Returns the upper bound (inclusive) of bucket `index`.
    pub fn upper_bound(index: usize) -> i64 {
        boundaries()[index.min(boundaries().len() - 1)]
    }

    /// Finds the bucket containing `v` via binary search. Negative values
    /// map to bucket 0.
    pub fn index_of(v: i64) -> usize {
        if v <= 0 {
            return 0;
        }
        let table = boundaries();
        table.partition_point(|&boundary| boundary < v)
    }

    /// Linearly interpolates the `p`-th percentile (`0 <= p <= 100`) from
    /// per-bucket counts. `counts` must have [`PercentileBuckets::length`]
    /// entries, indexed the same way [`PercentileBuckets::index_of`] would
    /// place a sample.
    pub fn percentile(counts: &[u64], p: f64) -> f64 {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0.0;
        }

        let p = p.clamp(0.0, 100.0);
        let target = (p / 100.0) * total as f64;

        let mut cumulative = 0.0f64;
        let table = boundaries();
        for (i, &count) in counts.iter().enumerate() {
            let prev_cumulative = cumulative;
            cumulative += count as f64;
            if cumulative >= target || i == counts.len() - 1 {
                if count == 0 {
                    return Self::upper_bound(i) as f64;
                }
                let lower = if i == 0 { 0.0 } else { table[i - 1] as f64 };
                let upper = Self::upper_bound(i) as f64;
                let fraction = (target - prev_cumulative) / count as f64;
                return lower + fraction.clamp(0.0, 1.0) * (upper - lower);
            }
        }

        Self::upper_bound(counts.len().saturating_sub(1)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_map_to_bucket_zero() {
        assert_eq!(PercentileBuckets::index_of(-5), 0);
        assert_eq!(PercentileBuckets::index_of(0), 0);
    }

    #[test]
    fn bucket_upper_bound_never_below_value() {
        for v in [1i64, 2, 7, 63, 1_000, 1_000_000, 9_999_999_999] {
            let idx = PercentileBuckets::index_of(v);
            assert!(
                PercentileBuckets::upper_bound(idx) >= v,
                "upper_bound({idx}) = {} < v = {v}",
                PercentileBuckets::upper_bound(idx)
            );
        }
    }

    #[test]
    fn index_of_is_monotonic() {
        let mut last = 0;
        for v in (1..100_000i64).step_by(37) {
            let idx = PercentileBuckets::index_of(v);
            assert!(idx >= last);
            last = idx;
        }
    }

    #[test]
    fn length_stays_under_the_four_hex_digit_index_ceiling() {
        let len = PercentileBuckets::length();
        assert!(len > 1_000 && len < 0x10000, "unexpected bucket count: {len}");
    }

    #[test]
    fn upper_bound_stays_within_two_percent_above_the_dense_region() {
        for v in [1_300i64, 786_433, 1_000_000] {
            let idx = PercentileBuckets::index_of(v);
            let upper = PercentileBuckets::upper_bound(idx) as f64;
            assert!(upper <= v as f64 * 1.02, "v={v} upper_bound({idx})={upper} exceeds 1.02x");
        }

        let mut v: i64 = 50;
        while v < 1_000_000_000_000_000 {
            let idx = PercentileBuckets::index_of(v);
            let upper = PercentileBuckets::upper_bound(idx) as f64;
            assert!(upper <= v as f64 * 1.02, "v={v} upper_bound({idx})={upper} exceeds 1.02x");
            v = v + (v / 3).max(1);
        }
    }

    #[test]
    fn percentile_of_uniform_counts_is_reasonable() {
        let len = PercentileBuckets::length();
        let mut counts = vec![0u64; len];
        let idx_of_100 = PercentileBuckets::index_of(100);
        counts[idx_of_100] = 100;
        let p50 = PercentileBuckets::percentile(&counts, 50.0);
        assert!(p50 > 0.0 && p50 <= PercentileBuckets::upper_bound(idx_of_100) as f64);
    }

    #[test]
    fn percentile_of_empty_counts_is_zero() {
        let counts = vec![0u64; PercentileBuckets::length()];
        assert_eq!(PercentileBuckets::percentile(&counts, 99.0), 0.0);
    }
}
