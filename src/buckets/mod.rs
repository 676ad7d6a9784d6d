//! Bucket schemas (spec §4.3): percentile buckets for the percentile meter
//! variants, and latency/age buckets for the bucket meter variant.

mod latency;
mod percentile;

pub use latency::{Bias, BucketFn, BucketWords, AGE_WORDS, LATENCY_WORDS};
pub use percentile::PercentileBuckets;
