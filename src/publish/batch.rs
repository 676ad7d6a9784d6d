//! Aggregator wire format (spec §4.7, §6): a string table followed by a
//! stream of tagged measurement records.

use crate::measurement::{Measurement, Statistic};
use serde_json::{json, Value};
use std::collections::HashMap;

fn op_code(statistic: Statistic) -> i32 {
    match statistic {
        Statistic::Count
        | Statistic::TotalAmount
        | Statistic::TotalTime
        | Statistic::TotalOfSquares
        | Statistic::Percentile => 0,
        Statistic::Gauge | Statistic::Max | Statistic::ActiveTasks | Statistic::Duration => 10,
    }
}

/// Encodes `measurements` as the string-table array format: `[N, s0..sN-1,
/// (tagCount, (keyIdx, valueIdx)×tagCount, opCode, value)...]`. Records
/// with NaN value or an add (`opCode=0`) record with a non-positive value
/// are omitted (spec §4.7).
pub fn encode_batch(measurements: &[Measurement]) -> Value {
    let mut strings: Vec<String> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<(Vec<(usize, usize)>, i32, f64)> = Vec::new();

    {
        let mut intern = |s: &str| -> usize {
            if let Some(&i) = index_of.get(s) {
                i
            } else {
                let i = strings.len();
                strings.push(s.to_string());
                index_of.insert(s.to_string(), i);
                i
            }
        };

        for measurement in measurements {
            if measurement.value.is_nan() {
                continue;
            }
            let op = op_code(measurement.statistic);
            if op == 0 && measurement.value <= 0.0 {
                continue;
            }

            let mut tags = Vec::with_capacity(measurement.id.tags().len() + 1);
            tags.push((intern("name"), intern(measurement.id.name())));
            for tag in measurement.id.tags() {
                tags.push((intern(tag.key()), intern(tag.value())));
            }
            records.push((tags, op, measurement.value));
        }
    }

    let mut array = Vec::with_capacity(1 + strings.len() + records.len() * 4);
    array.push(json!(strings.len()));
    for s in &strings {
        array.push(json!(s));
    }
    for (tags, op, value) in &records {
        array.push(json!(tags.len()));
        for (k, v) in tags {
            array.push(json!(k));
            array.push(json!(v));
        }
        array.push(json!(op));
        array.push(json!(value));
    }

    Value::Array(array)
}

/// A decoded measurement record: its tags as `(key, value)` pairs, the
/// opcode, and the value. Used by tests to check that encoding round-trips.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// The record's tags, in the order they appeared, including the
    /// synthetic `name` tag.
    pub tags: Vec<(String, String)>,
    /// The opcode (`0`, `10`, or `-1`).
    pub op: i32,
    /// The value.
    pub value: f64,
}

/// Decodes a payload produced by [`encode_batch`] back into its records.
pub fn decode_batch(value: &Value) -> Vec<DecodedRecord> {
    let array = value.as_array().expect("payload must be a JSON array");
    let string_count = array[0].as_u64().expect("first element must be the string-table length") as usize;
    let strings: Vec<&str> = array[1..=string_count].iter().map(|v| v.as_str().expect("string table entries must be strings")).collect();

    let mut records = Vec::new();
    let mut i = 1 + string_count;
    while i < array.len() {
        let tag_count = array[i].as_u64().expect("expected a tag count") as usize;
        i += 1;
        let mut tags = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            let key_idx = array[i].as_u64().unwrap() as usize;
            let value_idx = array[i + 1].as_u64().unwrap() as usize;
            tags.push((strings[key_idx].to_string(), strings[value_idx].to_string()));
            i += 2;
        }
        let op = array[i].as_i64().expect("expected an opcode") as i32;
        i += 1;
        let value = array[i].as_f64().expect("expected a value");
        i += 1;
        records.push(DecodedRecord { tags, op, value });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;

    #[test]
    fn encode_then_decode_preserves_records() {
        let measurements = vec![
            Measurement::new(Id::new("requests").with_tag("region", "us"), 0, 3.0, Statistic::Count),
            Measurement::new(Id::new("pool.size"), 0, 42.0, Statistic::Gauge),
        ];
        let payload = encode_batch(&measurements);
        let records = decode_batch(&payload);

        assert_eq!(records.len(), 2);
        let requests = records.iter().find(|r| r.tags.contains(&("name".to_string(), "requests".to_string()))).unwrap();
        assert_eq!(requests.op, 0);
        assert_eq!(requests.value, 3.0);
        assert!(requests.tags.contains(&("region".to_string(), "us".to_string())));

        let pool = records.iter().find(|r| r.tags.contains(&("name".to_string(), "pool.size".to_string()))).unwrap();
        assert_eq!(pool.op, 10);
        assert_eq!(pool.value, 42.0);
    }

    #[test]
    fn nan_and_non_positive_add_records_are_omitted() {
        let measurements = vec![
            Measurement::new(Id::new("a"), 0, f64::NAN, Statistic::Count),
            Measurement::new(Id::new("b"), 0, 0.0, Statistic::Count),
            Measurement::new(Id::new("c"), 0, -1.0, Statistic::TotalAmount),
        ];
        let payload = encode_batch(&measurements);
        assert!(decode_batch(&payload).is_empty());
    }

    #[test]
    fn repeated_tag_values_are_interned_once() {
        let measurements = vec![
            Measurement::new(Id::new("a").with_tag("region", "us"), 0, 1.0, Statistic::Count),
            Measurement::new(Id::new("b").with_tag("region", "us"), 0, 2.0, Statistic::Count),
        ];
        let payload = encode_batch(&measurements);
        let array = payload.as_array().unwrap();
        let string_count = array[0].as_u64().unwrap() as usize;
        // "name", "a", "b", "region", "us" -- not duplicated per record.
        assert_eq!(string_count, 5);
    }
}
