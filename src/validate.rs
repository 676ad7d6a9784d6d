//! Egress validation (spec §4.8): tag/value sanitization and dstype
//! inference applied to every measurement immediately before batching.

use crate::id::{Id, Tag};
use crate::measurement::{DsType, Measurement};

fn sanitize(value: &str, valid: fn(char) -> bool) -> String {
    value.chars().map(|c| if valid(c) { c } else { '_' }).collect()
}

/// Sanitizes `measurement`'s identifier against `valid` and injects an
/// implicit `atlas.dstype` tag when none is present. Returns `None` if the
/// name is empty after sanitization (spec §4.8 "reject measurements whose
/// name is empty after sanitization").
pub fn sanitize_measurement(measurement: Measurement, valid: fn(char) -> bool) -> Option<Measurement> {
    let name = sanitize(measurement.id.name(), valid);
    if name.is_empty() {
        return None;
    }

    let mut tags: Vec<Tag> = measurement
        .id
        .tags()
        .iter()
        .map(|tag| Tag::new(sanitize(tag.key(), valid), sanitize(tag.value(), valid)))
        .collect();

    if !tags.iter().any(|tag| tag.key() == "atlas.dstype") {
        tags.push(Tag::new("atlas.dstype", DsType::for_statistic(measurement.statistic).as_str()));
    }

    let id = Id::new(name).with_tags(tags);
    Some(Measurement { id, ..measurement })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::Statistic;

    fn default_valid(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '^')
    }

    #[test]
    fn disallowed_characters_become_underscores() {
        let id = Id::new("requests!").with_tag("region", "us east");
        let measurement = Measurement::new(id, 0, 1.0, Statistic::Count);
        let sanitized = sanitize_measurement(measurement, default_valid).unwrap();
        assert_eq!(sanitized.id.name(), "requests_");
        assert_eq!(sanitized.id.tag("region"), Some("us_east"));
    }

    #[test]
    fn empty_name_after_sanitization_is_rejected() {
        let id = Id::new("!!!");
        let measurement = Measurement::new(id, 0, 1.0, Statistic::Count);
        assert!(sanitize_measurement(measurement, default_valid).is_none());
    }

    #[test]
    fn missing_dstype_is_inferred_as_gauge_for_gauge_statistic() {
        let id = Id::new("pool.size");
        let measurement = Measurement::new(id, 0, 1.0, Statistic::Gauge);
        let sanitized = sanitize_measurement(measurement, default_valid).unwrap();
        assert_eq!(sanitized.id.tag("atlas.dstype"), Some("gauge"));
    }

    #[test]
    fn explicit_dstype_is_preserved() {
        let id = Id::new("x").with_tag("atlas.dstype", "sum");
        let measurement = Measurement::new(id, 0, 1.0, Statistic::Count);
        let sanitized = sanitize_measurement(measurement, default_valid).unwrap();
        assert_eq!(sanitized.id.tag("atlas.dstype"), Some("sum"));
    }
}
