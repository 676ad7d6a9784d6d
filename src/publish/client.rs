//! HTTP publishing (spec §4.7): gzip-compressed POST with exponential
//! backoff retry and clock-skew accounting against the server's `Date`
//! header.
//!
//! Grounded in the retry/backoff shape of
//! `metrics-exporter-dogstatsd/src/forwarder/sync.rs`'s send loop, adapted
//! from fire-and-forget UDP to a blocking HTTP client with a narrower
//! retry policy (spec §4.7: POST retries only on connect-timeout / 429 /
//! 503).

use crate::error::PublishError;
use crate::meters::{Counter, Timer};
use crate::registry::Registry;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP publishing configuration, carved out of [`crate::config::Config`].
pub struct ClientConfig {
    /// Publish endpoint.
    pub uri: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Read timeout.
    pub read_timeout: Duration,
    /// Initial retry backoff delay.
    pub initial_backoff: Duration,
    /// Backoff is capped at the step period (spec §4.7).
    pub step: Duration,
    /// Maximum publish attempts before a batch is dropped.
    pub max_attempts: u32,
}

/// Publishes encoded batches over HTTP, with retry/backoff and clock-skew
/// accounting.
pub struct PublishClient {
    agent: ureq::Agent,
    config: ClientConfig,
    dropped_http: Counter,
    dropped_validation_total: Counter,
    skew_fast: Timer,
    skew_slow: Timer,
}

impl PublishClient {
    /// Builds a client, registering its own telemetry (`publish.dropped.*`,
    /// `publish.clockSkew`) in `registry`.
    pub fn new(registry: &Registry, config: ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();

        PublishClient {
            agent,
            dropped_http: registry.counter(
                crate::id::Id::new("publish.dropped.http"),
            ),
            dropped_validation_total: registry.counter(crate::id::Id::new("publish.dropped.validation")),
            skew_fast: registry.timer(crate::id::Id::new("publish.clockSkew").with_tag("sign", "fast")),
            skew_slow: registry.timer(crate::id::Id::new("publish.clockSkew").with_tag("sign", "slow")),
            config,
        }
    }

    /// Sends one already-batched payload, retrying per spec §4.7's retry
    /// policy until `max_attempts` is reached.
    pub fn send(&self, payload: &Value) -> Result<(), PublishError> {
        let body = serde_json::to_vec(payload).expect("measurement payloads always serialize");
        let compressed = gzip(&body);

        let mut attempt = 0u32;
        let mut backoff = self.config.initial_backoff;

        loop {
            attempt += 1;
            match self.send_once(&compressed) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_attempts {
                        self.dropped_http.increment();
                        warn!(attempt, error = %err, "publish attempt failed, not retrying");
                        if let PublishError::Validation { category, error_count, .. } = &err {
                            debug!(category, error_count, "server-reported validation rejection");
                            self.dropped_validation_total.add(*error_count as f64);
                        }
                        return Err(err);
                    }
                    warn!(attempt, error = %err, ?backoff, "publish attempt failed, retrying");
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(self.config.step);
                }
            }
        }
    }

    fn send_once(&self, compressed: &[u8]) -> Result<(), PublishError> {
        let result = self
            .agent
            .post(&self.config.uri)
            .set("Content-Encoding", "gzip")
            .set("Content-Type", "application/json")
            .send_bytes(compressed);

        match result {
            Ok(response) => {
                self.record_clock_skew(response.header("Date"));
                Ok(())
            }
            Err(ureq::Error::Status(status, response)) => {
                if status == 429 || status == 503 {
                    return Err(PublishError::RetryableStatus { status });
                }
                if let Ok(body) = response.into_string() {
                    if let Ok(validation) = serde_json::from_str::<ValidationPayload>(&body) {
                        return Err(PublishError::Validation {
                            category: validation.error_type,
                            error_count: validation.error_count,
                            message: validation.message.join("; "),
                        });
                    }
                }
                Err(PublishError::RetryableStatus { status })
            }
            Err(ureq::Error::Transport(transport)) => {
                let retryable = matches!(transport.kind(), ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed);
                if retryable {
                    Err(PublishError::RetryableStatus { status: 0 })
                } else {
                    Err(PublishError::Transport(Box::new(ureq::Error::Transport(transport))))
                }
            }
        }
    }

    fn record_clock_skew(&self, date_header: Option<&str>) {
        let Some(date_header) = date_header else {
            debug!("publish response had no Date header, skipping clock-skew accounting");
            return;
        };
        let Some(server_millis) = parse_http_date_millis(date_header) else {
            debug!(date_header, "could not parse Date header for clock-skew accounting");
            return;
        };

        let local_millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let delta_millis = local_millis - server_millis;
        let delta_nanos = delta_millis.saturating_mul(1_000_000);
        if delta_millis >= 0 {
            self.skew_fast.record_nanos(delta_nanos.max(0));
        } else {
            self.skew_slow.record_nanos((-delta_nanos).max(0));
        }
    }
}

#[derive(serde::Deserialize)]
struct ValidationPayload {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(rename = "errorCount")]
    error_count: u64,
    message: Vec<String>,
}

fn gzip(body: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(body).expect("writing to an in-memory buffer cannot fail");
    encoder.finish().expect("finishing an in-memory gzip stream cannot fail")
}

const MONTHS: [&str; 12] =
    ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Parses an RFC 7231 `Date` header (the `IMF-fixdate` form, e.g. `"Tue, 15
/// Nov 1994 08:12:31 GMT"`) to milliseconds since the Unix epoch.
fn parse_http_date_millis(s: &str) -> Option<i64> {
    let parts: Vec<&str> = s.trim().split_whitespace().collect();
    if parts.len() != 6 {
        return None;
    }
    let day: i64 = parts[1].parse().ok()?;
    let month = MONTHS.iter().position(|m| *m == parts[2])? as i64 + 1;
    let year: i64 = parts[3].parse().ok()?;
    let mut time_parts = parts[4].split(':');
    let hour: i64 = time_parts.next()?.parse().ok()?;
    let minute: i64 = time_parts.next()?.parse().ok()?;
    let second: i64 = time_parts.next()?.parse().ok()?;

    let days = days_from_civil(year, month, day);
    Some(((days * 86_400 + hour * 3_600 + minute * 60 + second) * 1000) as i64)
}

/// Howard Hinnant's `days_from_civil`: days since the Unix epoch for a
/// given proleptic Gregorian `(year, month, day)`.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_imf_fixdate() {
        let millis = parse_http_date_millis("Tue, 15 Nov 1994 08:12:31 GMT").unwrap();
        // 1994-11-15T08:12:31Z, cross-checked against a known epoch value.
        assert_eq!(millis, 784887151000);
    }

    #[test]
    fn rejects_malformed_date() {
        assert!(parse_http_date_millis("not a date").is_none());
    }

    #[test]
    fn days_from_civil_matches_unix_epoch() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
    }
}
