//! Configuration (spec §6), modeled on `metrics-runtime`'s
//! `Builder`/`Configuration` split (`metrics-runtime/src/builder.rs`,
//! `metrics-runtime/src/config.rs`): a public builder that produces an
//! immutable, validated `Config`.

use crate::error::ConfigError;
use std::{collections::HashMap, time::Duration};

/// Immutable, validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) enabled: bool,
    pub(crate) step: Duration,
    pub(crate) meter_ttl: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) uri: String,
    pub(crate) batch_size: usize,
    pub(crate) num_threads: usize,
    pub(crate) common_tags: HashMap<String, String>,
    pub(crate) valid_tag_characters: fn(char) -> bool,
    pub(crate) initial_backoff: Duration,
    pub(crate) max_attempts: u32,
    pub(crate) drain_timeout: Duration,
}

fn default_valid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '^')
}

impl Default for Config {
    fn default() -> Self {
        Config {
            enabled: true,
            step: Duration::from_secs(5),
            meter_ttl: Duration::from_secs(15 * 60),
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(10),
            uri: String::new(),
            batch_size: 10_000,
            num_threads: 2,
            common_tags: HashMap::new(),
            valid_tag_characters: default_valid_char,
            initial_backoff: Duration::from_millis(100),
            max_attempts: 5,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts a new builder with the defaults from spec §6.
    pub fn new() -> Self {
        ConfigBuilder { config: Config::default() }
    }

    /// Master switch; when `false`, the harvest/publish pipeline never
    /// starts.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Harvest period. Must divide evenly into 60 seconds.
    pub fn step(mut self, step: Duration) -> Self {
        self.config.step = step;
        self
    }

    /// Meter expiration window.
    pub fn meter_ttl(mut self, ttl: Duration) -> Self {
        self.config.meter_ttl = ttl;
        self
    }

    /// HTTP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// HTTP read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Publish endpoint URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config.uri = uri.into();
        self
    }

    /// Maximum measurements per publish request.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Publisher worker pool size.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    /// Adds a tag merged into every outbound measurement. An empty value
    /// is dropped rather than stored (spec §6).
    pub fn common_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.config.common_tags.insert(key.into(), value);
        }
        self
    }

    /// Initial retry backoff delay.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.initial_backoff = backoff;
        self
    }

    /// Maximum publish attempts before a batch is dropped.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// How long the publisher pool drains outstanding work on shutdown
    /// before discarding it (spec §5).
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Validates and finalizes the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let config = self.config;

        let step_secs = config.step.as_secs();
        if step_secs == 0 || 60 % step_secs != 0 {
            return Err(ConfigError::StepNotDivisorOfMinute { step_secs });
        }
        if config.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if config.num_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Starts a builder pre-populated with spec-default values.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// The harvest step period.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// The meter expiration TTL.
    pub fn meter_ttl(&self) -> Duration {
        self.meter_ttl
    }
}
