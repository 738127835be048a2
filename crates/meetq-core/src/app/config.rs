//! Worker and process configuration.
//!
//! Values come from code (`WorkerConfig::default()` + `with_*`) or from
//! `MEETQ_*` environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Largest batch a single receive call may ask for (cloud queue limit).
pub const MAX_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("visibility_timeout must be greater than zero")]
    VisibilityTimeout,

    #[error("poll_interval must be greater than zero")]
    PollInterval,

    #[error("max_batch_size must be between 1 and {max}, got {0}", max = MAX_BATCH_SIZE)]
    BatchSize(usize),

    #[error("renewal_fraction must be within (0, 1), got {0}")]
    RenewalFraction(f64),

    #[error("max_delivery_count must be at least 1 (use None for unbounded)")]
    DeliveryCount,

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("unknown backend {0:?}, expected \"inprocess\" or \"durable\"")]
    UnknownBackend(String),
}

/// QueueWorker settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Lease length requested on receive and on every renewal.
    pub visibility_timeout: Duration,
    /// Delay after an empty batch or a failed receive.
    pub poll_interval: Duration,
    /// Upper bound for `max_count` on every receive call.
    pub max_batch_size: usize,
    /// Renew once this fraction of the current lease has elapsed.
    pub renewal_fraction: f64,
    /// Quarantine a message received more often than this. `None` = never.
    pub max_delivery_count: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            max_batch_size: 4,
            renewal_fraction: 0.5,
            max_delivery_count: Some(5),
        }
    }
}

impl WorkerConfig {
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_renewal_fraction(mut self, fraction: f64) -> Self {
        self.renewal_fraction = fraction;
        self
    }

    pub fn with_max_delivery_count(mut self, count: Option<u32>) -> Self {
        self.max_delivery_count = count;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.visibility_timeout.is_zero() {
            return Err(ConfigError::VisibilityTimeout);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::PollInterval);
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.max_batch_size) {
            return Err(ConfigError::BatchSize(self.max_batch_size));
        }
        // NaN fails both comparisons
        if !(self.renewal_fraction > 0.0 && self.renewal_fraction < 1.0) {
            return Err(ConfigError::RenewalFraction(self.renewal_fraction));
        }
        if self.max_delivery_count == Some(0) {
            return Err(ConfigError::DeliveryCount);
        }
        Ok(())
    }

    /// Read overrides from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            visibility_timeout: Duration::from_millis(parse_or(
                &lookup,
                EnvKey::VisibilityTimeoutMs,
                defaults.visibility_timeout.as_millis() as u64,
            )?),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                EnvKey::PollIntervalMs,
                defaults.poll_interval.as_millis() as u64,
            )?),
            max_batch_size: parse_or(&lookup, EnvKey::MaxBatchSize, defaults.max_batch_size)?,
            renewal_fraction: parse_or(&lookup, EnvKey::RenewalFraction, defaults.renewal_fraction)?,
            // 0 は「上限なし」
            max_delivery_count: match parse_or(
                &lookup,
                EnvKey::MaxDeliveryCount,
                defaults.max_delivery_count.unwrap_or(0),
            )? {
                0 => None,
                n => Some(n),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Which queue implementation a process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Single-process FIFO, nothing survives a restart.
    #[default]
    InProcess,
    /// Cloud transport with leases and redelivery.
    Durable,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inprocess" | "in-process" | "in_process" => Ok(Self::InProcess),
            "durable" => Ok(Self::Durable),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Process-level settings for binaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: BackendKind,
    pub worker: WorkerConfig,
    pub json_logs: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup(EnvKey::Backend.as_str()) {
            Some(value) => value.parse()?,
            None => BackendKind::default(),
        };
        let json_logs = matches!(
            lookup(EnvKey::LogFormat.as_str()).as_deref(),
            Some("json")
        );
        Ok(Self {
            backend,
            worker: WorkerConfig::from_lookup(&lookup)?,
            json_logs,
        })
    }
}

pub enum EnvKey {
    Backend,
    VisibilityTimeoutMs,
    PollIntervalMs,
    MaxBatchSize,
    RenewalFraction,
    MaxDeliveryCount,
    LogFormat,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::Backend => "MEETQ_BACKEND",
            EnvKey::VisibilityTimeoutMs => "MEETQ_VISIBILITY_TIMEOUT_MS",
            EnvKey::PollIntervalMs => "MEETQ_POLL_INTERVAL_MS",
            EnvKey::MaxBatchSize => "MEETQ_MAX_BATCH_SIZE",
            EnvKey::RenewalFraction => "MEETQ_RENEWAL_FRACTION",
            EnvKey::MaxDeliveryCount => "MEETQ_MAX_DELIVERY_COUNT",
            EnvKey::LogFormat => "MEETQ_LOG_FORMAT",
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: EnvKey,
    default: T,
) -> Result<T, ConfigError> {
    let name = key.as_str();
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: name,
            value: raw,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(WorkerConfig::default().validate(), Ok(()));
    }

    #[rstest]
    #[case::zero_visibility(
        WorkerConfig::default().with_visibility_timeout(Duration::ZERO),
        ConfigError::VisibilityTimeout
    )]
    #[case::zero_poll(
        WorkerConfig::default().with_poll_interval(Duration::ZERO),
        ConfigError::PollInterval
    )]
    #[case::empty_batch(WorkerConfig::default().with_max_batch_size(0), ConfigError::BatchSize(0))]
    #[case::oversized_batch(
        WorkerConfig::default().with_max_batch_size(33),
        ConfigError::BatchSize(33)
    )]
    #[case::fraction_one(
        WorkerConfig::default().with_renewal_fraction(1.0),
        ConfigError::RenewalFraction(1.0)
    )]
    #[case::fraction_zero(
        WorkerConfig::default().with_renewal_fraction(0.0),
        ConfigError::RenewalFraction(0.0)
    )]
    #[case::zero_deliveries(
        WorkerConfig::default().with_max_delivery_count(Some(0)),
        ConfigError::DeliveryCount
    )]
    fn validate_rejects(#[case] config: WorkerConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn nan_fraction_is_rejected() {
        let config = WorkerConfig::default().with_renewal_fraction(f64::NAN);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RenewalFraction(_))
        ));
    }

    #[test]
    fn from_lookup_without_variables_gives_defaults() {
        let config = WorkerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, WorkerConfig::default());
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("MEETQ_VISIBILITY_TIMEOUT_MS", "60000"),
            ("MEETQ_POLL_INTERVAL_MS", "250"),
            ("MEETQ_MAX_BATCH_SIZE", "16"),
            ("MEETQ_RENEWAL_FRACTION", "0.75"),
            ("MEETQ_MAX_DELIVERY_COUNT", "0"),
        ]))
        .unwrap();

        assert_eq!(config.visibility_timeout, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_batch_size, 16);
        assert_eq!(config.renewal_fraction, 0.75);
        assert_eq!(config.max_delivery_count, None);
    }

    #[test]
    fn visibility_timeout_accepts_sub_second_values() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("MEETQ_VISIBILITY_TIMEOUT_MS", "1500"),
            ("MEETQ_POLL_INTERVAL_MS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.visibility_timeout, Duration::from_millis(1500));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn from_lookup_reports_unparsable_values() {
        let err = WorkerConfig::from_lookup(lookup_from(&[("MEETQ_MAX_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                key: "MEETQ_MAX_BATCH_SIZE",
                value: "lots".to_string(),
            }
        );
    }

    #[test]
    fn from_lookup_validates_the_result() {
        let err = WorkerConfig::from_lookup(lookup_from(&[("MEETQ_MAX_BATCH_SIZE", "64")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::BatchSize(64));
    }

    #[rstest]
    #[case("inprocess", BackendKind::InProcess)]
    #[case("In-Process", BackendKind::InProcess)]
    #[case(" durable ", BackendKind::Durable)]
    fn backend_kind_parses(#[case] raw: &str, #[case] expected: BackendKind) {
        assert_eq!(raw.parse::<BackendKind>().unwrap(), expected);
    }

    #[test]
    fn settings_read_backend_and_log_format() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("MEETQ_BACKEND", "durable"),
            ("MEETQ_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(settings.backend, BackendKind::Durable);
        assert!(settings.json_logs);
        assert_eq!(settings.worker, WorkerConfig::default());
    }

    #[test]
    fn settings_reject_unknown_backend() {
        let err = Settings::from_lookup(lookup_from(&[("MEETQ_BACKEND", "kafka")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownBackend("kafka".to_string()));
    }
}
