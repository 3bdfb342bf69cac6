// Rust guideline compliant 2026-10-19

//! Process settings: a TOML file layered with `FRAUD_`-prefixed environment
//! variables (`__` separates nested keys, e.g. `FRAUD_KAFKA__GROUP_ID`).
//!
//! Settings are validated once at startup; every later stage assumes a valid
//! [`Settings`] and converts it into the per-component builder configs.

use alerter::{AlerterConfig, AlerterError};
use config::{Config, Environment, File, FileFormat};
use feeder::{FeederConfig, FeederError};
use pipeline::{PipelineConfig, PipelineError};
use rule::ThresholdRule;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Settings file used when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config/fraud_detection.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FRAUD";

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors loading or validating settings. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file or environment could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    /// A value is present but unusable.
    #[error("invalid setting `{key}`: {reason}")]
    Invalid {
        /// Dotted path of the offending setting.
        key: &'static str,
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A credential that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// The raw credential.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// `[kafka]`: broker connection shared by consumer and producer.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaSettings {
    /// Comma-separated `host:port` list.
    pub bootstrap_servers: String,
    /// Consumer group; committed offsets are kept per group.
    pub group_id: String,
    /// `PLAINTEXT`, `SSL`, `SASL_PLAINTEXT` or `SASL_SSL`.
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    /// SASL mechanism, e.g. `PLAIN`.
    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    /// SASL user (API key on managed clusters).
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password (API secret).
    #[serde(default)]
    pub sasl_password: Option<Secret>,
    /// Group session timeout in milliseconds.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

/// `[schema_registry]`: Confluent-compatible registry endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySettings {
    /// Base URL, e.g. `https://psrc-xxxx.confluent.cloud`.
    pub url: String,
    /// Basic-auth user; set together with `password`.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password; set together with `username`.
    #[serde(default)]
    pub password: Option<Secret>,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_registry_timeout_ms")]
    pub timeout_ms: u64,
}

impl RegistrySettings {
    /// Bound on one registry HTTP call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Basic-auth pair, when configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.expose())),
            _ => None,
        }
    }
}

/// `[topics]`: inbound and alert topic names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    /// Topic of per-account window aggregates.
    pub input: String,
    /// Topic alerts are published to.
    pub alerts: String,
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            input: "FEATURE_SET".to_owned(),
            alerts: "fraudulent_transactions".to_owned(),
        }
    }
}

/// `[pipeline]`: loop timing, alert retry policy and rule threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Longest wait for one record, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Longest wait for one broker acknowledgement, in milliseconds.
    pub publish_timeout_ms: u64,
    /// Publish attempts after the first one fails.
    pub alert_retries: u32,
    /// Pause between publish attempts, in milliseconds.
    pub alert_retry_backoff_ms: u64,
    /// Smallest transaction count that can raise an alert.
    pub min_transactions: i64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1_000,
            publish_timeout_ms: 10_000,
            alert_retries: 2,
            alert_retry_backoff_ms: 500,
            min_transactions: rule::DEFAULT_MIN_TRANSACTIONS,
        }
    }
}

impl PipelineSettings {
    /// Bound on one broker acknowledgement.
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

/// `[feed]`: synthetic feed shape (`feature_feed` only).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Records to publish; `None` runs until interrupted.
    pub records: Option<u64>,
    /// Pause between records in milliseconds; `None` keeps the feeder default.
    pub interval_ms: Option<u64>,
    /// RNG seed for a reproducible feed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_owned()
}

fn default_session_timeout_ms() -> u64 {
    45_000
}

fn default_registry_timeout_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// All process settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Broker connection.
    pub kafka: KafkaSettings,
    /// Schema registry endpoint.
    pub schema_registry: RegistrySettings,
    /// Topic names.
    #[serde(default)]
    pub topics: TopicSettings,
    /// Loop and alerting policy.
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// Synthetic feed.
    #[serde(default)]
    pub feed: FeedSettings,
}

impl Settings {
    /// Load `path` layered with environment overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file is missing or malformed, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::finish(builder.build()?)
    }

    /// Parse settings from TOML text alone, then validate.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints the types cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("kafka.bootstrap_servers", &self.kafka.bootstrap_servers)?;
        require_non_empty("kafka.group_id", &self.kafka.group_id)?;
        if self.kafka.sasl_mechanism.is_some()
            && (self.kafka.sasl_username.is_none() || self.kafka.sasl_password.is_none())
        {
            return Err(invalid(
                "kafka.sasl_mechanism",
                "sasl_username and sasl_password are required with a SASL mechanism",
            ));
        }

        let url = self.schema_registry.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("schema_registry.url", "must be an http(s) URL"));
        }
        if self.schema_registry.username.is_some() != self.schema_registry.password.is_some() {
            return Err(invalid(
                "schema_registry.username",
                "username and password must be set together",
            ));
        }
        require_positive("schema_registry.timeout_ms", self.schema_registry.timeout_ms)?;

        require_non_empty("topics.input", &self.topics.input)?;
        require_non_empty("topics.alerts", &self.topics.alerts)?;
        if self.topics.input == self.topics.alerts {
            return Err(invalid("topics.alerts", "must differ from topics.input"));
        }

        require_positive("pipeline.poll_timeout_ms", self.pipeline.poll_timeout_ms)?;
        require_positive("pipeline.publish_timeout_ms", self.pipeline.publish_timeout_ms)?;
        if self.pipeline.min_transactions < 1 {
            return Err(invalid("pipeline.min_transactions", "must be >= 1"));
        }
        Ok(())
    }

    /// Orchestrator configuration.
    ///
    /// # Errors
    ///
    /// Propagates [`PipelineError::InvalidConfig`].
    pub fn pipeline_config(&self) -> Result<PipelineConfig, PipelineError> {
        PipelineConfig::builder()
            .poll_timeout(Duration::from_millis(self.pipeline.poll_timeout_ms))
            .build()
    }

    /// Alert emitter configuration.
    ///
    /// # Errors
    ///
    /// Propagates [`AlerterError::InvalidConfig`].
    pub fn alerter_config(&self) -> Result<AlerterConfig, AlerterError> {
        AlerterConfig::builder(self.topics.alerts.clone())
            .publish_timeout(self.pipeline.publish_timeout())
            .retries(self.pipeline.alert_retries)
            .retry_backoff(Duration::from_millis(self.pipeline.alert_retry_backoff_ms))
            .build()
    }

    /// Synthetic feed configuration.
    ///
    /// # Errors
    ///
    /// Propagates [`FeederError::InvalidConfig`].
    pub fn feeder_config(&self) -> Result<FeederConfig, FeederError> {
        let mut builder = FeederConfig::builder(self.topics.input.clone())
            .publish_timeout(self.pipeline.publish_timeout());
        if let Some(records) = self.feed.records {
            builder = builder.records(records);
        }
        if let Some(interval_ms) = self.feed.interval_ms {
            builder = builder.interval(Duration::from_millis(interval_ms));
        }
        if let Some(seed) = self.feed.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }

    /// The fraud rule.
    #[must_use]
    pub fn rule(&self) -> ThresholdRule {
        ThresholdRule::new(self.pipeline.min_transactions)
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { key, reason: reason.to_owned() }
}

fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    Ok(())
}

fn require_positive(key: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(key, "must be > 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
