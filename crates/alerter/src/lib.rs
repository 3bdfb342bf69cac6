// Rust guideline compliant 2026-10-19

//! Alert emission for the fraud-alert pipeline.
//!
//! [`AlertEmitter`] turns a positive verdict into an [`AlertRecord`], encodes
//! it with the alert schema, and publishes it through an `AlertSink` port,
//! waiting for the broker acknowledgement. Publish failures are retried a
//! bounded number of times; encode failures are not.
//!
//! Entry points: [`AlertEmitter::emit`], [`build_alert`].
//! Configuration via [`AlerterConfig::builder`].

use codec::AlertEncoder;
use domain::{
    AccountKey, AlertRecord, AlertSink, CloseError, DeliveryAck, EmitError, SchemaRegistry,
    UNKNOWN, Verdict, WindowAggregate,
};
use std::fmt::Display;
use std::time::Duration;

// ---------------------------------------------------------------------------
// AlerterError
// ---------------------------------------------------------------------------

/// Errors building an [`AlerterConfig`].
#[derive(Debug, thiserror::Error)]
pub enum AlerterError {
    /// The supplied configuration is invalid.
    #[error("invalid alerter configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// AlerterConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for an [`AlertEmitter`].
///
/// Construct via [`AlerterConfig::builder`].
#[derive(Debug, Clone)]
pub struct AlerterConfig {
    /// Topic alerts are published to.
    pub topic: String,
    /// Upper bound on waiting for one broker acknowledgement.
    pub publish_timeout: Duration,
    /// Extra publish attempts after the first failure.
    pub retries: u32,
    /// Delay between publish attempts.
    pub retry_backoff: Duration,
}

/// Builder for [`AlerterConfig`].
///
/// Obtain via [`AlerterConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct AlerterConfigBuilder {
    topic: String,
    publish_timeout: Duration,
    retries: u32,
    retry_backoff: Duration,
}

impl AlerterConfig {
    /// Create a builder. `topic` is the only required parameter.
    ///
    /// Default values: `publish_timeout = 10 s`, `retries = 2`, `retry_backoff = 500 ms`.
    #[must_use]
    pub fn builder(topic: impl Into<String>) -> AlerterConfigBuilder {
        AlerterConfigBuilder {
            topic: topic.into(),
            publish_timeout: Duration::from_secs(10),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl AlerterConfigBuilder {
    /// Override the acknowledgement timeout.
    #[must_use]
    pub fn publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Override the number of extra publish attempts.
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Override the delay between publish attempts.
    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AlerterError::InvalidConfig`] when the topic is empty or the
    /// publish timeout is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<AlerterConfig, AlerterError> {
        if self.topic.trim().is_empty() {
            return Err(AlerterError::InvalidConfig {
                reason: "alert topic must not be empty".to_owned(),
            });
        }
        if self.publish_timeout.is_zero() {
            return Err(AlerterError::InvalidConfig {
                reason: "publish_timeout must be > 0".to_owned(),
            });
        }
        Ok(AlerterConfig {
            topic: self.topic,
            publish_timeout: self.publish_timeout,
            retries: self.retries,
            retry_backoff: self.retry_backoff,
        })
    }
}

// ---------------------------------------------------------------------------
// Alert text
// ---------------------------------------------------------------------------

/// Build the alert for a flagged window.
///
/// Card and contact come from the key, amounts from the verdict, and the time
/// range from the aggregate. Absent values render as `unknown`.
#[must_use]
pub fn build_alert(key: &AccountKey, aggregate: &WindowAggregate, verdict: &Verdict) -> AlertRecord {
    let details = format!(
        "Generate a short alert message to the user informing the transaction with the given \
         details is likely to be fraud. credit card number {} customer {} total spend {}  \
         average spend {} total number of transactions {} time period {}",
        or_unknown(key.card_identifier.as_ref()),
        or_unknown(key.customer_contact.as_ref()),
        or_unknown(verdict.total_amount.as_ref()),
        or_unknown(verdict.average_spend.as_ref()),
        or_unknown(verdict.transaction_count.as_ref()),
        aggregate.time_range(),
    );
    AlertRecord { details }
}

fn or_unknown<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(|| UNKNOWN.to_owned(), ToString::to_string)
}

// ---------------------------------------------------------------------------
// AlertEmitter
// ---------------------------------------------------------------------------

/// Encodes and publishes alerts, owning the producer-side `AlertSink`.
#[derive(Debug)]
pub struct AlertEmitter<R, S> {
    config: AlerterConfig,
    encoder: AlertEncoder<R>,
    sink: S,
}

impl<R: SchemaRegistry, S: AlertSink> AlertEmitter<R, S> {
    /// Create an emitter. `encoder` must target `config.topic`.
    #[must_use]
    pub fn new(config: AlerterConfig, encoder: AlertEncoder<R>, sink: S) -> Self {
        Self { config, encoder, sink }
    }

    /// The emitter configuration.
    #[must_use]
    pub fn config(&self) -> &AlerterConfig {
        &self.config
    }

    /// The owned sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Build, encode, and publish one alert; returns once the broker acknowledges.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Encode`] if the alert cannot be encoded (not retried),
    /// or [`EmitError::Publish`] once every publish attempt has failed.
    pub async fn emit(
        &self,
        key: &AccountKey,
        aggregate: &WindowAggregate,
        verdict: &Verdict,
    ) -> Result<DeliveryAck, EmitError> {
        let alert = build_alert(key, aggregate, verdict);
        let payload = self.encoder.encode(&alert).await?;

        let max_attempts = self.config.retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self
                .sink
                .publish(&self.config.topic, &payload, self.config.publish_timeout)
                .await
            {
                Ok(ack) => {
                    tracing::info!(
                        topic = %self.config.topic,
                        partition = ack.partition,
                        offset = ack.offset,
                        attempt,
                        "alerter.publish.acknowledged"
                    );
                    return Ok(ack);
                }
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(attempt, max_attempts, error = %e, "alerter.publish.retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    return Err(EmitError::Publish { attempts: attempt, source: e });
                }
            }
        }
    }

    /// Flush and release the sink.
    ///
    /// # Errors
    ///
    /// Returns [`CloseError`] if the sink fails to flush.
    pub async fn close(&self) -> Result<(), CloseError> {
        self.sink.close().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
