// Rust guideline compliant 2026-10-19

//! Feature feeder -- generates synthetic per-account window aggregates and
//! publishes them, key and value encoded, to the inbound topic through a
//! `RecordSink` port.
//!
//! Entry points: [`Feeder::generate`], [`Feeder::feed_once`], [`Feeder::run`].
//! Configuration via [`FeederConfig::builder`].

use codec::{KeyCodec, ValueCodec};
use domain::{
    AccountKey, DeliveryAck, EncodeError, PublishError, RecordSink, SchemaRegistry,
    WindowAggregate,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::cell::RefCell;
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// FeederError
// ---------------------------------------------------------------------------

/// Errors that can occur while feeding records.
#[derive(Debug, thiserror::Error)]
pub enum FeederError {
    /// The supplied configuration is invalid.
    #[error("invalid feeder configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The key could not be encoded.
    #[error("key encode error: {0}")]
    Encode(#[from] EncodeError),
    /// The broker did not acknowledge the record.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

// ---------------------------------------------------------------------------
// FeederConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Feeder`].
///
/// Construct via [`FeederConfig::builder`].
#[derive(Debug, Clone)]
pub struct FeederConfig {
    /// Topic records are published to.
    pub topic: String,
    /// Delay between successive records.
    pub interval: Duration,
    /// Optional upper bound on the number of records. `None` means until stopped.
    pub records: Option<u64>,
    /// Optional RNG seed for reproducible feeds. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Upper bound on waiting for one broker acknowledgement.
    pub publish_timeout: Duration,
}

/// Builder for [`FeederConfig`].
///
/// Obtain via [`FeederConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct FeederConfigBuilder {
    topic: String,
    interval: Duration,
    records: Option<u64>,
    seed: Option<u64>,
    publish_timeout: Duration,
}

impl FeederConfig {
    /// Create a builder. `topic` is the only required parameter.
    ///
    /// Default values: `interval = 100 ms`, `records = None`, `seed = None`,
    /// `publish_timeout = 10 s`.
    #[must_use]
    pub fn builder(topic: impl Into<String>) -> FeederConfigBuilder {
        FeederConfigBuilder {
            topic: topic.into(),
            interval: Duration::from_millis(100),
            records: None,
            seed: None,
            publish_timeout: Duration::from_secs(10),
        }
    }
}

impl FeederConfigBuilder {
    /// Override the inter-record delay.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set a finite record count.
    #[must_use]
    pub fn records(mut self, n: u64) -> Self {
        self.records = Some(n);
        self
    }

    /// Fix the RNG seed for deterministic output (useful in tests).
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the acknowledgement timeout.
    #[must_use]
    pub fn publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeederError::InvalidConfig`] when the topic is empty, the
    /// record count is zero, or the publish timeout is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<FeederConfig, FeederError> {
        if self.topic.trim().is_empty() {
            return Err(FeederError::InvalidConfig {
                reason: "topic must not be empty".to_owned(),
            });
        }
        if self.records == Some(0) {
            return Err(FeederError::InvalidConfig {
                reason: "records must be >= 1 when set".to_owned(),
            });
        }
        if self.publish_timeout.is_zero() {
            return Err(FeederError::InvalidConfig {
                reason: "publish_timeout must be > 0".to_owned(),
            });
        }
        Ok(FeederConfig {
            topic: self.topic,
            interval: self.interval,
            records: self.records,
            seed: self.seed,
            publish_timeout: self.publish_timeout,
        })
    }
}

// ---------------------------------------------------------------------------
// Feeder
// ---------------------------------------------------------------------------

/// Card pool used for synthetic accounts.
const CARDS: &[&str] = &[
    "4111111111111111",
    "4012888888881881",
    "5555555555554444",
    "5105105105105100",
    "378282246310005",
    "6011111111111117",
];

/// Customer name pool for synthetic contact addresses.
const CUSTOMERS: &[&str] = &["smith", "johnson", "garcia", "miller", "davis", "taylor"];

/// Share of accounts without an established spending baseline.
const NO_BASELINE_PROBABILITY: f64 = 0.05;

/// Generates random window aggregates and publishes them to a [`RecordSink`].
#[derive(Debug)]
pub struct Feeder<R> {
    config: FeederConfig,
    keys: KeyCodec<R>,
    values: ValueCodec,
    /// Interior mutability required because all public methods take `&self`.
    rng: RefCell<StdRng>,
}

impl<R: SchemaRegistry> Feeder<R> {
    /// Create a new feeder from `config`.
    ///
    /// Seeds the RNG from `config.seed` if set, otherwise from the OS.
    #[must_use]
    pub fn new(config: FeederConfig, keys: KeyCodec<R>, values: ValueCodec) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, keys, values, rng: RefCell::new(rng) }
    }

    /// Generate one account key and its one-hour window aggregate.
    ///
    /// Counts fall in `[1, 5]`, totals in `[1, 2_000]`, baselines in
    /// `[50, 500]`; a small share of accounts has no baseline.
    #[must_use]
    pub fn generate(&self) -> (AccountKey, WindowAggregate) {
        let mut rng = self.rng.borrow_mut();

        let card = CARDS[rng.random_range(0..CARDS.len())];
        let customer = CUSTOMERS[rng.random_range(0..CUSTOMERS.len())];
        let average_spend = if rng.random_bool(NO_BASELINE_PROBABILITY) {
            None
        } else {
            Some(rng.random_range(50..=500))
        };
        let key = AccountKey {
            card_identifier: Some(card.to_owned()),
            average_spend,
            customer_contact: Some(format!("{customer}@example.com")),
        };

        let day = rng.random_range(1..=28);
        let hour = rng.random_range(0..23);
        let aggregate = WindowAggregate {
            total_amount: Some(rng.random_range(1..=2_000)),
            transaction_count: Some(rng.random_range(1..=5)),
            window_start: Some(format!("2024-01-{day:02}T{hour:02}:00")),
            window_end: Some(format!("2024-01-{day:02}T{:02}:00", hour + 1)),
        };
        (key, aggregate)
    }

    /// Generate one record, encode it and publish it to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`FeederError::Encode`] if the key cannot be encoded, or
    /// [`FeederError::Publish`] if the broker does not acknowledge.
    pub async fn feed_once<S: RecordSink>(&self, sink: &S) -> Result<DeliveryAck, FeederError> {
        let (key, aggregate) = self.generate();
        let key_bytes = self.keys.encode(&key, &self.config.topic).await?;
        let value_bytes = self.values.encode(&aggregate, None);
        let ack = sink
            .send(&self.config.topic, &key_bytes, &value_bytes, self.config.publish_timeout)
            .await?;
        tracing::debug!(
            partition = ack.partition,
            offset = ack.offset,
            card = key.card_identifier.as_deref(),
            "feeder.record.published"
        );
        Ok(ack)
    }

    /// Run the feed loop until `stop` reads `true` or `records` have been sent.
    ///
    /// Returns the number of records published.
    ///
    /// # Errors
    ///
    /// Returns the first [`FeederError`] from [`feed_once`](Self::feed_once).
    pub async fn run<S: RecordSink>(
        &self,
        sink: &S,
        stop: watch::Receiver<bool>,
    ) -> Result<u64, FeederError> {
        let mut count = 0u64;
        loop {
            if *stop.borrow() {
                tracing::info!(count, "feeder.run.stopped");
                return Ok(count);
            }

            self.feed_once(sink).await?;
            count += 1;

            if let Some(max) = self.config.records
                && count >= max
            {
                tracing::info!(count, "feeder.run.record_limit_reached");
                return Ok(count);
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
