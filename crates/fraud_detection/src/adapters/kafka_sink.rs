// Rust guideline compliant 2026-10-19

//! Kafka adapter for the `AlertSink` and `RecordSink` ports.
//!
//! Every send waits for the broker acknowledgement (`acks=all`), bounded by
//! the caller's timeout.

use super::client_config;
use crate::settings::KafkaSettings;
use domain::{AlertSink, CloseError, DeliveryAck, PublishError, RecordSink};
use rdkafka::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::fmt;
use std::time::Duration;

/// Upper bound on draining queued deliveries at close.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Producer properties on top of the shared connection properties.
#[must_use]
pub fn producer_config(settings: &KafkaSettings, publish_timeout: Duration) -> ClientConfig {
    let mut config = client_config(settings);
    config
        .set("acks", "all")
        .set("message.timeout.ms", publish_timeout.as_millis().to_string());
    config
}

/// Publishes through an rdkafka `FutureProducer`.
pub struct KafkaSink {
    producer: FutureProducer,
}

impl KafkaSink {
    /// Create the producer.
    ///
    /// # Errors
    ///
    /// Returns [`KafkaError`] if the client cannot be created.
    pub fn new(settings: &KafkaSettings, publish_timeout: Duration) -> Result<Self, KafkaError> {
        let producer: FutureProducer = producer_config(settings, publish_timeout).create()?;
        Ok(Self { producer })
    }

    async fn deliver(
        &self,
        record: FutureRecord<'_, [u8], [u8]>,
        topic: &str,
        timeout: Duration,
    ) -> Result<DeliveryAck, PublishError> {
        let timed_out = || PublishError::TimedOut { topic: topic.to_owned(), timeout };
        let delivery = tokio::time::timeout(timeout, self.producer.send(record, Timeout::After(timeout)))
            .await
            .map_err(|_elapsed| timed_out())?;
        match delivery {
            Ok((partition, offset)) => Ok(DeliveryAck { partition, offset }),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut), _)) => {
                Err(timed_out())
            }
            Err((e, _)) => Err(PublishError::Rejected { topic: topic.to_owned(), reason: e.to_string() }),
        }
    }
}

impl fmt::Debug for KafkaSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaSink")
            .field("in_flight", &self.producer.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl AlertSink for KafkaSink {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<DeliveryAck, PublishError> {
        let record = FutureRecord::<[u8], [u8]>::to(topic).payload(payload);
        self.deliver(record, topic, timeout).await
    }

    async fn close(&self) -> Result<(), CloseError> {
        self.producer
            .flush(Timeout::After(FLUSH_TIMEOUT))
            .map_err(|e| CloseError { handle: "producer".to_owned(), reason: e.to_string() })?;
        tracing::info!("kafka_sink.flushed");
        Ok(())
    }
}

impl RecordSink for KafkaSink {
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        timeout: Duration,
    ) -> Result<DeliveryAck, PublishError> {
        let record = FutureRecord::to(topic).key(key).payload(value);
        self.deliver(record, topic, timeout).await
    }
}
