// Rust guideline compliant 2026-10-19

//! Kafka adapter for the `RecordSource` port.
//!
//! Offsets are committed only on request (auto-commit and auto-store
//! disabled), so the broker-side cursor never moves past a record the
//! pipeline has not finished handling. A commit that fails is remembered per
//! partition and retried synchronously at close.

use super::client_config;
use crate::settings::KafkaSettings;
use domain::{BrokerPollError, CloseError, CommitError, InboundRecord, RecordPosition, RecordSource};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Consumer properties on top of the shared connection properties.
#[must_use]
pub fn consumer_config(settings: &KafkaSettings) -> ClientConfig {
    let mut config = client_config(settings);
    config
        .set("group.id", &settings.group_id)
        .set("session.timeout.ms", settings.session_timeout_ms.to_string())
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", "earliest");
    config
}

/// Next offsets whose commit the broker rejected, keyed by topic and partition.
///
/// Commits are cumulative, so a later acknowledged commit on the same
/// partition settles an earlier failure.
#[derive(Debug, Default)]
struct PendingCommits {
    offsets: BTreeMap<(String, i32), i64>,
}

impl PendingCommits {
    fn failed(&mut self, position: &RecordPosition) {
        let next = position.next_offset();
        self.offsets
            .entry((position.topic.clone(), position.partition))
            .and_modify(|offset| *offset = (*offset).max(next))
            .or_insert(next);
    }

    fn committed(&mut self, position: &RecordPosition) {
        let key = (position.topic.clone(), position.partition);
        if self.offsets.get(&key).is_some_and(|&offset| offset <= position.next_offset()) {
            self.offsets.remove(&key);
        }
    }

    fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    fn to_list(&self) -> Result<TopicPartitionList, KafkaError> {
        let mut list = TopicPartitionList::new();
        for ((topic, partition), offset) in &self.offsets {
            list.add_partition_offset(topic, *partition, Offset::Offset(*offset))?;
        }
        Ok(list)
    }
}

/// `RecordSource` backed by an rdkafka `StreamConsumer` subscribed to one topic.
pub struct KafkaRecordSource {
    consumer: StreamConsumer,
    topic: String,
    pending: RefCell<PendingCommits>,
}

impl KafkaRecordSource {
    /// Create the consumer and subscribe to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`KafkaError`] if the client cannot be created or subscribed.
    pub fn new(settings: &KafkaSettings, topic: &str) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = consumer_config(settings).create()?;
        consumer.subscribe(&[topic])?;
        tracing::info!(topic, group_id = %settings.group_id, "kafka_source.subscribed");
        Ok(Self {
            consumer,
            topic: topic.to_owned(),
            pending: RefCell::default(),
        })
    }
}

impl fmt::Debug for KafkaRecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaRecordSource")
            .field("topic", &self.topic)
            .field("pending", &self.pending.borrow().offsets.len())
            .finish_non_exhaustive()
    }
}

impl RecordSource for KafkaRecordSource {
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundRecord>, BrokerPollError> {
        let Ok(received) = tokio::time::timeout(timeout, self.consumer.recv()).await else {
            return Ok(None);
        };
        let message = received.map_err(|e| BrokerPollError { reason: e.to_string() })?;
        Ok(Some(InboundRecord {
            topic: message.topic().to_owned(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
        }))
    }

    async fn commit(&self, position: &RecordPosition) -> Result<(), CommitError> {
        let failed = |e: KafkaError| CommitError { position: position.clone(), reason: e.to_string() };
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &position.topic,
                position.partition,
                Offset::Offset(position.next_offset()),
            )
            .map_err(failed)?;
        match self.consumer.commit(&offsets, CommitMode::Sync) {
            Ok(()) => {
                self.pending.borrow_mut().committed(position);
                Ok(())
            }
            Err(e) => {
                self.pending.borrow_mut().failed(position);
                Err(failed(e))
            }
        }
    }

    async fn close(&self) -> Result<(), CloseError> {
        let close_failed =
            |e: KafkaError| CloseError { handle: "consumer".to_owned(), reason: e.to_string() };
        if !self.pending.borrow().is_empty() {
            let offsets = self.pending.borrow().to_list().map_err(close_failed)?;
            self.consumer.commit(&offsets, CommitMode::Sync).map_err(close_failed)?;
            *self.pending.borrow_mut() = PendingCommits::default();
            tracing::info!(partitions = offsets.count(), "kafka_source.pending.committed");
        }
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "kafka_source.closed");
        Ok(())
    }
}
