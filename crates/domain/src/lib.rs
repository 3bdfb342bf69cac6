// Rust guideline compliant 2026-10-19

//! Shared domain types for the fraud-alert pipeline.
//!
//! Defines the decoded record types (`AccountKey`, `WindowAggregate`), the
//! decision output (`Verdict`, `AlertRecord`), the error enums, and the
//! hexagonal port traits: `RecordSource`, `AlertSink`, `SchemaRegistry`, and
//! `FraudRule`. All pipeline components depend on this crate; it performs no I/O.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Decoded records
// ---------------------------------------------------------------------------

/// Identifies the account under evaluation. Decoded from the record key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountKey {
    /// Opaque card identifier.
    pub card_identifier: Option<String>,
    /// Rolling baseline spend for the account.
    pub average_spend: Option<i64>,
    /// Customer contact (e-mail address in practice).
    pub customer_contact: Option<String>,
}

/// Pre-computed statistics over one time window. Decoded from the record value.
///
/// `window_start <= window_end` is assumed upstream and never checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowAggregate {
    /// Sum of transaction amounts in the window.
    pub total_amount: Option<i64>,
    /// Number of transactions in the window.
    pub transaction_count: Option<i64>,
    /// Window start timestamp, as produced upstream.
    pub window_start: Option<String>,
    /// Window end timestamp, as produced upstream.
    pub window_end: Option<String>,
}

impl WindowAggregate {
    /// Time range covered by this aggregate.
    #[must_use]
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.window_start.clone(),
            end: self.window_end.clone(),
        }
    }
}

/// Human-readable window bounds. Renders as `"{start} to {end}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Window start, if known.
    pub start: Option<String>,
    /// Window end, if known.
    pub end: Option<String>,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.as_deref().unwrap_or(UNKNOWN),
            self.end.as_deref().unwrap_or(UNKNOWN)
        )
    }
}

/// Placeholder rendered for any absent value in human-readable output.
pub const UNKNOWN: &str = "unknown";

/// Output of a `FraudRule` evaluation, carrying the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// `true` if the rule flagged the window as fraudulent.
    pub is_fraudulent: bool,
    /// Total amount the rule compared.
    pub total_amount: Option<i64>,
    /// Transaction count the rule compared.
    pub transaction_count: Option<i64>,
    /// Baseline spend the rule compared against.
    pub average_spend: Option<i64>,
    /// Window the verdict applies to.
    pub time_range: TimeRange,
}

/// Outbound alert payload: a single human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    /// Alert text sent to the downstream topic.
    pub details: String,
}

// ---------------------------------------------------------------------------
// Broker records
// ---------------------------------------------------------------------------

/// Owned copy of one record polled from the inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Offset of this record within its partition.
    pub offset: i64,
    /// Raw key bytes; `None` for a null key.
    pub key: Option<Vec<u8>>,
    /// Raw value bytes; `None` for a tombstone.
    pub value: Option<Vec<u8>>,
}

impl InboundRecord {
    /// Position of this record, used as the commit target once handled.
    #[must_use]
    pub fn position(&self) -> RecordPosition {
        RecordPosition {
            topic: self.topic.clone(),
            partition: self.partition,
            offset: self.offset,
        }
    }
}

/// Topic / partition / offset of a handled record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordPosition {
    /// Topic name.
    pub topic: String,
    /// Partition number.
    pub partition: i32,
    /// Offset of the handled record.
    pub offset: i64,
}

impl RecordPosition {
    /// Offset to commit: the next record to read on this partition.
    #[must_use]
    pub fn next_offset(&self) -> i64 {
        self.offset + 1
    }
}

impl fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// Broker acknowledgement for a published alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAck {
    /// Partition the alert landed on.
    pub partition: i32,
    /// Offset assigned by the broker.
    pub offset: i64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the schema-registry port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registry could not be reached (network failure or timeout).
    #[error("schema registry unreachable: {reason}")]
    Unreachable {
        /// Human-readable description.
        reason: String,
    },
    /// The registry rejected our credentials.
    #[error("schema registry rejected credentials (HTTP {status})")]
    Unauthorized {
        /// HTTP status code returned.
        status: u16,
    },
    /// No schema is registered under the requested id.
    #[error("schema id {id} not found in registry")]
    NotFound {
        /// Requested schema id.
        id: u32,
    },
    /// The registry answered with something we could not interpret.
    #[error("unexpected schema registry response: {reason}")]
    BadResponse {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the dual codec layer. Absent bytes are not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The Confluent wire-format header is missing or invalid.
    #[error("invalid wire header on {topic}: {reason}")]
    Header {
        /// Source topic.
        topic: String,
        /// Human-readable description.
        reason: String,
    },
    /// The payload could not be parsed at all.
    #[error("malformed payload on {topic}: {reason}")]
    Malformed {
        /// Source topic.
        topic: String,
        /// Human-readable description.
        reason: String,
    },
    /// The writer schema does not resolve into the expected record shape.
    #[error("schema mismatch on {topic}: {reason}")]
    SchemaMismatch {
        /// Source topic.
        topic: String,
        /// Human-readable description.
        reason: String,
    },
    /// A field is present but has the wrong type.
    #[error("field {field} on {topic} has wrong type: {reason}")]
    FieldType {
        /// Source topic.
        topic: String,
        /// Offending field name.
        field: String,
        /// Human-readable description.
        reason: String,
    },
    /// The writer schema could not be resolved from the registry.
    #[error("schema resolution failed on {topic}: {source}")]
    Registry {
        /// Source topic.
        topic: String,
        /// Underlying registry failure.
        source: RegistryError,
    },
}

impl DecodeError {
    /// `true` for infrastructure faults (registry), `false` for bad data.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Registry { .. })
    }
}

/// Errors encoding an outbound payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The payload does not fit the schema.
    #[error("payload does not match schema: {reason}")]
    Schema {
        /// Human-readable description.
        reason: String,
    },
    /// The schema could not be registered.
    #[error("schema registration failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors from the alert-sink port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The broker rejected or failed the delivery.
    #[error("delivery to {topic} failed: {reason}")]
    Rejected {
        /// Target topic.
        topic: String,
        /// Human-readable description.
        reason: String,
    },
    /// No acknowledgement arrived in time.
    #[error("delivery to {topic} timed out after {timeout:?}")]
    TimedOut {
        /// Target topic.
        topic: String,
        /// Configured delivery timeout.
        timeout: Duration,
    },
}

/// Errors from alert emission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    /// The alert could not be encoded.
    #[error("alert encode failed: {0}")]
    Encode(#[from] EncodeError),
    /// The alert could not be published after all attempts.
    #[error("alert publish failed after {attempts} attempt(s): {source}")]
    Publish {
        /// Number of attempts made.
        attempts: u32,
        /// Last publish failure.
        source: PublishError,
    },
}

/// Transient error attached to a poll result by the broker transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("broker poll error: {reason}")]
pub struct BrokerPollError {
    /// Human-readable description.
    pub reason: String,
}

/// Errors committing an offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("commit of {position} failed: {reason}")]
pub struct CommitError {
    /// Position that failed to commit.
    pub position: RecordPosition,
    /// Human-readable description.
    pub reason: String,
}

/// Errors releasing broker handles at shutdown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to close {handle}: {reason}")]
pub struct CloseError {
    /// Which handle failed (`"consumer"`, `"producer"`).
    pub handle: String,
    /// Human-readable description.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Hexagonal port: the inbound side of the broker.
///
/// The orchestrator owns exactly one source for its lifetime.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait RecordSource {
    /// Wait up to `timeout` for the next record.
    ///
    /// Returns `Ok(None)` when no record arrived in time.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerPollError`] when the transport attached an error to the poll.
    async fn poll(&self, timeout: Duration) -> Result<Option<InboundRecord>, BrokerPollError>;

    /// Commit `position` so the partition resumes after it. Returns once acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError`] when the broker refuses the commit.
    async fn commit(&self, position: &RecordPosition) -> Result<(), CommitError>;

    /// Release the consumer: final commit and partition release.
    ///
    /// # Errors
    ///
    /// Returns [`CloseError`] when the broker reports an unrecoverable error.
    async fn close(&self) -> Result<(), CloseError>;
}

/// Hexagonal port: the outbound side of the broker.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait AlertSink {
    /// Publish a value-only record to `topic` and wait for acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] on broker failure or when `timeout` elapses.
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<DeliveryAck, PublishError>;

    /// Flush outstanding deliveries and release the producer.
    ///
    /// # Errors
    ///
    /// Returns [`CloseError`] if the flush fails.
    async fn close(&self) -> Result<(), CloseError>;
}

/// Hexagonal port: keyed publishing of inbound-shaped records (synthetic feeds).
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait RecordSink {
    /// Publish a keyed record to `topic` and wait for acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] on broker failure or when `timeout` elapses.
    async fn send(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
        timeout: Duration,
    ) -> Result<DeliveryAck, PublishError>;
}

/// Hexagonal port: the external schema registry.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait SchemaRegistry {
    /// Fetch the schema text registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on network, auth, or lookup failure.
    async fn schema_by_id(&self, id: u32) -> Result<String, RegistryError>;

    /// Register `schema` under `subject` and return its id. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on network, auth, or compatibility failure.
    async fn register(&self, subject: &str, schema: &str) -> Result<u32, RegistryError>;
}

/// Hexagonal port: the fraud decision.
///
/// Implementations must be pure and must not panic on absent inputs.
pub trait FraudRule {
    /// Evaluate one correlated key / aggregate pair.
    fn evaluate(&self, key: &AccountKey, aggregate: &WindowAggregate) -> Verdict;

    /// Name of this rule, for logs.
    fn name(&self) -> &str;
}
