// Rust guideline compliant 2026-10-19

//! Pipeline orchestrator: the consume / decode / decide / emit / commit loop.
//!
//! One record is in flight at a time. Its offset is committed only after its
//! handling (including any alert emission) has returned, which yields
//! at-least-once delivery under partial failure. Undecodable records and
//! alerts that stay unpublished after retries are logged and committed past
//! so a poison record never stalls its partition.
//!
//! Entry points: [`Pipeline::run_once`], [`Pipeline::run`], [`Pipeline::close`].
//! Configuration via [`PipelineConfig::builder`].

use alerter::AlertEmitter;
use codec::DualDecoder;
use domain::{
    AlertSink, BrokerPollError, CloseError, DecodeError, DeliveryAck, EmitError, FraudRule,
    InboundRecord, RecordPosition, RecordSource, SchemaRegistry,
};
use std::cell::Cell;
use std::time::Duration;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that end a pipeline run or prevent it from starting.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The supplied configuration is invalid.
    #[error("invalid pipeline configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A broker handle failed to close; the run ends in [`PipelineState::Failed`].
    #[error("pipeline failed on close: {0}")]
    Close(#[from] CloseError),
}

// ---------------------------------------------------------------------------
// PipelineConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Pipeline`].
///
/// Construct via [`PipelineConfig::builder`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on one wait for the next record.
    pub poll_timeout: Duration,
    /// Optional bound on the number of handled records. `None` runs until stopped.
    pub max_records: Option<u64>,
}

/// Builder for [`PipelineConfig`].
///
/// Obtain via [`PipelineConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    poll_timeout: Duration,
    max_records: Option<u64>,
}

impl PipelineConfig {
    /// Create a builder.
    ///
    /// Default values: `poll_timeout = 1 s`, `max_records = None`.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            poll_timeout: Duration::from_secs(1),
            max_records: None,
        }
    }
}

impl PipelineConfigBuilder {
    /// Override the poll timeout.
    #[must_use]
    pub fn poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Stop after `n` handled records. Without this the pipeline runs until
    /// the stop signal fires.
    #[must_use]
    pub fn max_records(mut self, n: u64) -> Self {
        self.max_records = Some(n);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when `poll_timeout` is zero or
    /// `max_records` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        if self.poll_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig {
                reason: "poll_timeout must be > 0".to_owned(),
            });
        }
        if self.max_records == Some(0) {
            return Err(PipelineError::InvalidConfig {
                reason: "max_records must be >= 1 when set".to_owned(),
            });
        }
        Ok(PipelineConfig {
            poll_timeout: self.poll_timeout,
            max_records: self.max_records,
        })
    }
}

// ---------------------------------------------------------------------------
// State, outcomes, stats
// ---------------------------------------------------------------------------

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Waiting for the next record.
    Polling,
    /// Decoding key then value.
    Decoding,
    /// Correlating and evaluating the rule.
    Deciding,
    /// Publishing an alert.
    Emitting,
    /// Committing the handled record's offset.
    Committing,
    /// Closed cleanly after a stop.
    Stopped,
    /// A broker handle failed to close.
    Failed,
}

/// How one polled record was handled before its commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Key or value was absent; nothing was evaluated.
    Tombstone,
    /// The rule returned a negative verdict.
    Cleared,
    /// An alert was published and acknowledged.
    Alerted(DeliveryAck),
    /// The rule flagged the record but the alert could not be published.
    AlertFailed(EmitError),
    /// Key or value could not be decoded.
    Undecodable(DecodeError),
}

/// Result of one [`Pipeline::run_once`] cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No record arrived within the poll timeout.
    Idle,
    /// The poll itself reported an error; nothing was committed.
    PollFailed(BrokerPollError),
    /// A record was handled and a commit attempted.
    Handled {
        /// Where the record came from.
        position: RecordPosition,
        /// What happened to it.
        outcome: RecordOutcome,
        /// Whether the commit was acknowledged.
        committed: bool,
    },
}

/// Counters over the lifetime of a [`Pipeline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records received from the source.
    pub polled: u64,
    /// Polls that returned a transport error.
    pub poll_failures: u64,
    /// Records with a null key or value, committed without evaluation.
    pub tombstones: u64,
    /// Records evaluated as not fraudulent.
    pub cleared: u64,
    /// Alerts acknowledged by the broker.
    pub alerts: u64,
    /// Flagged records whose alert was never acknowledged.
    pub alert_failures: u64,
    /// Records whose key or value could not be decoded, committed past.
    pub decode_failures: u64,
    /// Acknowledged commits.
    pub commits: u64,
    /// Commits the source rejected.
    pub commit_failures: u64,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Drives records from a [`RecordSource`] through decoding, the rule and
/// alert emission, committing each one after it is handled.
///
/// Generic over the ports for static dispatch. Owns the consumer handle (the
/// source) and, through the emitter, the producer handle.
#[derive(Debug)]
pub struct Pipeline<Src, R, F, S> {
    config: PipelineConfig,
    source: Src,
    decoder: DualDecoder<R>,
    rule: F,
    emitter: AlertEmitter<R, S>,
    state: Cell<PipelineState>,
    stats: Cell<PipelineStats>,
}

impl<Src, R, F, S> Pipeline<Src, R, F, S>
where
    Src: RecordSource,
    R: SchemaRegistry,
    F: FraudRule,
    S: AlertSink,
{
    /// Assemble a pipeline from its parts.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        source: Src,
        decoder: DualDecoder<R>,
        rule: F,
        emitter: AlertEmitter<R, S>,
    ) -> Self {
        Self {
            config,
            source,
            decoder,
            rule,
            emitter,
            state: Cell::new(PipelineState::Polling),
            stats: Cell::new(PipelineStats::default()),
        }
    }

    /// Current loop state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.stats.get()
    }

    /// Perform one poll cycle: poll, and if a record arrived, handle and commit it.
    ///
    /// Never fails: every per-record error is logged and reflected in the
    /// returned [`CycleOutcome`].
    pub async fn run_once(&self) -> CycleOutcome {
        self.state.set(PipelineState::Polling);
        let record = match self.source.poll(self.config.poll_timeout).await {
            Ok(Some(record)) => record,
            Ok(None) => return CycleOutcome::Idle,
            Err(e) => {
                tracing::warn!(error = %e, "pipeline.poll.failed");
                self.bump(|s| s.poll_failures += 1);
                return CycleOutcome::PollFailed(e);
            }
        };
        self.bump(|s| s.polled += 1);

        let position = record.position();
        let outcome = self.handle(&record).await;

        self.state.set(PipelineState::Committing);
        let committed = match self.source.commit(&position).await {
            Ok(()) => {
                tracing::debug!(%position, "pipeline.record.committed");
                self.bump(|s| s.commits += 1);
                true
            }
            Err(e) => {
                tracing::warn!(%position, error = %e, "pipeline.commit.failed");
                self.bump(|s| s.commit_failures += 1);
                false
            }
        };

        CycleOutcome::Handled { position, outcome, committed }
    }

    /// Run cycles until `stop` reads `true` or `max_records` records have been
    /// handled, then close both broker handles.
    ///
    /// The stop signal is checked between cycles only; a record already
    /// polled is always handled and committed first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Close`] if either handle fails to close.
    pub async fn run(&self, stop: watch::Receiver<bool>) -> Result<PipelineStats, PipelineError> {
        tracing::info!(rule = self.rule.name(), "pipeline.run.started");
        let mut handled = 0u64;
        loop {
            if *stop.borrow() {
                tracing::info!(handled, "pipeline.run.stop_requested");
                break;
            }

            if let CycleOutcome::Handled { .. } = self.run_once().await {
                handled += 1;
            }

            if let Some(max) = self.config.max_records
                && handled >= max
            {
                tracing::info!(handled, "pipeline.run.record_limit_reached");
                break;
            }
        }
        self.close().await
    }

    /// Close the consumer (final commit, partition release), then flush and
    /// close the producer.
    ///
    /// Both handles are closed even if the first fails; the first error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Close`] and enters [`PipelineState::Failed`]
    /// when a handle fails to close.
    pub async fn close(&self) -> Result<PipelineStats, PipelineError> {
        let consumer = self.source.close().await;
        if let Err(e) = &consumer {
            tracing::error!(error = %e, "pipeline.consumer.close_failed");
        }
        let producer = self.emitter.close().await;
        if let Err(e) = &producer {
            tracing::error!(error = %e, "pipeline.producer.close_failed");
        }

        let stats = self.stats();
        tracing::info!(
            polled = stats.polled,
            poll_failures = stats.poll_failures,
            tombstones = stats.tombstones,
            cleared = stats.cleared,
            alerts = stats.alerts,
            alert_failures = stats.alert_failures,
            decode_failures = stats.decode_failures,
            commits = stats.commits,
            commit_failures = stats.commit_failures,
            "pipeline.run.stats"
        );

        match consumer.and(producer) {
            Ok(()) => {
                self.state.set(PipelineState::Stopped);
                tracing::info!("pipeline.run.stopped");
                Ok(stats)
            }
            Err(e) => {
                self.state.set(PipelineState::Failed);
                Err(PipelineError::Close(e))
            }
        }
    }

    async fn handle(&self, record: &InboundRecord) -> RecordOutcome {
        self.state.set(PipelineState::Decoding);
        let key = match self.decoder.decode_key(record.key.as_deref(), &record.topic).await {
            Ok(key) => key,
            Err(e) => return self.undecodable(record, e),
        };
        let aggregate = match self.decoder.decode_value(record.value.as_deref(), &record.topic) {
            Ok(aggregate) => aggregate,
            Err(e) => return self.undecodable(record, e),
        };

        self.state.set(PipelineState::Deciding);
        let (Some(key), Some(aggregate)) = (key, aggregate) else {
            tracing::debug!(position = %record.position(), "pipeline.record.tombstone");
            self.bump(|s| s.tombstones += 1);
            return RecordOutcome::Tombstone;
        };

        let verdict = self.rule.evaluate(&key, &aggregate);
        if !verdict.is_fraudulent {
            self.bump(|s| s.cleared += 1);
            return RecordOutcome::Cleared;
        }

        self.state.set(PipelineState::Emitting);
        match self.emitter.emit(&key, &aggregate, &verdict).await {
            Ok(ack) => {
                tracing::info!(
                    position = %record.position(),
                    alert_partition = ack.partition,
                    alert_offset = ack.offset,
                    "pipeline.alert.emitted"
                );
                self.bump(|s| s.alerts += 1);
                RecordOutcome::Alerted(ack)
            }
            Err(e) => {
                tracing::error!(position = %record.position(), error = %e, "pipeline.alert.failed");
                self.bump(|s| s.alert_failures += 1);
                RecordOutcome::AlertFailed(e)
            }
        }
    }

    fn undecodable(&self, record: &InboundRecord, error: DecodeError) -> RecordOutcome {
        let class = if error.is_infrastructure() { "infrastructure" } else { "data" };
        tracing::error!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            class,
            error = %error,
            "pipeline.record.undecodable"
        );
        self.bump(|s| s.decode_failures += 1);
        RecordOutcome::Undecodable(error)
    }

    fn bump(&self, update: impl FnOnce(&mut PipelineStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{
        CycleOutcome, Pipeline, PipelineConfig, PipelineError, PipelineState, PipelineStats,
        RecordOutcome,
    };
    use alerter::{AlertEmitter, AlerterConfig};
    use codec::{AlertEncoder, DualDecoder, KeyCodec, SchemaCache, ValueCodec};
    use domain::{
        AccountKey, AlertSink, BrokerPollError, CloseError, CommitError, DecodeError,
        DeliveryAck, EmitError, InboundRecord, PublishError, RecordPosition, RecordSource,
        RegistryError, SchemaRegistry, WindowAggregate,
    };
    use rule::ThresholdRule;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::sync::watch;

    const INPUT: &str = "FEATURE_SET";
    const ALERTS: &str = "fraudulent_transactions";

    type Events = Rc<RefCell<Vec<String>>>;
    type Poll = Result<Option<InboundRecord>, BrokerPollError>;
    type TestPipeline = Pipeline<MockSource, MemoryRegistry, ThresholdRule, MockSink>;

    // ------------------------------------------------------------------
    // Mock adapters
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryRegistry {
        schemas: RefCell<Vec<(String, String)>>,
    }

    impl SchemaRegistry for MemoryRegistry {
        async fn schema_by_id(&self, id: u32) -> Result<String, RegistryError> {
            let index = usize::try_from(id).unwrap().wrapping_sub(1);
            self.schemas
                .borrow()
                .get(index)
                .map(|(_, schema)| schema.clone())
                .ok_or(RegistryError::NotFound { id })
        }

        async fn register(&self, subject: &str, schema: &str) -> Result<u32, RegistryError> {
            let mut schemas = self.schemas.borrow_mut();
            let index = match schemas.iter().position(|(s, _)| s == subject) {
                Some(index) => index,
                None => {
                    schemas.push((subject.to_owned(), schema.to_owned()));
                    schemas.len() - 1
                }
            };
            Ok(u32::try_from(index + 1).unwrap())
        }
    }

    struct MockSource {
        polls: RefCell<VecDeque<Poll>>,
        events: Events,
        fail_commit: bool,
        fail_close: bool,
        stop_after_first_poll: Option<watch::Sender<bool>>,
    }

    impl RecordSource for MockSource {
        async fn poll(&self, _timeout: Duration) -> Poll {
            if let Some(stop) = &self.stop_after_first_poll {
                stop.send_replace(true);
            }
            self.polls.borrow_mut().pop_front().unwrap_or(Ok(None))
        }

        async fn commit(&self, position: &RecordPosition) -> Result<(), CommitError> {
            if self.fail_commit {
                return Err(CommitError {
                    position: position.clone(),
                    reason: "mock".to_owned(),
                });
            }
            self.events
                .borrow_mut()
                .push(format!("commit {}", position.next_offset()));
            Ok(())
        }

        async fn close(&self) -> Result<(), CloseError> {
            self.events.borrow_mut().push("close source".to_owned());
            if self.fail_close {
                return Err(CloseError {
                    handle: "consumer".to_owned(),
                    reason: "mock".to_owned(),
                });
            }
            Ok(())
        }
    }

    struct MockSink {
        events: Events,
        failures_before_success: Cell<u32>,
    }

    impl AlertSink for MockSink {
        async fn publish(
            &self,
            topic: &str,
            _payload: &[u8],
            timeout: Duration,
        ) -> Result<DeliveryAck, PublishError> {
            let remaining = self.failures_before_success.get();
            if remaining > 0 {
                self.failures_before_success.set(remaining - 1);
                self.events.borrow_mut().push(format!("publish {topic} failed"));
                return Err(PublishError::TimedOut { topic: topic.to_owned(), timeout });
            }
            self.events.borrow_mut().push(format!("publish {topic}"));
            Ok(DeliveryAck { partition: 0, offset: 42 })
        }

        async fn close(&self) -> Result<(), CloseError> {
            self.events.borrow_mut().push("close sink".to_owned());
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Fixture
    // ------------------------------------------------------------------

    struct Fixture {
        registry: Rc<SchemaCache<MemoryRegistry>>,
        events: Events,
        next_offset: Cell<i64>,
        publish_failures: u32,
        fail_commit: bool,
        fail_close: bool,
        stop: RefCell<Option<watch::Sender<bool>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Rc::new(SchemaCache::new(MemoryRegistry::default())),
                events: Rc::default(),
                next_offset: Cell::new(0),
                publish_failures: 0,
                fail_commit: false,
                fail_close: false,
                stop: RefCell::new(None),
            }
        }

        async fn record(
            &self,
            key: Option<&AccountKey>,
            aggregate: Option<&WindowAggregate>,
        ) -> InboundRecord {
            let key = match key {
                Some(key) => {
                    let codec = KeyCodec::new(Rc::clone(&self.registry)).unwrap();
                    Some(codec.encode(key, INPUT).await.unwrap())
                }
                None => None,
            };
            let value = aggregate.map(|a| ValueCodec::new().unwrap().encode(a, None));
            self.raw_record(key, value)
        }

        fn raw_record(&self, key: Option<Vec<u8>>, value: Option<Vec<u8>>) -> InboundRecord {
            let offset = self.next_offset.get();
            self.next_offset.set(offset + 1);
            InboundRecord { topic: INPUT.to_owned(), partition: 0, offset, key, value }
        }

        fn pipeline(&self, polls: Vec<Poll>, max_records: Option<u64>) -> TestPipeline {
            let source = MockSource {
                polls: RefCell::new(polls.into()),
                events: Rc::clone(&self.events),
                fail_commit: self.fail_commit,
                fail_close: self.fail_close,
                stop_after_first_poll: self.stop.borrow_mut().take(),
            };
            let sink = MockSink {
                events: Rc::clone(&self.events),
                failures_before_success: Cell::new(self.publish_failures),
            };
            let alerter_config = AlerterConfig::builder(ALERTS)
                .retries(1)
                .retry_backoff(Duration::ZERO)
                .build()
                .unwrap();
            let encoder = AlertEncoder::new(Rc::clone(&self.registry), ALERTS).unwrap();
            let emitter = AlertEmitter::new(alerter_config, encoder, sink);
            let decoder = DualDecoder::new(Rc::clone(&self.registry)).unwrap();

            let mut builder = PipelineConfig::builder().poll_timeout(Duration::from_millis(10));
            if let Some(max) = max_records {
                builder = builder.max_records(max);
            }
            Pipeline::new(builder.build().unwrap(), source, decoder, ThresholdRule::default(), emitter)
        }

        fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }
    }

    fn key() -> AccountKey {
        AccountKey {
            card_identifier: Some("4111".to_owned()),
            average_spend: Some(100),
            customer_contact: Some("a@x.com".to_owned()),
        }
    }

    fn window(total: i64, count: i64) -> WindowAggregate {
        WindowAggregate {
            total_amount: Some(total),
            transaction_count: Some(count),
            window_start: Some("2024-01-01T00:00".to_owned()),
            window_end: Some("2024-01-01T01:00".to_owned()),
        }
    }

    fn running() -> watch::Receiver<bool> {
        // A dropped sender leaves the last value readable.
        watch::channel(false).1
    }

    // ------------------------------------------------------------------
    // Config validation
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_zero_poll_timeout() {
        let result = PipelineConfig::builder().poll_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_zero_max_records() {
        let result = PipelineConfig::builder().max_records(0).build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig { .. })));
    }

    #[test]
    fn builder_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
        assert_eq!(config.max_records, None);
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn busy_window_over_baseline_alerts_then_commits() {
        let fixture = Fixture::new();
        let record = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        let CycleOutcome::Handled { position, outcome, committed } = outcome else {
            panic!("expected a handled record, got {outcome:?}");
        };
        assert_eq!(position.offset, 0);
        assert_eq!(outcome, RecordOutcome::Alerted(DeliveryAck { partition: 0, offset: 42 }));
        assert!(committed);
        assert_eq!(fixture.events(), vec![format!("publish {ALERTS}"), "commit 1".to_owned()]);
        assert_eq!(pipeline.state(), PipelineState::Committing);
    }

    #[tokio::test]
    async fn single_transaction_window_commits_without_alert() {
        let fixture = Fixture::new();
        let record = fixture.record(Some(&key()), Some(&window(50, 1))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Handled { outcome: RecordOutcome::Cleared, committed: true, .. }
        ));
        assert_eq!(fixture.events(), vec!["commit 1".to_owned()]);
    }

    #[tokio::test]
    async fn value_tombstone_commits_without_evaluation() {
        let fixture = Fixture::new();
        let record = fixture.record(Some(&key()), None).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Handled { outcome: RecordOutcome::Tombstone, committed: true, .. }
        ));
        let stats = pipeline.stats();
        assert_eq!((stats.tombstones, stats.decode_failures, stats.alerts), (1, 0, 0));
    }

    #[tokio::test]
    async fn key_tombstone_commits_without_evaluation() {
        let fixture = Fixture::new();
        let record = fixture.record(None, Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Handled { outcome: RecordOutcome::Tombstone, committed: true, .. }
        ));
        assert_eq!(fixture.events(), vec!["commit 1".to_owned()]);
        let stats = pipeline.stats();
        assert_eq!((stats.tombstones, stats.cleared, stats.alerts), (1, 0, 0));
    }

    #[tokio::test]
    async fn truncated_key_is_undecodable_not_cleared() {
        let fixture = Fixture::new();
        let mut key_bytes = KeyCodec::new(Rc::clone(&fixture.registry))
            .unwrap()
            .encode(&key(), INPUT)
            .await
            .unwrap();
        key_bytes.truncate(key_bytes.len() - 3);
        let value = ValueCodec::new().unwrap().encode(&window(250, 3), None);
        let record = fixture.raw_record(Some(key_bytes), Some(value));
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        let CycleOutcome::Handled { outcome, committed, .. } = outcome else {
            panic!("expected a handled record, got {outcome:?}");
        };
        assert!(
            matches!(outcome, RecordOutcome::Undecodable(DecodeError::Malformed { .. })),
            "{outcome:?}"
        );
        assert!(committed);
        let stats = pipeline.stats();
        assert_eq!((stats.decode_failures, stats.cleared, stats.alerts), (1, 0, 0));
    }

    #[tokio::test]
    async fn malformed_value_is_committed_past_and_loop_continues() {
        let fixture = Fixture::new();
        let key_bytes = KeyCodec::new(Rc::clone(&fixture.registry))
            .unwrap()
            .encode(&key(), INPUT)
            .await
            .unwrap();
        let poison = fixture.raw_record(Some(key_bytes), Some(b"{not json".to_vec()));
        let next = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(poison)), Ok(Some(next))], Some(2));

        let stats = pipeline.run(running()).await.unwrap();

        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.alerts, 1);
        assert_eq!(stats.commits, 2);
        assert_eq!(
            fixture.events(),
            vec![
                "commit 1".to_owned(),
                format!("publish {ALERTS}"),
                "commit 2".to_owned(),
                "close source".to_owned(),
                "close sink".to_owned(),
            ]
        );
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn unknown_writer_schema_is_an_infrastructure_failure() {
        let fixture = Fixture::new();
        let mut key_bytes = vec![0, 0, 0, 0, 99];
        key_bytes.push(0);
        let value = ValueCodec::new().unwrap().encode(&window(250, 3), None);
        let record = fixture.raw_record(Some(key_bytes), Some(value));
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        let CycleOutcome::Handled { outcome: RecordOutcome::Undecodable(error), committed, .. } =
            outcome
        else {
            panic!("expected an undecodable record, got {outcome:?}");
        };
        assert!(matches!(error, DecodeError::Registry { .. }));
        assert!(error.is_infrastructure());
        assert!(committed);
    }

    // ------------------------------------------------------------------
    // Polling and committing
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn idle_poll_commits_nothing() {
        let fixture = Fixture::new();
        let pipeline = fixture.pipeline(vec![], None);

        assert_eq!(pipeline.run_once().await, CycleOutcome::Idle);
        assert!(fixture.events().is_empty());
        assert_eq!(pipeline.stats(), PipelineStats::default());
    }

    #[tokio::test]
    async fn poll_error_commits_nothing() {
        let fixture = Fixture::new();
        let error = BrokerPollError { reason: "broker transport failure".to_owned() };
        let pipeline = fixture.pipeline(vec![Err(error.clone())], None);

        assert_eq!(pipeline.run_once().await, CycleOutcome::PollFailed(error));
        assert!(fixture.events().is_empty());
        assert_eq!(pipeline.stats().poll_failures, 1);
    }

    #[tokio::test]
    async fn commit_failure_is_reported_and_not_fatal() {
        let mut fixture = Fixture::new();
        fixture.fail_commit = true;
        let first = fixture.record(Some(&key()), Some(&window(50, 1))).await;
        let second = fixture.record(Some(&key()), Some(&window(50, 1))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(first)), Ok(Some(second))], Some(2));

        let stats = pipeline.run(running()).await.unwrap();

        assert_eq!(stats.commit_failures, 2);
        assert_eq!(stats.cleared, 2);
    }

    #[tokio::test]
    async fn commits_follow_delivery_order() {
        let fixture = Fixture::new();
        let mut polls = vec![];
        for _ in 0..3 {
            polls.push(Ok(Some(fixture.record(Some(&key()), Some(&window(50, 1))).await)));
        }
        let pipeline = fixture.pipeline(polls, Some(3));

        pipeline.run(running()).await.unwrap();

        let commits: Vec<String> = fixture
            .events()
            .into_iter()
            .filter(|e| e.starts_with("commit"))
            .collect();
        assert_eq!(commits, vec!["commit 1", "commit 2", "commit 3"]);
    }

    // ------------------------------------------------------------------
    // Alert failure policy
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn transient_publish_failure_is_retried_before_commit() {
        let mut fixture = Fixture::new();
        fixture.publish_failures = 1;
        let record = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Handled { outcome: RecordOutcome::Alerted(_), committed: true, .. }
        ));
        assert_eq!(
            fixture.events(),
            vec![
                format!("publish {ALERTS} failed"),
                format!("publish {ALERTS}"),
                "commit 1".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_publish_retries_still_commit_after_emission_returns() {
        let mut fixture = Fixture::new();
        fixture.publish_failures = 5;
        let record = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);

        let outcome = pipeline.run_once().await;

        assert!(matches!(
            outcome,
            CycleOutcome::Handled {
                outcome: RecordOutcome::AlertFailed(EmitError::Publish { attempts: 2, .. }),
                committed: true,
                ..
            }
        ));
        assert_eq!(fixture.events().last().map(String::as_str), Some("commit 1"));
        assert_eq!(pipeline.stats().alert_failures, 1);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn stop_before_start_polls_nothing_and_closes() {
        let fixture = Fixture::new();
        let record = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(record))], None);
        let (_tx, rx) = watch::channel(true);

        let stats = pipeline.run(rx).await.unwrap();

        assert_eq!(stats.polled, 0);
        assert_eq!(fixture.events(), vec!["close source", "close sink"]);
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }

    #[tokio::test]
    async fn stop_during_cycle_finishes_in_flight_record() {
        let (tx, rx) = watch::channel(false);
        let fixture = Fixture::new();
        fixture.stop.replace(Some(tx));
        let first = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let second = fixture.record(Some(&key()), Some(&window(250, 3))).await;
        let pipeline = fixture.pipeline(vec![Ok(Some(first)), Ok(Some(second))], None);

        let stats = pipeline.run(rx).await.unwrap();

        assert_eq!(stats.polled, 1, "the second record must stay unpolled");
        assert_eq!(
            fixture.events(),
            vec![
                format!("publish {ALERTS}"),
                "commit 1".to_owned(),
                "close source".to_owned(),
                "close sink".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn close_failure_ends_in_failed_state() {
        let mut fixture = Fixture::new();
        fixture.fail_close = true;
        let pipeline = fixture.pipeline(vec![], None);
        let (_tx, rx) = watch::channel(true);

        let result = pipeline.run(rx).await;

        assert!(matches!(result, Err(PipelineError::Close(_))), "{result:?}");
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(
            fixture.events(),
            vec!["close source", "close sink"],
            "the producer is closed even when the consumer fails"
        );
    }
}
