// Rust guideline compliant 2026-10-19

//! Fraud-alert pipeline entry point.
//!
//! Wires the Kafka consumer and producer, the schema-registry client, the
//! dual decoder, the threshold rule and the alert emitter into one
//! [`Pipeline`], then runs it until CTRL+C. The record in flight when the
//! signal arrives is finished and committed before both clients close.
//!
//! # Usage
//!
//! ```text
//! # Settings from config/fraud_detection.toml
//! RUST_LOG=info cargo run --bin fraud_detection
//!
//! # Explicit settings file, broker overridden from the environment
//! FRAUD_KAFKA__BOOTSTRAP_SERVERS=broker:9092 cargo run --bin fraud_detection -- prod.toml
//! ```

use alerter::AlertEmitter;
use anyhow::Context as _;
use codec::{AlertEncoder, DualDecoder, SchemaCache};
use fraud_detection::adapters::http_registry::HttpSchemaRegistry;
use fraud_detection::adapters::kafka_sink::KafkaSink;
use fraud_detection::adapters::kafka_source::KafkaRecordSource;
use fraud_detection::settings::{DEFAULT_CONFIG_PATH, Settings};
use pipeline::Pipeline;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let settings = Settings::load(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;

    // One registry client, shared by the key decoder and the alert encoder.
    let registry = HttpSchemaRegistry::new(&settings.schema_registry)
        .context("failed to build schema registry client")?;
    let registry = Rc::new(SchemaCache::new(registry));

    let decoder = DualDecoder::new(Rc::clone(&registry)).context("failed to build decoders")?;
    let encoder = AlertEncoder::new(Rc::clone(&registry), &settings.topics.alerts)
        .context("failed to build alert encoder")?;
    let sink = KafkaSink::new(&settings.kafka, settings.pipeline.publish_timeout())
        .context("failed to create kafka producer")?;
    let emitter = AlertEmitter::new(
        settings.alerter_config().context("invalid alerter settings")?,
        encoder,
        sink,
    );
    let source = KafkaRecordSource::new(&settings.kafka, &settings.topics.input)
        .context("failed to create kafka consumer")?;

    let pipeline = Pipeline::new(
        settings.pipeline_config().context("invalid pipeline settings")?,
        source,
        decoder,
        settings.rule(),
        emitter,
    );

    // CTRL+C flips the stop flag; the loop checks it between records.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("main.shutdown: ctrl_c received, finishing in-flight record");
                stop_tx.send_replace(true);
            }
            Err(e) => tracing::warn!(error = %e, "main.signal.unavailable"),
        }
    });

    let stats = pipeline.run(stop_rx).await.context("pipeline ended in failed state")?;
    tracing::info!(
        polled = stats.polled,
        alerts = stats.alerts,
        decode_failures = stats.decode_failures,
        "main.exit"
    );
    Ok(())
}
