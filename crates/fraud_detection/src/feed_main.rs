// Rust guideline compliant 2026-10-19

//! Synthetic feature feed entry point.
//!
//! Publishes randomly generated per-account window aggregates to the inbound
//! topic, key Avro-encoded through the schema registry and value as JSON, so
//! the `fraud_detection` binary has something to consume in a demo setup.
//!
//! # Usage
//!
//! ```text
//! # Finite, reproducible feed: set [feed] records and seed in the settings file
//! RUST_LOG=info cargo run --bin feature_feed
//!
//! # Infinite mode -- press CTRL+C to stop
//! FRAUD_FEED__INTERVAL_MS=250 cargo run --bin feature_feed -- config/fraud_detection.toml
//! ```

use anyhow::Context as _;
use codec::{KeyCodec, SchemaCache, ValueCodec};
use domain::AlertSink as _;
use feeder::Feeder;
use fraud_detection::adapters::http_registry::HttpSchemaRegistry;
use fraud_detection::adapters::kafka_sink::KafkaSink;
use fraud_detection::settings::{DEFAULT_CONFIG_PATH, Settings};
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

    let registry = HttpSchemaRegistry::new(&settings.schema_registry)
        .context("failed to build schema registry client")?;
    let keys = KeyCodec::new(Rc::new(SchemaCache::new(registry))).context("failed to build key codec")?;
    let values = ValueCodec::new().context("failed to build value codec")?;
    let feeder = Feeder::new(
        settings.feeder_config().context("invalid feed settings")?,
        keys,
        values,
    );
    let sink = KafkaSink::new(&settings.kafka, settings.pipeline.publish_timeout())
        .context("failed to create kafka producer")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("feed.shutdown: ctrl_c received");
            stop_tx.send_replace(true);
        }
    });

    let fed = feeder.run(&sink, stop_rx).await;
    // Flush whatever is queued even when the feed stopped on an error.
    sink.close().await.context("failed to flush kafka producer")?;
    let count = fed.context("feed failed")?;
    tracing::info!(count, topic = %settings.topics.input, "feed.exit");
    Ok(())
}
