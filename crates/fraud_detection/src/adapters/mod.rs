// Rust guideline compliant 2026-10-19

//! Adapters (secondary ports) for the fraud-detection binaries.
//!
//! Each sub-module implements one or more hexagonal port traits defined in the
//! `domain` crate against real infrastructure.

pub mod http_registry;
pub mod kafka_sink;
pub mod kafka_source;

use crate::settings::KafkaSettings;
use rdkafka::ClientConfig;

/// Connection properties shared by the consumer and the producer.
fn client_config(settings: &KafkaSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &settings.bootstrap_servers)
        .set("security.protocol", &settings.security_protocol);
    if let Some(mechanism) = &settings.sasl_mechanism {
        config.set("sasl.mechanisms", mechanism);
    }
    if let Some(username) = &settings.sasl_username {
        config.set("sasl.username", username);
    }
    if let Some(password) = &settings.sasl_password {
        config.set("sasl.password", password.expose());
    }
    config
}
