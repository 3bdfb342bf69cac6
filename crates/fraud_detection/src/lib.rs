// Rust guideline compliant 2026-10-19

//! Infrastructure side of the fraud-alert pipeline: settings loading and the
//! adapters that implement the `domain` ports against Kafka and a Confluent
//! schema registry. Shared by the `fraud_detection` and `feature_feed`
//! binaries.

pub mod adapters;
pub mod settings;
