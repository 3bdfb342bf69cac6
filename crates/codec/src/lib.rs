// Rust guideline compliant 2026-10-19

//! Dual codec layer for the fraud-alert pipeline.
//!
//! Record keys and record values use independent schemas and encodings:
//! keys are registry-resolved Avro ([`KeyCodec`]), values are JSON validated
//! against a local schema document ([`ValueCodec`]). [`DualDecoder`] exposes
//! the two fixed decode entry points the orchestrator drives. Alerts are
//! encoded by [`AlertEncoder`].
//!
//! Every decode distinguishes *absent* (`Ok(None)`, a tombstone) from
//! *malformed* (`Err(DecodeError)`).

pub mod alert;
pub mod key;
pub mod registry;
pub mod value;
pub mod wire;

pub use alert::{ALERT_SCHEMA, AlertEncoder};
pub use key::{KEY_SCHEMA, KeyCodec};
pub use registry::{LookupError, SchemaCache};
pub use value::{VALUE_SCHEMA, ValueCodec, ValueSchema};

use domain::{AccountKey, DecodeError, SchemaRegistry, WindowAggregate};
use std::rc::Rc;

/// Errors building a codec from its built-in schemas.
#[derive(Debug, thiserror::Error)]
pub enum CodecInitError {
    /// An Avro schema failed to parse.
    #[error("invalid built-in Avro schema: {0}")]
    Avro(#[from] apache_avro::Error),
    /// The JSON schema document failed to parse.
    #[error("invalid built-in JSON schema document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes the key and value of one inbound record.
#[derive(Debug)]
pub struct DualDecoder<R> {
    keys: KeyCodec<R>,
    values: ValueCodec,
}

impl<R: SchemaRegistry> DualDecoder<R> {
    /// Build a decoder sharing `registry` for key schema resolution.
    ///
    /// # Errors
    ///
    /// Returns [`CodecInitError`] if a built-in schema fails to parse.
    pub fn new(registry: Rc<SchemaCache<R>>) -> Result<Self, CodecInitError> {
        Ok(Self {
            keys: KeyCodec::new(registry)?,
            values: ValueCodec::new()?,
        })
    }

    /// Decode record key bytes.
    ///
    /// # Errors
    ///
    /// See [`KeyCodec::decode`].
    pub async fn decode_key(
        &self,
        bytes: Option<&[u8]>,
        topic: &str,
    ) -> Result<Option<AccountKey>, DecodeError> {
        self.keys.decode(bytes, topic).await
    }

    /// Decode record value bytes.
    ///
    /// # Errors
    ///
    /// See [`ValueCodec::decode`].
    pub fn decode_value(
        &self,
        bytes: Option<&[u8]>,
        topic: &str,
    ) -> Result<Option<WindowAggregate>, DecodeError> {
        self.values.decode(bytes, topic)
    }

    /// The key codec, for encoding fixtures and feeds.
    #[must_use]
    pub fn keys(&self) -> &KeyCodec<R> {
        &self.keys
    }

    /// The value codec, for encoding fixtures and feeds.
    #[must_use]
    pub fn values(&self) -> &ValueCodec {
        &self.values
    }
}
