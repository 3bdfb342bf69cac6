// Rust guideline compliant 2026-10-19

//! Caching layer over the `SchemaRegistry` port.
//!
//! Writer schemas are immutable once registered, so a schema resolved by id is
//! cached for the lifetime of the process. Registration results are cached per
//! subject. Lookups are idempotent; a failed lookup is not cached and will be
//! retried on the next record.

use apache_avro::Schema;
use domain::{RegistryError, SchemaRegistry};
use std::cell::RefCell;
use std::collections::HashMap;

/// Failure to obtain a usable writer schema.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The registry call itself failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The registry returned text that is not a valid Avro schema.
    #[error("schema {id} is not valid Avro: {reason}")]
    Unparseable {
        /// Schema id.
        id: u32,
        /// Parser message.
        reason: String,
    },
}

/// Per-process cache in front of a [`SchemaRegistry`] adapter.
///
/// Shared read-only (behind `Rc`) by the key decoder and the alert encoder.
#[derive(Debug)]
pub struct SchemaCache<R> {
    registry: R,
    by_id: RefCell<HashMap<u32, Schema>>,
    by_subject: RefCell<HashMap<String, u32>>,
}

impl<R: SchemaRegistry> SchemaCache<R> {
    /// Wrap `registry` with an empty cache.
    #[must_use]
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            by_id: RefCell::new(HashMap::new()),
            by_subject: RefCell::new(HashMap::new()),
        }
    }

    /// The wrapped adapter.
    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Resolve the Avro schema registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the registry fails or returns an invalid schema.
    pub async fn schema_by_id(&self, id: u32) -> Result<Schema, LookupError> {
        if let Some(schema) = self.by_id.borrow().get(&id) {
            return Ok(schema.clone());
        }
        let text = self.registry.schema_by_id(id).await?;
        let schema = Schema::parse_str(&text).map_err(|e| LookupError::Unparseable {
            id,
            reason: e.to_string(),
        })?;
        tracing::debug!(schema_id = id, "codec.registry.schema_cached");
        self.by_id.borrow_mut().insert(id, schema.clone());
        Ok(schema)
    }

    /// Register `schema` under `subject`, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when registration fails.
    pub async fn register(&self, subject: &str, schema: &str) -> Result<u32, RegistryError> {
        if let Some(id) = self.by_subject.borrow().get(subject) {
            return Ok(*id);
        }
        let id = self.registry.register(subject, schema).await?;
        tracing::info!(subject, schema_id = id, "codec.registry.schema_registered");
        self.by_subject.borrow_mut().insert(subject.to_owned(), id);
        Ok(id)
    }
}
