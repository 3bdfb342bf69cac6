// Rust guideline compliant 2026-10-19

//! Record-key codec: registry-resolved Avro in the Confluent wire format.
//!
//! The writer schema travels by id in the header and is fetched from the
//! registry. The datum is read with it, then resolved into the local
//! [`KEY_SCHEMA`], so compatible upstream evolution (added fields with
//! defaults, widened unions) still decodes.

use crate::registry::{LookupError, SchemaCache};
use crate::wire;
use apache_avro::Schema;
use apache_avro::types::Value;
use domain::{AccountKey, DecodeError, EncodeError, SchemaRegistry};
use std::rc::Rc;

/// Expected shape of the record key.
pub const KEY_SCHEMA: &str = r#"{
  "type": "record",
  "name": "FeatureSetKey",
  "namespace": "io.confluent.ksql.avro_schemas",
  "connect.name": "io.confluent.ksql.avro_schemas.FeatureSetKey",
  "fields": [
    {"name": "CREDIT_CARD_NUMBER", "type": ["null", "string"], "default": null},
    {"name": "CUSTOMER_EMAIL", "type": ["null", "string"], "default": null},
    {"name": "AVERAGE_SPENDING_AMOUNT", "type": ["null", "int"], "default": null}
  ]
}"#;

const CARD: &str = "CREDIT_CARD_NUMBER";
const CONTACT: &str = "CUSTOMER_EMAIL";
const AVERAGE_SPEND: &str = "AVERAGE_SPENDING_AMOUNT";

/// Decodes (and, for feeds and tests, encodes) [`AccountKey`]s.
#[derive(Debug)]
pub struct KeyCodec<R> {
    registry: Rc<SchemaCache<R>>,
    reader_schema: Schema,
}

impl<R: SchemaRegistry> KeyCodec<R> {
    /// Build a key codec over a shared schema cache.
    ///
    /// # Errors
    ///
    /// Returns [`apache_avro::Error`] if the built-in key schema fails to parse.
    pub fn new(registry: Rc<SchemaCache<R>>) -> Result<Self, apache_avro::Error> {
        Ok(Self {
            registry,
            reader_schema: Schema::parse_str(KEY_SCHEMA)?,
        })
    }

    /// Decode key bytes. `None` bytes (null key) decode to `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Header`] for a bad wire header,
    /// [`DecodeError::Registry`] when the writer schema cannot be fetched,
    /// [`DecodeError::Malformed`] when the datum cannot be read,
    /// [`DecodeError::SchemaMismatch`] when it does not resolve into the key shape, and
    /// [`DecodeError::FieldType`] when a resolved field has an unexpected type.
    pub async fn decode(
        &self,
        bytes: Option<&[u8]>,
        topic: &str,
    ) -> Result<Option<AccountKey>, DecodeError> {
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let (schema_id, payload) = wire::split(bytes).map_err(|e| DecodeError::Header {
            topic: topic.to_owned(),
            reason: e.to_string(),
        })?;

        let writer_schema = match self.registry.schema_by_id(schema_id).await {
            Ok(schema) => schema,
            Err(LookupError::Registry(source)) => {
                return Err(DecodeError::Registry { topic: topic.to_owned(), source });
            }
            Err(e @ LookupError::Unparseable { .. }) => {
                return Err(DecodeError::SchemaMismatch {
                    topic: topic.to_owned(),
                    reason: e.to_string(),
                });
            }
        };

        let malformed = |reason: String| DecodeError::Malformed { topic: topic.to_owned(), reason };
        let mut body = payload;
        let written = apache_avro::from_avro_datum(&writer_schema, &mut body, None)
            .map_err(|e| malformed(e.to_string()))?;
        // The reader yields `null` for a union cut short by end of input, so a
        // datum only counts as read if it re-encodes to exactly the payload.
        let reencoded = apache_avro::to_avro_datum(&writer_schema, written.clone())
            .map_err(|e| malformed(e.to_string()))?;
        if reencoded != payload {
            return Err(malformed(format!(
                "datum does not match its {} byte payload (truncated or trailing bytes)",
                payload.len()
            )));
        }
        let resolved = written.resolve(&self.reader_schema).map_err(|e| {
            DecodeError::SchemaMismatch {
                topic: topic.to_owned(),
                reason: format!("writer schema {schema_id}: {e}"),
            }
        })?;

        let Value::Record(fields) = resolved else {
            return Err(DecodeError::SchemaMismatch {
                topic: topic.to_owned(),
                reason: "key is not a record".to_owned(),
            });
        };
        Ok(Some(AccountKey {
            card_identifier: nullable_string(&fields, CARD, topic)?,
            average_spend: nullable_int(&fields, AVERAGE_SPEND, topic)?,
            customer_contact: nullable_string(&fields, CONTACT, topic)?,
        }))
    }

    /// Encode `key` under the local key schema, registering it as `{topic}-key`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] on registration failure or if the value does not fit.
    pub async fn encode(&self, key: &AccountKey, topic: &str) -> Result<Vec<u8>, EncodeError> {
        let schema_id = self.registry.register(&format!("{topic}-key"), KEY_SCHEMA).await?;
        let average_spend = key
            .average_spend
            .map(|v| {
                i32::try_from(v).map_err(|_| EncodeError::Schema {
                    reason: format!("{AVERAGE_SPEND} {v} does not fit an Avro int"),
                })
            })
            .transpose()?;

        let record = Value::Record(vec![
            (CARD.to_owned(), nullable(key.card_identifier.clone().map(Value::String))),
            (CONTACT.to_owned(), nullable(key.customer_contact.clone().map(Value::String))),
            (AVERAGE_SPEND.to_owned(), nullable(average_spend.map(Value::Int))),
        ]);
        let body = apache_avro::to_avro_datum(&self.reader_schema, record)
            .map_err(|e| EncodeError::Schema { reason: e.to_string() })?;
        Ok(wire::frame(schema_id, &body))
    }
}

/// Wrap an optional value in the `["null", T]` union.
pub(crate) fn nullable(value: Option<Value>) -> Value {
    match value {
        Some(v) => Value::Union(1, Box::new(v)),
        None => Value::Union(0, Box::new(Value::Null)),
    }
}

fn field<'a>(fields: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    let value = fields.iter().find_map(|(n, v)| (n == name).then_some(v))?;
    match value {
        Value::Union(_, inner) => Some(inner.as_ref()),
        other => Some(other),
    }
}

fn nullable_string(
    fields: &[(String, Value)],
    name: &str,
    topic: &str,
) -> Result<Option<String>, DecodeError> {
    match field(fields, name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(wrong_type(name, topic, "string", other)),
    }
}

fn nullable_int(
    fields: &[(String, Value)],
    name: &str,
    topic: &str,
) -> Result<Option<i64>, DecodeError> {
    match field(fields, name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Int(i)) => Ok(Some(i64::from(*i))),
        Some(Value::Long(i)) => Ok(Some(*i)),
        Some(other) => Err(wrong_type(name, topic, "int", other)),
    }
}

fn wrong_type(name: &str, topic: &str, expected: &str, found: &Value) -> DecodeError {
    DecodeError::FieldType {
        topic: topic.to_owned(),
        field: name.to_owned(),
        reason: format!("expected {expected}, found {found:?}"),
    }
}
