// Rust guideline compliant 2026-10-19

//! Record-value codec: JSON validated against a local JSON Schema document.
//!
//! Payloads may carry the Confluent wire header (as written by the upstream
//! JSON-schema serializer) or be bare JSON; the header is stripped and its
//! schema id ignored, because validation always uses [`VALUE_SCHEMA`].
//!
//! The document subset understood here is what the upstream schema uses:
//! `properties`, each with a `oneOf` list of `{"type": ...}` alternatives, an
//! optional `connect.type` integer width, and a `connect.index` ordinal.

use crate::wire;
use domain::{DecodeError, WindowAggregate};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Local schema document for the window aggregate.
pub const VALUE_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "TOTAL_AMOUNT": {
      "connect.index": 1,
      "oneOf": [{"type": "null"}, {"type": "integer", "connect.type": "int32"}]
    },
    "TRANSACTION_COUNT": {
      "connect.index": 0,
      "oneOf": [{"type": "null"}, {"type": "integer", "connect.type": "int64"}]
    },
    "WINDOW_START": {
      "connect.index": 2,
      "oneOf": [{"type": "null"}, {"type": "string"}]
    },
    "WINDOW_END": {
      "connect.index": 3,
      "oneOf": [{"type": "null"}, {"type": "string"}]
    }
  }
}"#;

const TOTAL_AMOUNT: &str = "TOTAL_AMOUNT";
const TRANSACTION_COUNT: &str = "TRANSACTION_COUNT";
const WINDOW_START: &str = "WINDOW_START";
const WINDOW_END: &str = "WINDOW_END";

static NULL: Value = Value::Null;

// ---------------------------------------------------------------------------
// Schema document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ConnectType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

#[derive(Debug, Clone, Deserialize)]
struct Alternative {
    #[serde(rename = "type")]
    kind: JsonType,
    #[serde(rename = "connect.type")]
    connect_type: Option<ConnectType>,
}

#[derive(Debug, Clone, Deserialize)]
struct Property {
    #[serde(rename = "connect.index")]
    index: u32,
    #[serde(rename = "oneOf")]
    one_of: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Document {
    properties: BTreeMap<String, Property>,
}

/// Parsed local schema for the record value.
#[derive(Debug, Clone)]
pub struct ValueSchema {
    /// Properties sorted by `connect.index`.
    fields: Vec<(String, Property)>,
}

impl ValueSchema {
    /// Parse a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the document is not of the supported shape.
    pub fn parse(document: &str) -> Result<Self, serde_json::Error> {
        let doc: Document = serde_json::from_str(document)?;
        let mut fields: Vec<(String, Property)> = doc.properties.into_iter().collect();
        fields.sort_by_key(|(_, p)| p.index);
        Ok(Self { fields })
    }

    /// Field names in `connect.index` order.
    #[must_use]
    pub fn field_order(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Check every declared property present in `object` against its alternatives.
    ///
    /// Undeclared members are ignored; absent members are treated as null.
    fn validate(&self, object: &Map<String, Value>, topic: &str) -> Result<(), DecodeError> {
        for (name, property) in &self.fields {
            let value = object.get(name).unwrap_or(&NULL);
            if !property.one_of.iter().any(|alt| alt.accepts(value)) {
                return Err(DecodeError::FieldType {
                    topic: topic.to_owned(),
                    field: name.clone(),
                    reason: format!("{value} matches none of the declared types"),
                });
            }
        }
        Ok(())
    }
}

impl Alternative {
    fn accepts(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (JsonType::Null, Value::Null) | (JsonType::Boolean, Value::Bool(_)) => true,
            (JsonType::String, Value::String(_)) => true,
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => self.fits(i),
                None => false,
            },
            _ => false,
        }
    }

    fn fits(&self, i: i64) -> bool {
        match self.connect_type {
            Some(ConnectType::Int8) => i8::try_from(i).is_ok(),
            Some(ConnectType::Int16) => i16::try_from(i).is_ok(),
            Some(ConnectType::Int32) => i32::try_from(i).is_ok(),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// ValueCodec
// ---------------------------------------------------------------------------

/// Decodes (and, for feeds and tests, encodes) [`WindowAggregate`]s.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    schema: ValueSchema,
}

impl ValueCodec {
    /// Build a codec validating against [`VALUE_SCHEMA`].
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the built-in document fails to parse.
    pub fn new() -> Result<Self, serde_json::Error> {
        Ok(Self { schema: ValueSchema::parse(VALUE_SCHEMA)? })
    }

    /// The local schema values are validated against.
    #[must_use]
    pub fn schema(&self) -> &ValueSchema {
        &self.schema
    }

    /// Decode value bytes. `None` bytes (tombstone) decode to `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Header`] for a truncated wire header,
    /// [`DecodeError::Malformed`] when the payload is not a JSON object, and
    /// [`DecodeError::FieldType`] when a field violates the schema.
    pub fn decode(
        &self,
        bytes: Option<&[u8]>,
        topic: &str,
    ) -> Result<Option<WindowAggregate>, DecodeError> {
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let body = if bytes.first() == Some(&wire::MAGIC) {
            let (_, body) = wire::split(bytes).map_err(|e| DecodeError::Header {
                topic: topic.to_owned(),
                reason: e.to_string(),
            })?;
            body
        } else {
            bytes
        };

        let parsed: Value = serde_json::from_slice(body).map_err(|e| DecodeError::Malformed {
            topic: topic.to_owned(),
            reason: e.to_string(),
        })?;
        let Value::Object(object) = parsed else {
            return Err(DecodeError::Malformed {
                topic: topic.to_owned(),
                reason: "value is not a JSON object".to_owned(),
            });
        };
        self.schema.validate(&object, topic)?;

        Ok(Some(WindowAggregate {
            total_amount: integer(&object, TOTAL_AMOUNT, topic)?,
            transaction_count: integer(&object, TRANSACTION_COUNT, topic)?,
            window_start: string(&object, WINDOW_START, topic)?,
            window_end: string(&object, WINDOW_END, topic)?,
        }))
    }

    /// Encode `aggregate` as JSON, framed with `schema_id` when given.
    #[must_use]
    pub fn encode(&self, aggregate: &WindowAggregate, schema_id: Option<u32>) -> Vec<u8> {
        let mut object = Map::new();
        object.insert(TOTAL_AMOUNT.to_owned(), aggregate.total_amount.into());
        object.insert(TRANSACTION_COUNT.to_owned(), aggregate.transaction_count.into());
        object.insert(WINDOW_START.to_owned(), aggregate.window_start.clone().into());
        object.insert(WINDOW_END.to_owned(), aggregate.window_end.clone().into());
        let body = Value::Object(object).to_string().into_bytes();
        match schema_id {
            Some(id) => wire::frame(id, &body),
            None => body,
        }
    }
}

fn integer(object: &Map<String, Value>, name: &str, topic: &str) -> Result<Option<i64>, DecodeError> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| DecodeError::FieldType {
            topic: topic.to_owned(),
            field: name.to_owned(),
            reason: format!("expected integer, found {v}"),
        }),
    }
}

fn string(object: &Map<String, Value>, name: &str, topic: &str) -> Result<Option<String>, DecodeError> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(v) => Err(DecodeError::FieldType {
            topic: topic.to_owned(),
            field: name.to_owned(),
            reason: format!("expected string, found {v}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ValueCodec, ValueSchema};
    use domain::{DecodeError, WindowAggregate};

    const TOPIC: &str = "FEATURE_SET";

    fn scenario_aggregate() -> WindowAggregate {
        WindowAggregate {
            total_amount: Some(250),
            transaction_count: Some(3),
            window_start: Some("2024-01-01T00:00".to_owned()),
            window_end: Some("2024-01-01T01:00".to_owned()),
        }
    }

    #[test]
    fn absent_bytes_decode_to_none() {
        assert_eq!(ValueCodec::new().unwrap().decode(None, TOPIC), Ok(None));
    }

    #[test]
    fn round_trip_bare_json() {
        let codec = ValueCodec::new().unwrap();
        let bytes = codec.encode(&scenario_aggregate(), None);
        assert_eq!(codec.decode(Some(&bytes), TOPIC), Ok(Some(scenario_aggregate())));
    }

    #[test]
    fn round_trip_framed_json() {
        let codec = ValueCodec::new().unwrap();
        let bytes = codec.encode(&scenario_aggregate(), Some(7));
        assert_eq!(bytes[0], 0);
        assert_eq!(codec.decode(Some(&bytes), TOPIC), Ok(Some(scenario_aggregate())));
    }

    #[test]
    fn decoding_twice_is_idempotent() {
        let codec = ValueCodec::new().unwrap();
        let bytes = codec.encode(&scenario_aggregate(), None);
        assert_eq!(codec.decode(Some(&bytes), TOPIC), codec.decode(Some(&bytes), TOPIC));
    }

    #[test]
    fn missing_and_null_fields_become_none() {
        let codec = ValueCodec::new().unwrap();
        let bytes = br#"{"TOTAL_AMOUNT": 50, "WINDOW_END": null, "EXTRA": true}"#;
        let aggregate = codec.decode(Some(bytes), TOPIC).unwrap().unwrap();
        assert_eq!(
            aggregate,
            WindowAggregate { total_amount: Some(50), ..WindowAggregate::default() }
        );
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let codec = ValueCodec::new().unwrap();
        let result = codec.decode(Some(br#"{"TRANSACTION_COUNT": "three"}"#), TOPIC);
        assert!(
            matches!(&result, Err(DecodeError::FieldType { field, .. }) if field == "TRANSACTION_COUNT"),
            "{result:?}"
        );
    }

    #[test]
    fn int32_range_is_enforced() {
        let codec = ValueCodec::new().unwrap();
        let result = codec.decode(Some(br#"{"TOTAL_AMOUNT": 4294967296}"#), TOPIC);
        assert!(matches!(result, Err(DecodeError::FieldType { .. })), "{result:?}");
        // TRANSACTION_COUNT is int64: the same magnitude is accepted.
        let ok = codec.decode(Some(br#"{"TRANSACTION_COUNT": 4294967296}"#), TOPIC);
        assert_eq!(ok.unwrap().unwrap().transaction_count, Some(4_294_967_296));
    }

    #[test]
    fn fractional_integer_is_rejected() {
        let codec = ValueCodec::new().unwrap();
        let result = codec.decode(Some(br#"{"TOTAL_AMOUNT": 12.5}"#), TOPIC);
        assert!(matches!(result, Err(DecodeError::FieldType { .. })), "{result:?}");
    }

    #[test]
    fn malformed_json_is_rejected() {
        let codec = ValueCodec::new().unwrap();
        let result = codec.decode(Some(b"{not json"), TOPIC);
        assert!(matches!(result, Err(DecodeError::Malformed { .. })), "{result:?}");
    }

    #[test]
    fn non_object_is_rejected() {
        let codec = ValueCodec::new().unwrap();
        let result = codec.decode(Some(b"[1, 2]"), TOPIC);
        assert!(matches!(result, Err(DecodeError::Malformed { .. })), "{result:?}");
    }

    #[test]
    fn truncated_header_is_rejected() {
        let codec = ValueCodec::new().unwrap();
        let result = codec.decode(Some(&[0, 0, 1]), TOPIC);
        assert!(matches!(result, Err(DecodeError::Header { .. })), "{result:?}");
    }

    #[test]
    fn field_order_follows_connect_index() {
        let schema = ValueSchema::parse(super::VALUE_SCHEMA).unwrap();
        assert_eq!(
            schema.field_order(),
            vec!["TRANSACTION_COUNT", "TOTAL_AMOUNT", "WINDOW_START", "WINDOW_END"]
        );
    }
}
