// Rust guideline compliant 2026-10-19

//! Alert encoder: registry-registered Avro in the Confluent wire format.

use crate::registry::SchemaCache;
use crate::wire;
use apache_avro::Schema;
use apache_avro::types::Value;
use domain::{AlertRecord, EncodeError, SchemaRegistry};
use std::rc::Rc;

/// Schema of the outbound alert record.
pub const ALERT_SCHEMA: &str = r#"{
  "type": "record",
  "name": "FraudulentTransactions",
  "namespace": "workshop",
  "connect.name": "workshop.fraudulenttrans",
  "fields": [
    {"name": "details", "type": "string"}
  ]
}"#;

/// Encodes [`AlertRecord`]s for one alert topic.
///
/// The schema is registered under `{topic}-value` on first use.
#[derive(Debug)]
pub struct AlertEncoder<R> {
    registry: Rc<SchemaCache<R>>,
    schema: Schema,
    subject: String,
}

impl<R: SchemaRegistry> AlertEncoder<R> {
    /// Build an encoder for alerts published to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`apache_avro::Error`] if the built-in alert schema fails to parse.
    pub fn new(registry: Rc<SchemaCache<R>>, topic: &str) -> Result<Self, apache_avro::Error> {
        Ok(Self {
            registry,
            schema: Schema::parse_str(ALERT_SCHEMA)?,
            subject: format!("{topic}-value"),
        })
    }

    /// Registry subject the alert schema is registered under.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Encode `alert`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Registry`] if registration fails, or
    /// [`EncodeError::Schema`] if the record does not fit the schema.
    pub async fn encode(&self, alert: &AlertRecord) -> Result<Vec<u8>, EncodeError> {
        let schema_id = self.registry.register(&self.subject, ALERT_SCHEMA).await?;
        let record = Value::Record(vec![(
            "details".to_owned(),
            Value::String(alert.details.clone()),
        )]);
        let body = apache_avro::to_avro_datum(&self.schema, record)
            .map_err(|e| EncodeError::Schema { reason: e.to_string() })?;
        Ok(wire::frame(schema_id, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::{ALERT_SCHEMA, AlertEncoder};
    use crate::registry::SchemaCache;
    use crate::test_support::MockRegistry;
    use crate::wire;
    use apache_avro::Schema;
    use apache_avro::types::Value;
    use domain::{AlertRecord, EncodeError, RegistryError};
    use std::rc::Rc;

    #[tokio::test]
    async fn encodes_readable_datum_under_registered_id() {
        let encoder =
            AlertEncoder::new(Rc::new(SchemaCache::new(MockRegistry::new())), "alerts").unwrap();
        let alert = AlertRecord { details: "card 4111 looks off".to_owned() };

        let bytes = encoder.encode(&alert).await.unwrap();
        let (id, mut body) = wire::split(&bytes).unwrap();

        assert_eq!(encoder.registry.registry().subject_id("alerts-value"), Some(id));
        let schema = Schema::parse_str(ALERT_SCHEMA).unwrap();
        let value = apache_avro::from_avro_datum(&schema, &mut body, None).unwrap();
        assert_eq!(
            value,
            Value::Record(vec![(
                "details".to_owned(),
                Value::String("card 4111 looks off".to_owned())
            )])
        );
    }

    #[tokio::test]
    async fn registers_once_across_alerts() {
        let encoder =
            AlertEncoder::new(Rc::new(SchemaCache::new(MockRegistry::new())), "alerts").unwrap();
        for n in 0..3 {
            let alert = AlertRecord { details: format!("alert {n}") };
            encoder.encode(&alert).await.unwrap();
        }
        assert_eq!(encoder.registry.registry().registrations(), 1);
    }

    #[tokio::test]
    async fn registration_failure_is_an_encode_error() {
        let registry = MockRegistry::new();
        registry.fail_with(Some(RegistryError::Unauthorized { status: 403 }));
        let encoder = AlertEncoder::new(Rc::new(SchemaCache::new(registry)), "alerts").unwrap();

        let result = encoder.encode(&AlertRecord { details: String::new() }).await;
        assert!(matches!(result, Err(EncodeError::Registry(_))), "{result:?}");
    }
}
