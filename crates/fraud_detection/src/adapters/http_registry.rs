// Rust guideline compliant 2026-10-19

//! HTTP adapter for the `SchemaRegistry` port (Confluent REST API).
//!
//! `GET /schemas/ids/{id}` resolves writer schemas; `POST
//! /subjects/{subject}/versions` registers (idempotently) outbound schemas.

use crate::settings::RegistrySettings;
use domain::{RegistryError, SchemaRegistry};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Media type of registry requests and responses.
pub const REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

#[derive(Deserialize)]
struct SchemaBody {
    schema: String,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct IdBody {
    id: u32,
}

/// Registry client with optional basic auth and a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpSchemaRegistry {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl HttpSchemaRegistry {
    /// Build a client for the configured registry.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(settings: &RegistrySettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            base_url: settings.url.trim().trim_end_matches('/').to_owned(),
            credentials: settings
                .credentials()
                .map(|(user, password)| (user.to_owned(), password.to_owned())),
        })
    }

    /// Registry base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, REGISTRY_CONTENT_TYPE);
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        id: Option<u32>,
    ) -> Result<Response, RegistryError> {
        let response = self
            .prepare(request)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable { reason: e.to_string() })?;
        match classify(response.status(), id) {
            Some(error) => {
                tracing::warn!(status = %response.status(), url = %response.url(), "http_registry.request.failed");
                Err(error)
            }
            None => Ok(response),
        }
    }
}

/// Map a non-success status to a [`RegistryError`]; `None` for success.
fn classify(status: StatusCode, id: Option<u32>) -> Option<RegistryError> {
    if status.is_success() {
        return None;
    }
    Some(match (status, id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            RegistryError::Unauthorized { status: status.as_u16() }
        }
        (StatusCode::NOT_FOUND, Some(id)) => RegistryError::NotFound { id },
        _ => RegistryError::BadResponse { reason: format!("unexpected status {status}") },
    })
}

fn bad_body(e: &reqwest::Error) -> RegistryError {
    RegistryError::BadResponse { reason: e.to_string() }
}

impl SchemaRegistry for HttpSchemaRegistry {
    async fn schema_by_id(&self, id: u32) -> Result<String, RegistryError> {
        let url = format!("{}/schemas/ids/{id}", self.base_url);
        let response = self.execute(self.client.get(url), Some(id)).await?;
        let body: SchemaBody = response.json().await.map_err(|e| bad_body(&e))?;
        tracing::debug!(id, "http_registry.schema.fetched");
        Ok(body.schema)
    }

    async fn register(&self, subject: &str, schema: &str) -> Result<u32, RegistryError> {
        let url = format!("{}/subjects/{subject}/versions", self.base_url);
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, REGISTRY_CONTENT_TYPE)
            .json(&RegisterBody { schema });
        let response = self.execute(request, None).await?;
        let body: IdBody = response.json().await.map_err(|e| bad_body(&e))?;
        tracing::info!(subject, id = body.id, "http_registry.schema.registered");
        Ok(body.id)
    }
}
