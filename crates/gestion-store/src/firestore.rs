//! Firestore REST document store.
//!
//! Reads single documents with `GET .../documents/{reference}` and flattens
//! Firestore's typed value encoding into plain JSON.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gestion_core::{CredentialProvider, DocumentFields, DocumentStore, Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

/// Timeout for a single document read (seconds).
const READ_TIMEOUT_SECS: u64 = 15;

/// Document store backed by the Firestore REST API.
pub struct FirestoreDocumentStore {
    base_url: String,
    project_id: String,
    database: String,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl FirestoreDocumentStore {
    pub fn new(project_id: String, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_base_url(
            gestion_core::defaults::FIRESTORE_URL.to_string(),
            project_id,
            credentials,
        )
    }

    /// Point at a non-default endpoint (emulator, tests).
    pub fn with_base_url(
        base_url: String,
        project_id: String,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            database: "(default)".to_string(),
            credentials,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    fn document_url(&self, reference: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents/{}",
            self.base_url, self.project_id, self.database, reference
        )
    }
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, JsonValue>,
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn get(&self, reference: &str) -> Result<Option<DocumentFields>> {
        let token = self.credentials.access_token().await?;
        let url = self.document_url(reference);
        debug!(reference = %reference, "firestore: get");

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(reference = %reference, %status, "firestore: read failed");
            return Err(Error::Request(format!(
                "Firestore returned {}: {}",
                status, body
            )));
        }

        let document: FirestoreDocument = response.json().await?;
        Ok(Some(flatten_fields(document.fields)))
    }

    fn backend_name(&self) -> &str {
        "firestore"
    }
}

/// Flatten a Firestore `fields` map into plain JSON values.
pub fn flatten_fields(fields: Map<String, JsonValue>) -> DocumentFields {
    fields
        .into_iter()
        .map(|(name, value)| (name, flatten_value(value)))
        .collect()
}

/// Flatten one typed Firestore value.
///
/// Unknown encodings are passed through untouched.
pub fn flatten_value(value: JsonValue) -> JsonValue {
    let JsonValue::Object(mut typed) = value else {
        return value;
    };
    if typed.len() != 1 {
        return JsonValue::Object(typed);
    }
    let Some(kind) = typed.keys().next().cloned() else {
        return JsonValue::Object(typed);
    };
    let inner = typed.remove(&kind).unwrap_or(JsonValue::Null);

    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "booleanValue"
        | "geoPointValue" => inner,
        "nullValue" => JsonValue::Null,
        // Firestore encodes 64-bit integers as strings.
        "integerValue" => match &inner {
            JsonValue::String(s) => s
                .parse::<i64>()
                .map(JsonValue::from)
                .unwrap_or(inner.clone()),
            _ => inner,
        },
        "doubleValue" => inner,
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(JsonValue::as_object)
                .cloned()
                .unwrap_or_default();
            JsonValue::Object(flatten_fields(fields))
        }
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(JsonValue::as_array)
                .cloned()
                .unwrap_or_default();
            JsonValue::Array(values.into_iter().map(flatten_value).collect())
        }
        _ => {
            let mut restored = Map::new();
            restored.insert(kind, inner);
            JsonValue::Object(restored)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_scalars() {
        assert_eq!(flatten_value(json!({"stringValue": "receipts/r1.jpg"})), json!("receipts/r1.jpg"));
        assert_eq!(flatten_value(json!({"integerValue": "42"})), json!(42));
        assert_eq!(flatten_value(json!({"doubleValue": 12.5})), json!(12.5));
        assert_eq!(flatten_value(json!({"booleanValue": true})), json!(true));
        assert_eq!(flatten_value(json!({"nullValue": null})), JsonValue::Null);
        assert_eq!(
            flatten_value(json!({"timestampValue": "2024-05-01T10:00:00Z"})),
            json!("2024-05-01T10:00:00Z")
        );
    }

    #[test]
    fn test_flatten_nested() {
        let value = json!({
            "mapValue": {"fields": {
                "amount": {"doubleValue": 500.0},
                "tags": {"arrayValue": {"values": [{"stringValue": "a"}, {"integerValue": "1"}]}}
            }}
        });
        assert_eq!(flatten_value(value), json!({"amount": 500.0, "tags": ["a", 1]}));
    }

    #[test]
    fn test_flatten_empty_collections() {
        assert_eq!(flatten_value(json!({"mapValue": {}})), json!({}));
        assert_eq!(flatten_value(json!({"arrayValue": {}})), json!([]));
    }

    #[test]
    fn test_unknown_encoding_passes_through() {
        assert_eq!(flatten_value(json!({"vectorValue": [1]})), json!({"vectorValue": [1]}));
        assert_eq!(flatten_value(json!("plain")), json!("plain"));
    }
}
