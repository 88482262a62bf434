//! Document record lookup.

use std::sync::Arc;

use gestion_core::{DocumentStore, Error, ErrorCode, Result};
use serde_json::Value as JsonValue;
use tracing::{debug, error};

/// Fetches a document record and reads the stored-object path from it.
pub struct RecordResolver {
    store: Arc<dyn DocumentStore>,
    path_field: String,
}

impl RecordResolver {
    pub fn new(store: Arc<dyn DocumentStore>, path_field: impl Into<String>) -> Self {
        Self {
            store,
            path_field: path_field.into(),
        }
    }

    /// Return the record's storage path.
    ///
    /// Store failures are logged and replaced with a generic internal error.
    pub async fn resolve(&self, reference: &str) -> Result<String> {
        let record = self.store.get(reference).await.map_err(|e| {
            error!(
                reference = %reference,
                backend = self.store.backend_name(),
                error = %e,
                "document store read failed"
            );
            Error::Internal("Failed to read document record".to_string())
        })?;

        let Some(fields) = record else {
            return Err(Error::not_found("Document", reference));
        };

        match fields.get(&self.path_field) {
            None => Err(Error::validation(
                format!("Document has no {} field", self.path_field),
                self.path_field.clone(),
                ErrorCode::MissingField,
            )),
            Some(JsonValue::String(path)) if !path.trim().is_empty() => {
                debug!(reference = %reference, storage_path = %path, "record resolved");
                Ok(path.clone())
            }
            Some(_) => Err(Error::validation(
                format!("Document field {} must be a non-empty string", self.path_field),
                self.path_field.clone(),
                ErrorCode::InvalidStoragePath,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestion_store::InMemoryDocumentStore;
    use serde_json::json;

    fn resolver(store: InMemoryDocumentStore) -> RecordResolver {
        RecordResolver::new(Arc::new(store), "storagePath")
    }

    #[tokio::test]
    async fn test_resolves_storage_path() {
        let store = InMemoryDocumentStore::new()
            .with_record("payments/doc1", json!({"storagePath": "receipts/r1.jpg"}));
        assert_eq!(resolver(store).resolve("payments/doc1").await.unwrap(), "receipts/r1.jpg");
    }

    #[tokio::test]
    async fn test_missing_record() {
        let err = resolver(InMemoryDocumentStore::new())
            .resolve("payments/nope")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_missing_field() {
        let store = InMemoryDocumentStore::new().with_record("payments/doc1", json!({"amount": 3}));
        let err = resolver(store).resolve("payments/doc1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingField);
    }

    #[tokio::test]
    async fn test_invalid_field_values() {
        for value in [json!(""), json!("   "), json!(42), json!(null), json!({"path": "x"})] {
            let store = InMemoryDocumentStore::new()
                .with_record("payments/doc1", json!({"storagePath": value.clone()}));
            let err = resolver(store).resolve("payments/doc1").await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidStoragePath, "value {}", value);
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_generic() {
        let store = InMemoryDocumentStore::new().failing("connection reset by peer");
        let err = resolver(store).resolve("payments/doc1").await.unwrap_err();
        assert!(err.is_internal());
        assert!(!err.to_string().contains("connection reset"));
    }
}
