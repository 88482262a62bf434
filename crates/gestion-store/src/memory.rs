//! In-memory stores for tests and local wiring.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use gestion_core::{
    DocumentFields, DocumentStore, Error, ObjectMetadata, ObjectStore, Result, StoredFile,
};
use serde_json::Value as JsonValue;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    records: RwLock<HashMap<String, DocumentFields>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Non-object values are stored as an empty record.
    pub fn with_record(self, reference: impl Into<String>, fields: JsonValue) -> Self {
        self.insert(reference, fields);
        self
    }

    pub fn insert(&self, reference: impl Into<String>, fields: JsonValue) {
        let fields = match fields {
            JsonValue::Object(map) => map,
            _ => DocumentFields::new(),
        };
        if let Ok(mut records) = self.records.write() {
            records.insert(reference.into(), fields);
        }
    }

    /// Make every read fail with an internal error.
    pub fn failing(self, message: impl Into<String>) -> Self {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(message.into());
        }
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, reference: &str) -> Result<Option<DocumentFields>> {
        if let Some(message) = self.failure.read().ok().and_then(|f| f.clone()) {
            return Err(Error::Internal(message));
        }
        let records = self
            .records
            .read()
            .map_err(|_| Error::Internal("document store lock poisoned".to_string()))?;
        Ok(records.get(reference).cloned())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Object store keyed by `bucket/path`.
///
/// `reported_size` overrides let tests make metadata disagree with the
/// downloaded bytes.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    reported_sizes: RwLock<HashMap<String, u64>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, locator: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(locator, data);
        self
    }

    /// Report `size` from `metadata` regardless of the stored bytes.
    pub fn with_reported_size(self, locator: impl Into<String>, size: u64) -> Self {
        if let Ok(mut sizes) = self.reported_sizes.write() {
            sizes.insert(locator.into(), size);
        }
        self
    }

    pub fn insert(&self, locator: impl Into<String>, data: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(locator.into(), data.into());
        }
    }

    fn read(&self, file: &StoredFile) -> Result<Option<Vec<u8>>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::Internal("object store lock poisoned".to_string()))?;
        Ok(objects.get(&file.to_string()).cloned())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn exists(&self, file: &StoredFile) -> Result<bool> {
        Ok(self.read(file)?.is_some())
    }

    async fn metadata(&self, file: &StoredFile) -> Result<ObjectMetadata> {
        let data = self
            .read(file)?
            .ok_or_else(|| Error::not_found("File", file.to_string()))?;
        let reported = self
            .reported_sizes
            .read()
            .ok()
            .and_then(|sizes| sizes.get(&file.to_string()).copied());
        Ok(ObjectMetadata {
            size: reported.unwrap_or(data.len() as u64),
        })
    }

    async fn download(&self, file: &StoredFile) -> Result<Vec<u8>> {
        self.read(file)?
            .ok_or_else(|| Error::not_found("File", file.to_string()))
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_document_roundtrip_and_absence() {
        let store = InMemoryDocumentStore::new()
            .with_record("payments/doc1", json!({"storagePath": "receipts/r1.jpg"}));

        let fields = store.get("payments/doc1").await.unwrap().unwrap();
        assert_eq!(fields["storagePath"], "receipts/r1.jpg");
        assert!(store.get("payments/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failing_document_store() {
        let store = InMemoryDocumentStore::new().failing("backend down");
        let err = store.get("payments/doc1").await.unwrap_err();
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn test_object_metadata_override() {
        let file = StoredFile::from_locator("bucket/receipts/r1.jpg").unwrap();
        let store = InMemoryObjectStore::new()
            .with_object("bucket/receipts/r1.jpg", vec![1u8, 2, 3])
            .with_reported_size("bucket/receipts/r1.jpg", 99);

        assert!(store.exists(&file).await.unwrap());
        assert_eq!(store.metadata(&file).await.unwrap().size, 99);
        assert_eq!(store.download(&file).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let file = StoredFile::from_locator("bucket/nope.png").unwrap();
        let store = InMemoryObjectStore::new();
        assert!(!store.exists(&file).await.unwrap());
        assert_eq!(store.metadata(&file).await.unwrap_err().status_code(), 404);
    }
}
