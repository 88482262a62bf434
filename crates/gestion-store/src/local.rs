//! Filesystem-backed stores for running without Google Cloud.
//!
//! Layout under the root directory:
//!
//! ```text
//! {root}/documents/{reference}.json     one JSON object per record
//! {root}/objects/{bucket}/{path}        raw object bytes
//! ```
//!
//! References and object paths arrive already validated, but both stores
//! still refuse anything that would resolve outside the root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use gestion_core::{
    DocumentFields, DocumentStore, Error, ErrorCode, ObjectMetadata, ObjectStore, Result,
    StoredFile,
};
use serde_json::Value as JsonValue;
use tokio::fs;
use tracing::{debug, warn};

/// Join `relative` under `base`, rejecting absolute paths and `..` components.
fn contained_join(base: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    let safe = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(Error::invalid(
            format!("Path '{}' escapes the store root", relative),
            ErrorCode::MaliciousPath,
        ));
    }
    Ok(base.join(rel))
}

/// Document store reading `{root}/documents/{reference}.json`.
pub struct LocalDocumentStore {
    base_path: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            base_path: root.into().join("documents"),
        }
    }

    fn full_path(&self, reference: &str) -> Result<PathBuf> {
        contained_join(&self.base_path, &format!("{}.json", reference))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn get(&self, reference: &str) -> Result<Option<DocumentFields>> {
        let full_path = self.full_path(reference)?;
        debug!(reference = %reference, full_path = %full_path.display(), "local_store: get");

        if !fs::try_exists(&full_path).await? {
            return Ok(None);
        }
        let raw = fs::read(&full_path).await?;
        match serde_json::from_slice::<JsonValue>(&raw)? {
            JsonValue::Object(fields) => Ok(Some(fields)),
            _ => {
                warn!(full_path = %full_path.display(), "local_store: record is not a JSON object");
                Err(Error::Serialization(format!(
                    "Record '{}' is not a JSON object",
                    reference
                )))
            }
        }
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}

/// Object store reading `{root}/objects/{bucket}/{path}`.
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            base_path: root.into().join("objects"),
        }
    }

    fn full_path(&self, file: &StoredFile) -> Result<PathBuf> {
        let bucket_dir = contained_join(&self.base_path, &file.bucket)?;
        contained_join(&bucket_dir, &file.path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, file: &StoredFile) -> Result<bool> {
        let full_path = self.full_path(file)?;
        Ok(fs::try_exists(&full_path).await? && fs::metadata(&full_path).await?.is_file())
    }

    async fn metadata(&self, file: &StoredFile) -> Result<ObjectMetadata> {
        let full_path = self.full_path(file)?;
        match fs::metadata(&full_path).await {
            Ok(meta) => Ok(ObjectMetadata { size: meta.len() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("File", file.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn download(&self, file: &StoredFile) -> Result<Vec<u8>> {
        let full_path = self.full_path(file)?;
        debug!(file = %file, full_path = %full_path.display(), "local_store: download");
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("File", file.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contained_join_rejects_escapes() {
        let base = Path::new("/srv/store");
        assert!(contained_join(base, "payments/doc1.json").is_ok());
        assert!(contained_join(base, "../etc/passwd").is_err());
        assert!(contained_join(base, "/etc/passwd").is_err());
        assert!(contained_join(base, "a/../../b").is_err());
    }
}
