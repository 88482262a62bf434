//! Turns a stored-object locator into an inline model payload.

use std::sync::Arc;

use base64::Engine;
use gestion_core::{
    resolve_mime_type, validate_file_size, validate_file_type, Error, GenerativePart,
    ObjectStore, Result, StoredFile,
};
use tracing::debug;

pub struct FileMaterializer {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl FileMaterializer {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Locator for a record's storage path.
    ///
    /// Paths are relative to the configured bucket unless they carry a
    /// `gs://` scheme, in which case they already name the bucket.
    pub fn locator(&self, storage_path: &str) -> String {
        if storage_path.starts_with("gs://") {
            storage_path.to_string()
        } else {
            format!("{}/{}", self.bucket, storage_path.trim_start_matches('/'))
        }
    }

    pub async fn materialize(&self, locator: &str) -> Result<GenerativePart> {
        let file = StoredFile::from_locator(locator)?;

        if !self.store.exists(&file).await? {
            return Err(Error::not_found("File", file.to_string()));
        }

        let metadata = self.store.metadata(&file).await?;
        validate_file_size(metadata.size)?;
        let extension = validate_file_type(&file)?;

        let data = self.store.download(&file).await?;
        // Metadata can lag the object.
        validate_file_size(data.len() as u64)?;

        let mime_type = resolve_mime_type(&extension, &data)?;
        debug!(
            file = %file,
            size = data.len(),
            mime_type = %mime_type,
            backend = self.store.backend_name(),
            "file materialized"
        );

        Ok(GenerativePart {
            mime_type: mime_type.to_string(),
            base64_data: base64::engine::general_purpose::STANDARD.encode(&data),
        })
    }
}
