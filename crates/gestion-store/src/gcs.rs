//! Cloud Storage object store over the JSON API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gestion_core::{CredentialProvider, Error, ObjectMetadata, ObjectStore, Result, StoredFile};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

/// Downloads are capped well above the 10 MiB file limit.
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Object store backed by the Cloud Storage JSON API.
pub struct GcsObjectStore {
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    client: reqwest::Client,
}

impl GcsObjectStore {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::with_base_url(gestion_core::defaults::STORAGE_URL.to_string(), credentials)
    }

    pub fn with_base_url(base_url: String, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    fn object_url(&self, file: &StoredFile) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&file.bucket),
            urlencoding::encode(&file.path)
        )
    }

    async fn get_object(&self, file: &StoredFile, media: bool) -> Result<Response> {
        let token = self.credentials.access_token().await?;
        let mut request = self.client.get(self.object_url(file)).bearer_auth(token);
        if media {
            request = request.query(&[("alt", "media")]);
        }
        Ok(request.send().await?)
    }
}

#[derive(Debug, Deserialize)]
struct GcsObjectResource {
    /// Decimal string in the JSON API.
    size: String,
}

async fn unexpected_status(file: &StoredFile, response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(file = %file, %status, "gcs: request failed");
    Error::Request(format!("Cloud Storage returned {}: {}", status, body))
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn exists(&self, file: &StoredFile) -> Result<bool> {
        debug!(file = %file, "gcs: exists");
        let response = self.get_object(file, false).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(unexpected_status(file, response).await),
        }
    }

    async fn metadata(&self, file: &StoredFile) -> Result<ObjectMetadata> {
        let response = self.get_object(file, false).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found("File", file.to_string()));
        }
        if !response.status().is_success() {
            return Err(unexpected_status(file, response).await);
        }
        let resource: GcsObjectResource = response.json().await?;
        let size = resource.size.parse::<u64>().map_err(|e| {
            Error::Serialization(format!("Invalid object size '{}': {}", resource.size, e))
        })?;
        Ok(ObjectMetadata { size })
    }

    async fn download(&self, file: &StoredFile) -> Result<Vec<u8>> {
        debug!(file = %file, "gcs: download");
        let response = self.get_object(file, true).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found("File", file.to_string()));
        }
        if !response.status().is_success() {
            return Err(unexpected_status(file, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn backend_name(&self) -> &str {
        "gcs"
    }
}
