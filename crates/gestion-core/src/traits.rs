//! Collaborator traits for the analysis pipeline.
//!
//! The handler only talks to the outside world through these traits, so the
//! Google Cloud adapters, the local filesystem backend, and the in-memory
//! test doubles are interchangeable.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::models::{ObjectMetadata, StoredFile};

/// Fields of a fetched document record, flattened to plain JSON.
pub type DocumentFields = Map<String, JsonValue>;

/// Point-read access to the document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a record by its hierarchical reference. `Ok(None)` when absent.
    async fn get(&self, reference: &str) -> Result<Option<DocumentFields>>;

    /// Backend name for logs.
    fn backend_name(&self) -> &str;
}

/// Read access to the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check if the object exists.
    async fn exists(&self, file: &StoredFile) -> Result<bool>;

    /// Fetch object metadata.
    async fn metadata(&self, file: &StoredFile) -> Result<ObjectMetadata>;

    /// Download the full object.
    async fn download(&self, file: &StoredFile) -> Result<Vec<u8>>;

    /// Backend name for logs.
    fn backend_name(&self) -> &str;
}

/// How the service authenticates to Google APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Explicit service account key file (local/dev).
    KeyFile,
    /// Platform-provided credentials from the metadata server (production).
    Ambient,
}

impl CredentialMode {
    pub fn is_production(&self) -> bool {
        matches!(self, CredentialMode::Ambient)
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyFile => write!(f, "key-file"),
            Self::Ambient => write!(f, "ambient"),
        }
    }
}

/// Source of OAuth bearer tokens for Google APIs.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A bearer token valid for at least the next minute.
    async fn access_token(&self) -> Result<String>;

    fn mode(&self) -> CredentialMode;
}
