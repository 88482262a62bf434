//! Request-scoped data types for receipt analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorCode, Result};

/// Kind of document the caller uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubmissionType {
    /// An account statement; the amount due is extracted.
    Statement,
    /// A payment receipt; the amount paid is extracted.
    #[default]
    Payment,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statement => "STATEMENT",
            Self::Payment => "PAYMENT",
        }
    }

    /// Exact, case-sensitive match against the wire values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "STATEMENT" => Some(Self::Statement),
            "PAYMENT" => Some(Self::Payment),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Hierarchical reference of the document record, e.g. `payments/abc123`.
    pub document_reference: String,
    pub submission_type: SubmissionType,
}

/// A stored object split into bucket and object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub bucket: String,
    /// Object path inside the bucket; may contain `/`.
    pub path: String,
}

impl StoredFile {
    /// Split a `bucket/path` locator on the first `/`.
    ///
    /// A leading `gs://` is ignored.
    pub fn from_locator(locator: &str) -> Result<Self> {
        let trimmed = locator.strip_prefix("gs://").unwrap_or(locator);
        match trimmed.split_once('/') {
            Some((bucket, path)) if !bucket.is_empty() && !path.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            _ => Err(Error::invalid(
                format!("Storage locator '{}' is not of the form bucket/path", locator),
                ErrorCode::InvalidStoragePath,
            )),
        }
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension of the file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        self.file_name()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

impl fmt::Display for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

/// Object metadata reported by the object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
}

/// Inline payload sent to the vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerativePart {
    pub mime_type: String,
    pub base64_data: String,
}

/// Amount extracted from a model answer.
///
/// Holds the model's own decimal text, trimmed, so formatting such as
/// trailing zeros survives to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAmount {
    text: String,
    value: f64,
}

impl ExtractedAmount {
    pub(crate) fn new(text: String, value: f64) -> Self {
        Self { text, value }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for ExtractedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
