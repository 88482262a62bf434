//! Centralized default constants for the gestion service.
//!
//! All crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// REQUEST VALIDATION
// =============================================================================

/// Minimum length of a document reference.
pub const DOCUMENT_REF_MIN_LEN: usize = 3;

/// Maximum length of a document reference.
pub const DOCUMENT_REF_MAX_LEN: usize = 500;

/// Minimum number of `/`-separated segments (collection/document).
pub const DOCUMENT_REF_MIN_SEGMENTS: usize = 2;

/// Request field holding the document reference.
pub const FIELD_DOCUMENT_REF: &str = "firestorePath";

/// Request field holding the submission type.
pub const FIELD_SUBMISSION_TYPE: &str = "submissionType";

// =============================================================================
// FILES
// =============================================================================

/// Maximum stored-file size accepted for analysis (10 MiB).
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// File extensions accepted for analysis (lowercase).
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "pdf"];

/// Record field naming the stored object.
pub const STORAGE_PATH_FIELD: &str = "storagePath";

// =============================================================================
// AMOUNTS
// =============================================================================

/// Largest amount the normalizer accepts.
pub const MAX_AMOUNT: f64 = 1_000_000_000.0;

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Requests allowed per client in the trailing minute.
pub const RATE_LIMIT_PER_MINUTE: usize = 60;

/// Requests allowed per client in the trailing hour.
pub const RATE_LIMIT_PER_HOUR: usize = 1000;

/// Seconds a limited client is told to wait.
pub const RATE_LIMIT_RETRY_AFTER_SECS: u64 = 60;

/// Interval between sweeps of expired rate-limit keys.
pub const RATE_LIMIT_SWEEP_SECS: u64 = 10 * 60;

// =============================================================================
// GOOGLE CLOUD
// =============================================================================

/// Default project identifier.
pub const GCP_PROJECT_ID: &str = "gestion-20";

/// Default service region.
pub const GCP_LOCATION: &str = "us-central1";

/// Default multimodal model.
pub const VISION_MODEL: &str = "gemini-2.0-flash";

/// Default storage bucket for uploaded receipts.
pub const STORAGE_BUCKET: &str = "gestion-20.firebasestorage.app";

/// Default service account key file (key-file credential mode).
pub const KEY_FILE: &str = "service-account-key.json";

/// OAuth scope requested for every Google API call.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Firestore REST endpoint.
pub const FIRESTORE_URL: &str = "https://firestore.googleapis.com";

/// Cloud Storage JSON API endpoint.
pub const STORAGE_URL: &str = "https://storage.googleapis.com";

/// Metadata server token endpoint (ambient credentials).
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

// =============================================================================
// INFERENCE
// =============================================================================

/// Upper bound on a single model call, in seconds.
pub const AI_TIMEOUT_SECS: u64 = 60;

/// Default Ollama endpoint (local development backend).
pub const OLLAMA_URL: &str = "http://localhost:11434";

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Endpoint name used in rate-limit keys.
pub const ANALYZE_ENDPOINT: &str = "getTotalAmount";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_limit_is_ten_mebibytes() {
        assert_eq!(MAX_FILE_BYTES, 10_485_760);
    }

    #[test]
    fn test_allowed_extensions_are_lowercase() {
        for ext in ALLOWED_EXTENSIONS {
            assert_eq!(*ext, ext.to_lowercase());
        }
    }

    #[test]
    fn test_minute_limit_below_hour_limit() {
        assert!(RATE_LIMIT_PER_MINUTE < RATE_LIMIT_PER_HOUR);
    }
}
