//! # gestion-core
//!
//! Core types, rules, and abstractions for the gestion receipt analyzer.
//!
//! This crate provides the request validator, the prompt selector, the
//! response normalizer, file-type rules, the error taxonomy, and the traits
//! the HTTP layer uses to reach the document store, the object store, and
//! Google credentials.

pub mod credentials;
pub mod defaults;
pub mod error;
pub mod file_types;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use credentials::{MetadataServerProvider, ServiceAccountKey, ServiceAccountKeyProvider};
pub use error::{
    Error, ErrorCode, Result, AI_FAILURE_MESSAGE, GENERIC_INTERNAL_MESSAGE,
    INVALID_AI_RESPONSE_MESSAGE,
};
pub use file_types::{mime_from_extension, resolve_mime_type, validate_file_size, validate_file_type};
pub use models::*;
pub use normalize::normalize_amount;
pub use prompts::prompt_for;
pub use traits::*;
pub use validation::{
    validate_analysis_request, validate_content_type, validate_document_reference,
    validate_method, validate_submission_type,
};
