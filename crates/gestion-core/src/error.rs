//! Error types for the gestion receipt analyzer.
//!
//! Every failure a request can hit is one of these variants. The HTTP layer
//! reads [`Error::status_code`] and [`Error::code`] to build the JSON error
//! body, so adding a variant here is enough to surface it to callers.

use std::fmt;

use thiserror::Error;

/// Result type alias using gestion's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Message returned for internal failures with no caller-safe detail.
pub const GENERIC_INTERNAL_MESSAGE: &str = "Internal server error";

/// Message returned when the vision model call fails or times out.
pub const AI_FAILURE_MESSAGE: &str = "AI analysis failed, try again";

/// Message returned when the model answer has no text where expected.
pub const INVALID_AI_RESPONSE_MESSAGE: &str = "Invalid AI response";

/// Machine-readable error codes returned in the `code` field of error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Generic validation failure.
    ValidationError,
    RequiredField,
    InvalidType,
    StringTooShort,
    StringTooLong,
    InvalidFormat,
    InvalidPathStructure,
    EmptyPathSegment,
    MaliciousPath,
    /// Reserved: submission types are coerced, not rejected.
    InvalidEnumValue,
    InvalidBody,
    InvalidContentType,
    MethodNotAllowed,
    MissingField,
    InvalidStoragePath,
    FileTooLarge,
    InvalidFileType,
    InvalidAiResponse,
    InvalidAmount,
    AmountTooLarge,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    RateLimitExceeded,
    InternalError,
}

impl ErrorCode {
    /// Wire representation, e.g. `MALICIOUS_PATH`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RequiredField => "REQUIRED_FIELD",
            Self::InvalidType => "INVALID_TYPE",
            Self::StringTooShort => "STRING_TOO_SHORT",
            Self::StringTooLong => "STRING_TOO_LONG",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::InvalidPathStructure => "INVALID_PATH_STRUCTURE",
            Self::EmptyPathSegment => "EMPTY_PATH_SEGMENT",
            Self::MaliciousPath => "MALICIOUS_PATH",
            Self::InvalidEnumValue => "INVALID_ENUM_VALUE",
            Self::InvalidBody => "INVALID_BODY",
            Self::InvalidContentType => "INVALID_CONTENT_TYPE",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidStoragePath => "INVALID_STORAGE_PATH",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::InvalidFileType => "INVALID_FILE_TYPE",
            Self::InvalidAiResponse => "INVALID_AI_RESPONSE",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::AmountTooLarge => "AMOUNT_TOO_LARGE",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for gestion operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-supplied or derived data failed a rule (400).
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        code: ErrorCode,
    },

    /// Authentication required (401). Not produced by the analysis path today.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not allowed (403). Not produced by the analysis path today.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A document record or stored object does not exist (404).
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Sliding-window threshold reached (429).
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },

    /// The vision model call failed or timed out (500). Upstream detail is logged, never carried.
    #[error("{msg}", msg = AI_FAILURE_MESSAGE)]
    AiFailed,

    /// The vision model answered without the expected text (500).
    #[error("{msg}", msg = INVALID_AI_RESPONSE_MESSAGE)]
    InvalidAiResponse,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a validation error tied to a request field.
    pub fn validation(message: impl Into<String>, field: impl Into<String>, code: ErrorCode) -> Self {
        Error::Validation {
            message: message.into(),
            field: Some(field.into()),
            code,
        }
    }

    /// Build a validation error with no associated field.
    pub fn invalid(message: impl Into<String>, code: ErrorCode) -> Self {
        Error::Validation {
            message: message.into(),
            field: None,
            code,
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// HTTP status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::Unauthenticated(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound { .. } => 404,
            Error::RateLimited { .. } => 429,
            _ => 500,
        }
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Validation { code, .. } => *code,
            Error::Unauthenticated(_) => ErrorCode::Unauthenticated,
            Error::Forbidden(_) => ErrorCode::PermissionDenied,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            Error::InvalidAiResponse => ErrorCode::InvalidAiResponse,
            _ => ErrorCode::InternalError,
        }
    }

    /// Request field the error refers to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// True for 5xx errors whose message must not reach the caller.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to return to the caller.
    ///
    /// Internal errors collapse to a fixed message, except the two AI
    /// variants whose text is already fixed.
    pub fn public_message(&self) -> String {
        match self {
            Error::AiFailed | Error::InvalidAiResponse => self.to_string(),
            e if e.is_internal() => GENERIC_INTERNAL_MESSAGE.to_string(),
            e => e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
