//! Request validation for the analysis endpoint.
//!
//! Each rule fails with its own [`ErrorCode`] so callers can tell exactly
//! which constraint a request broke. Checks run in a fixed order and stop at
//! the first violation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::defaults::{
    DOCUMENT_REF_MAX_LEN, DOCUMENT_REF_MIN_LEN, DOCUMENT_REF_MIN_SEGMENTS, FIELD_DOCUMENT_REF,
    FIELD_SUBMISSION_TYPE,
};
use crate::error::{Error, ErrorCode, Result};
use crate::models::{AnalysisRequest, SubmissionType};

static DOCUMENT_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-/]+$").expect("static pattern"));

/// Methods the analysis endpoint accepts.
pub const ALLOWED_METHODS: &[&str] = &["POST"];

/// Validate a decoded request body.
///
/// Accepts the legacy shape where `firestorePath` is an object carrying both
/// fields; in that case `submissionType` is read from the nested object.
pub fn validate_analysis_request(body: &JsonValue) -> Result<AnalysisRequest> {
    let object = body.as_object().ok_or_else(|| {
        Error::validation(
            "Request body must be a JSON object",
            "body",
            ErrorCode::InvalidBody,
        )
    })?;

    let mut reference = object.get(FIELD_DOCUMENT_REF);
    let mut submission = object.get(FIELD_SUBMISSION_TYPE);

    if let Some(nested) = reference.and_then(JsonValue::as_object) {
        if nested.get(FIELD_DOCUMENT_REF).is_some_and(is_truthy) {
            submission = nested.get(FIELD_SUBMISSION_TYPE);
            reference = nested.get(FIELD_DOCUMENT_REF);
        }
    }

    let document_reference = validate_document_reference(reference)?;
    let submission_type = validate_submission_type(submission)?;

    Ok(AnalysisRequest {
        document_reference,
        submission_type,
    })
}

/// Validate the document reference field.
pub fn validate_document_reference(value: Option<&JsonValue>) -> Result<String> {
    let field = FIELD_DOCUMENT_REF;
    let path = require_string(value, field)?;

    let len = path.chars().count();
    if len < DOCUMENT_REF_MIN_LEN {
        return Err(Error::validation(
            format!(
                "Field \"{}\" must be at least {} characters, got {}",
                field, DOCUMENT_REF_MIN_LEN, len
            ),
            field,
            ErrorCode::StringTooShort,
        ));
    }
    if len > DOCUMENT_REF_MAX_LEN {
        return Err(Error::validation(
            format!(
                "Field \"{}\" must be at most {} characters, got {}",
                field, DOCUMENT_REF_MAX_LEN, len
            ),
            field,
            ErrorCode::StringTooLong,
        ));
    }

    // Traversal guard runs before the character pattern so `..` is reported
    // as traversal rather than as a bad character.
    if path.contains("..") || path.contains("//") {
        return Err(Error::validation(
            format!("Field \"{}\" contains a forbidden sequence", field),
            field,
            ErrorCode::MaliciousPath,
        ));
    }

    if !DOCUMENT_REF_PATTERN.is_match(path) {
        return Err(Error::validation(
            format!(
                "Field \"{}\" has an invalid format, expected collection/document",
                field
            ),
            field,
            ErrorCode::InvalidFormat,
        ));
    }

    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < DOCUMENT_REF_MIN_SEGMENTS {
        return Err(Error::validation(
            format!("Field \"{}\" must look like collection/document", field),
            field,
            ErrorCode::InvalidPathStructure,
        ));
    }
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(Error::validation(
            format!("Field \"{}\" must not contain empty segments", field),
            field,
            ErrorCode::EmptyPathSegment,
        ));
    }

    Ok(path.to_string())
}

/// Validate the submission type field.
///
/// Missing or non-string values are rejected. Unknown strings are accepted
/// and treated as [`SubmissionType::Payment`], which is what the existing
/// web client relies on.
pub fn validate_submission_type(value: Option<&JsonValue>) -> Result<SubmissionType> {
    let raw = require_string(value, FIELD_SUBMISSION_TYPE)?;
    match SubmissionType::parse(raw) {
        Some(kind) => Ok(kind),
        None => {
            warn!(
                submission_type = %raw,
                "Unrecognized submission type, defaulting to PAYMENT"
            );
            Ok(SubmissionType::Payment)
        }
    }
}

/// Check that the request declares a JSON body.
pub fn validate_content_type(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains("application/json") => Ok(()),
        _ => Err(Error::validation(
            "Content-Type must be application/json",
            "Content-Type",
            ErrorCode::InvalidContentType,
        )),
    }
}

/// Check the HTTP method against [`ALLOWED_METHODS`].
pub fn validate_method(method: &str) -> Result<()> {
    let upper = method.to_ascii_uppercase();
    if ALLOWED_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(Error::validation(
            format!(
                "HTTP method not allowed. Allowed methods: {}",
                ALLOWED_METHODS.join(", ")
            ),
            "method",
            ErrorCode::MethodNotAllowed,
        ))
    }
}

fn require_string<'a>(value: Option<&'a JsonValue>, field: &str) -> Result<&'a str> {
    match value {
        None | Some(JsonValue::Null) => Err(required(field)),
        Some(JsonValue::String(s)) if s.is_empty() => Err(required(field)),
        Some(JsonValue::String(s)) => Ok(s),
        Some(other) => Err(Error::validation(
            format!(
                "Field \"{}\" must be a string, got {}",
                field,
                json_type_name(other)
            ),
            field,
            ErrorCode::InvalidType,
        )),
    }
}

fn required(field: &str) -> Error {
    Error::validation(
        format!("Field \"{}\" is required", field),
        field,
        ErrorCode::RequiredField,
    )
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference_code(value: JsonValue) -> ErrorCode {
        validate_document_reference(Some(&value)).unwrap_err().code()
    }

    #[test]
    fn test_valid_reference_passes() {
        for ok in ["payments/abc123", "a/b", "users/u_1/payments/p-2", "ab/c"] {
            let value = json!(ok);
            assert_eq!(validate_document_reference(Some(&value)).unwrap(), ok);
        }
    }

    #[test]
    fn test_missing_reference_is_required() {
        assert_eq!(
            validate_document_reference(None).unwrap_err().code(),
            ErrorCode::RequiredField
        );
        assert_eq!(reference_code(JsonValue::Null), ErrorCode::RequiredField);
        assert_eq!(reference_code(json!("")), ErrorCode::RequiredField);
    }

    #[test]
    fn test_non_string_reference_is_invalid_type() {
        assert_eq!(reference_code(json!(42)), ErrorCode::InvalidType);
        assert_eq!(reference_code(json!(["a", "b"])), ErrorCode::InvalidType);
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(reference_code(json!("ab")), ErrorCode::StringTooShort);
        let long = format!("payments/{}", "x".repeat(DOCUMENT_REF_MAX_LEN));
        assert_eq!(reference_code(json!(long)), ErrorCode::StringTooLong);

        let exact = format!("p/{}", "x".repeat(DOCUMENT_REF_MAX_LEN - 2));
        assert!(validate_document_reference(Some(&json!(exact))).is_ok());
    }

    #[test]
    fn test_bad_characters_are_invalid_format() {
        assert_eq!(reference_code(json!("payments/abc 123")), ErrorCode::InvalidFormat);
        assert_eq!(reference_code(json!("payments/abc.jpg")), ErrorCode::InvalidFormat);
        assert_eq!(reference_code(json!("payments/ñandú")), ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_single_segment_is_invalid_structure() {
        assert_eq!(reference_code(json!("payments")), ErrorCode::InvalidPathStructure);
    }

    #[test]
    fn test_empty_segment() {
        assert_eq!(reference_code(json!("payments/")), ErrorCode::EmptyPathSegment);
        assert_eq!(reference_code(json!("/payments")), ErrorCode::EmptyPathSegment);
    }

    #[test]
    fn test_traversal_is_malicious() {
        assert_eq!(reference_code(json!("payments/../secrets")), ErrorCode::MaliciousPath);
        assert_eq!(reference_code(json!("payments//x")), ErrorCode::MaliciousPath);
    }

    #[test]
    fn test_errors_name_the_field() {
        let err = validate_document_reference(Some(&json!("x"))).unwrap_err();
        assert_eq!(err.field(), Some("firestorePath"));
    }

    #[test]
    fn test_submission_type_known_values() {
        assert_eq!(
            validate_submission_type(Some(&json!("STATEMENT"))).unwrap(),
            SubmissionType::Statement
        );
        assert_eq!(
            validate_submission_type(Some(&json!("PAYMENT"))).unwrap(),
            SubmissionType::Payment
        );
    }

    #[test]
    fn test_submission_type_unknown_defaults_to_payment() {
        for raw in ["statement", "INVOICE", "x"] {
            assert_eq!(
                validate_submission_type(Some(&json!(raw))).unwrap(),
                SubmissionType::Payment
            );
        }
    }

    #[test]
    fn test_submission_type_missing_or_wrong_type() {
        let err = validate_submission_type(None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequiredField);
        assert_eq!(err.field(), Some("submissionType"));

        let err = validate_submission_type(Some(&json!(1))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidType);
    }

    #[test]
    fn test_full_body() {
        let body = json!({"firestorePath": "payments/doc1", "submissionType": "STATEMENT"});
        let request = validate_analysis_request(&body).unwrap();
        assert_eq!(request.document_reference, "payments/doc1");
        assert_eq!(request.submission_type, SubmissionType::Statement);
    }

    #[test]
    fn test_legacy_nested_body_is_unwrapped() {
        let body = json!({
            "firestorePath": {"firestorePath": "payments/doc1", "submissionType": "STATEMENT"}
        });
        let request = validate_analysis_request(&body).unwrap();
        assert_eq!(request.document_reference, "payments/doc1");
        assert_eq!(request.submission_type, SubmissionType::Statement);
    }

    #[test]
    fn test_legacy_body_ignores_outer_submission_type() {
        let body = json!({
            "firestorePath": {"firestorePath": "payments/doc1"},
            "submissionType": "STATEMENT"
        });
        let err = validate_analysis_request(&body).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequiredField);
        assert_eq!(err.field(), Some("submissionType"));
    }

    #[test]
    fn test_object_without_nested_reference_is_invalid_type() {
        let body = json!({"firestorePath": {"other": 1}, "submissionType": "PAYMENT"});
        let err = validate_analysis_request(&body).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidType);
    }

    #[test]
    fn test_missing_submission_type_in_body() {
        let body = json!({"firestorePath": "payments/doc1"});
        let err = validate_analysis_request(&body).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RequiredField);
        assert_eq!(err.field(), Some("submissionType"));
    }

    #[test]
    fn test_non_object_body() {
        for body in [json!([]), json!("payments/doc1"), JsonValue::Null] {
            let err = validate_analysis_request(&body).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidBody);
        }
    }

    #[test]
    fn test_content_type() {
        assert!(validate_content_type(Some("application/json")).is_ok());
        assert!(validate_content_type(Some("application/json; charset=utf-8")).is_ok());
        assert!(validate_content_type(Some("Application/JSON")).is_ok());
        assert_eq!(
            validate_content_type(Some("text/plain")).unwrap_err().code(),
            ErrorCode::InvalidContentType
        );
        assert_eq!(
            validate_content_type(None).unwrap_err().code(),
            ErrorCode::InvalidContentType
        );
    }

    #[test]
    fn test_method() {
        assert!(validate_method("POST").is_ok());
        assert!(validate_method("post").is_ok());
        for m in ["GET", "PUT", "DELETE", "PATCH"] {
            assert_eq!(
                validate_method(m).unwrap_err().code(),
                ErrorCode::MethodNotAllowed
            );
        }
    }
}
