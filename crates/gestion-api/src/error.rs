//! Error-to-response mapping.
//!
//! Every failure leaves the server as a JSON body:
//!
//! ```json
//! {"error": "...", "code": "MACHINE_CODE", "field": "...", "retryAfter": 60, "stack": "..."}
//! ```
//!
//! `field`, `retryAfter` and `stack` are omitted when they don't apply.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gestion_core::Error;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A core error plus whether debug detail may be shown to the caller.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    expose_details: bool,
}

impl ApiError {
    pub fn new(error: Error, expose_details: bool) -> Self {
        Self {
            error,
            expose_details,
        }
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> ErrorBody {
        let retry_after = match &self.error {
            Error::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        };
        ErrorBody {
            error: self.error.public_message(),
            code: self.error.code().as_str(),
            field: self.error.field().map(str::to_string),
            retry_after,
            stack: self.expose_details.then(|| format!("{:?}", self.error)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        let mut response = (self.status(), Json(body)).into_response();
        if let Error::RateLimited {
            retry_after_secs, ..
        } = &self.error
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gestion_core::ErrorCode;

    #[test]
    fn test_validation_body() {
        let err = ApiError::new(
            Error::validation(
                "submissionType is required",
                "submissionType",
                ErrorCode::RequiredField,
            ),
            false,
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "submissionType is required",
                "code": "REQUIRED_FIELD",
                "field": "submissionType"
            })
        );
    }

    #[test]
    fn test_internal_error_is_generic() {
        let err = ApiError::new(Error::Request("dns failure for firestore".into()), false);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(body.get("stack").is_none());
    }

    #[test]
    fn test_stack_only_when_exposed() {
        let err = ApiError::new(Error::Request("dns failure".into()), true);
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"], "Internal server error");
        assert!(body["stack"].as_str().unwrap().contains("dns failure"));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let err = ApiError::new(
            Error::RateLimited {
                message: "Too many requests".into(),
                retry_after_secs: 60,
            },
            false,
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }
}
