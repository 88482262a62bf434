//! Cross-cutting HTTP middleware: CORS, request ids, the global limiter,
//! and panic recovery.

use std::any::Any;
use std::num::NonZeroU32;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{Quota, RateLimiter};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{debug, error, warn};

use crate::error::ApiError;
use crate::rate_limit::rate_limited;
use crate::state::AppState;
use gestion_core::Error;

/// Global rate limiter type (direct quota, no keyed bucketing).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Allow `requests` per `period`, all of which may arrive as a burst.
pub fn global_limiter(requests: NonZeroU32, period: Duration) -> Option<GlobalRateLimiter> {
    let replenish = period.checked_div(requests.get())?;
    let quota = Quota::with_period(replenish)?.allow_burst(requests);
    Some(RateLimiter::direct(quota))
}

pub async fn global_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.global_limiter {
        if limiter.check().is_err() {
            warn!("Global rate limit exceeded");
            return ApiError::new(rate_limited(), false).into_response();
        }
    }
    next.run(request).await
}

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";

/// Permissive CORS on every response; preflights end here with 204.
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

/// Short random correlation ids (8 hex chars).
#[derive(Clone, Default)]
pub struct MakeShortRequestId;

pub fn short_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

impl MakeRequestId for MakeShortRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = short_request_id().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Remove any inbound `x-request-id` so the id layer always mints a fresh one.
pub async fn discard_client_request_id(mut request: Request, next: Next) -> Response {
    if let Some(supplied) = request.headers_mut().remove("x-request-id") {
        debug!(len = supplied.len(), "discarding client request id");
    }
    next.run(request).await
}

/// JSON 500 for a panicking handler.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "handler panicked");
    ApiError::new(Error::Internal(detail.to_string()), false).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_request_id() {
        let id = short_request_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(short_request_id(), id);
    }

    #[test]
    fn test_global_limiter_burst() {
        let limiter = global_limiter(NonZeroU32::new(3).unwrap(), Duration::from_secs(60)).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_panic_response_is_generic_json() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
