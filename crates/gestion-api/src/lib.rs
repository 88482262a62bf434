//! # gestion-api
//!
//! HTTP server for the receipt analyzer: `POST /getTotalAmount` and
//! `GET /health`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod rate_limit;
pub mod services;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the router with all middleware.
///
/// The analysis route takes every method so that anything but POST gets a
/// JSON `METHOD_NOT_ALLOWED` body instead of a bare 405. Bodies over
/// `max_body_bytes` reach the handler as a rejected extraction and are
/// answered as `INVALID_BODY` after the earlier stages have run.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            &format!("/{}", gestion_core::defaults::ANALYZE_ENDPOINT),
            any(handlers::get_total_amount),
        )
        .route("/health", get(handlers::health_check))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::global_rate_limit_middleware,
        ))
        .layer(CatchPanicLayer::custom(middleware::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeShortRequestId))
        .layer(axum::middleware::from_fn(middleware::discard_client_request_id))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(axum::middleware::from_fn(middleware::cors_middleware))
        .with_state(state)
}
