//! `getTotalAmount`: extract the total from a stored receipt or statement.
//!
//! Stages run strictly in order and the first failure ends the request:
//! method, content type, rate limit, body, record, file, prompt, model,
//! normalisation.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gestion_core::defaults::ANALYZE_ENDPOINT;
use gestion_core::{
    normalize_amount, prompt_for, validate_analysis_request, validate_content_type,
    validate_method, Error, ErrorCode, Result,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::ApiError;
use crate::middleware::short_request_id;
use crate::rate_limit::client_key;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalAmountResponse {
    pub total: String,
    pub request_id: String,
    pub processing_time: u64,
}

pub async fn get_total_amount(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let started = Instant::now();
    // Always server-minted: the client's header is dropped before the id layer.
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(short_request_id);

    let span = info_span!("get_total_amount", request_id = %request_id);
    async move {
        if method == Method::OPTIONS {
            return StatusCode::NO_CONTENT.into_response();
        }

        let peer = connect_info.map(|ConnectInfo(addr)| addr);
        let outcome = analyze(&state, &method, &headers, peer, body).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(total) => {
                info!(duration_ms, total = %total, "analysis complete");
                Json(TotalAmountResponse {
                    total,
                    request_id,
                    processing_time: duration_ms,
                })
                .into_response()
            }
            Err(e) => {
                let code = e.code();
                let status = e.status_code();
                if e.is_internal() {
                    error!(duration_ms, %code, status, error = ?e, "analysis failed");
                } else {
                    warn!(duration_ms, %code, status, error = %e, "analysis rejected");
                }
                ApiError::new(e, state.expose_error_details).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn analyze(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<String> {
    validate_method(method.as_str())?;
    validate_content_type(
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )?;

    let key = client_key(headers, peer, ANALYZE_ENDPOINT);
    state.rate_limiter.check(&key).await?;

    let body = body.map_err(|e| {
        let message = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            "Request body is too large".to_string()
        } else {
            format!("Request body could not be read: {}", e.body_text())
        };
        Error::validation(message, "body", ErrorCode::InvalidBody)
    })?;
    let json: JsonValue = serde_json::from_slice(&body).map_err(|e| {
        Error::validation(
            format!("Request body is not valid JSON: {}", e),
            "body",
            ErrorCode::InvalidBody,
        )
    })?;
    let request = validate_analysis_request(&json)?;
    info!(
        document = %request.document_reference,
        submission_type = %request.submission_type,
        "request validated"
    );

    let storage_path = state.resolver.resolve(&request.document_reference).await?;
    let locator = state.materializer.locator(&storage_path);
    debug!(locator = %locator, "record resolved");

    let part = state.materializer.materialize(&locator).await?;
    let prompt = prompt_for(request.submission_type);

    let raw = state.invoker.invoke(&part, prompt).await?;
    debug!(raw = %raw.trim(), model = %state.invoker.model_name(), "model answered");

    let amount = normalize_amount(&raw)?;
    Ok(amount.into_string())
}
