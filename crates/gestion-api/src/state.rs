use std::sync::Arc;

use gestion_inference::AiInvoker;

use crate::middleware::GlobalRateLimiter;
use crate::rate_limit::RateLimiter;
use crate::services::{FileMaterializer, RecordResolver};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<RecordResolver>,
    pub materializer: Arc<FileMaterializer>,
    pub invoker: AiInvoker,
    /// Per-client sliding windows for the analysis endpoint.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Process-wide ceiling (None if disabled).
    pub global_limiter: Option<Arc<GlobalRateLimiter>>,
    /// Include debug detail in error bodies.
    pub expose_error_details: bool,
}
