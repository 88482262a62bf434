use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gestion_api::config::{RateLimitBackend, StoreBackend, VisionBackendKind};
use gestion_api::rate_limit::{RateLimiter, RedisSlidingWindowLimiter, SlidingWindowLimiter};
use gestion_api::services::{FileMaterializer, RecordResolver};
use gestion_api::{build_router, logging, middleware, AppConfig, AppState};
use gestion_core::defaults::RATE_LIMIT_SWEEP_SECS;
use gestion_core::{
    CredentialMode, CredentialProvider, DocumentStore, MetadataServerProvider, ObjectStore,
    ServiceAccountKeyProvider,
};
use gestion_inference::{AiInvoker, OllamaVisionBackend, VertexVisionBackend, VisionBackend};
use gestion_store::{
    FirestoreDocumentStore, GcsObjectStore, LocalDocumentStore, LocalObjectStore,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _log_guard = logging::init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(
        credentials_mode = %config.credentials_mode,
        project = %config.project_id,
        model = %config.vision_model,
        "Configuration loaded"
    );

    let credentials = credential_provider(&config)?;
    let (documents, objects) = stores(&config, credentials.clone());
    let vision = vision_backend(&config, credentials);

    let (rate_limiter, sweeper) = rate_limiter(&config).await;

    let global_limiter = config.global_rate_limit.and_then(|limit| {
        let requests = NonZeroU32::new(limit.requests)?;
        let limiter = middleware::global_limiter(requests, limit.period)?;
        info!(
            requests = limit.requests,
            period_secs = limit.period.as_secs(),
            "Global rate limit enabled"
        );
        Some(Arc::new(limiter))
    });

    let state = AppState {
        resolver: Arc::new(RecordResolver::new(documents, config.storage_path_field.clone())),
        materializer: Arc::new(FileMaterializer::new(objects, config.storage_bucket.clone())),
        invoker: AiInvoker::new(vision, config.ai_timeout),
        rate_limiter,
        global_limiter,
        expose_error_details: config.expose_error_details(),
    };

    let app = build_router(state, config.max_body_bytes);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    info!("Server stopped");
    Ok(())
}

fn credential_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn CredentialProvider>> {
    let provider: Arc<dyn CredentialProvider> = match config.credentials_mode {
        CredentialMode::KeyFile => {
            let provider = ServiceAccountKeyProvider::from_file(&config.key_file)
                .with_context(|| format!("loading key file {}", config.key_file.display()))?;
            info!(client_email = %provider.client_email(), "Using service account key");
            Arc::new(provider)
        }
        CredentialMode::Ambient => {
            info!("Using metadata server credentials");
            Arc::new(MetadataServerProvider::new())
        }
    };
    Ok(provider)
}

fn stores(
    config: &AppConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> (Arc<dyn DocumentStore>, Arc<dyn ObjectStore>) {
    match config.store_backend {
        StoreBackend::Gcp => (
            Arc::new(FirestoreDocumentStore::new(
                config.project_id.clone(),
                credentials.clone(),
            )),
            Arc::new(GcsObjectStore::new(credentials)),
        ),
        StoreBackend::Local => {
            info!(root = %config.local_store_root.display(), "Using local store");
            (
                Arc::new(LocalDocumentStore::new(&config.local_store_root)),
                Arc::new(LocalObjectStore::new(&config.local_store_root)),
            )
        }
    }
}

fn vision_backend(
    config: &AppConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> Arc<dyn VisionBackend> {
    match config.vision_backend {
        VisionBackendKind::Vertex => Arc::new(VertexVisionBackend::new(
            &config.project_id,
            &config.location,
            config.vision_model.clone(),
            credentials,
        )),
        VisionBackendKind::Ollama => {
            info!(base = %config.ollama_base, "Using Ollama vision backend");
            Arc::new(OllamaVisionBackend::new(
                config.ollama_base.clone(),
                config.vision_model.clone(),
            ))
        }
    }
}

/// The in-memory limiter comes with its sweep task; Redis expires keys itself.
async fn rate_limiter(
    config: &AppConfig,
) -> (Arc<dyn RateLimiter>, Option<tokio::task::JoinHandle<()>>) {
    if config.rate_limit_backend == RateLimitBackend::Redis {
        match RedisSlidingWindowLimiter::connect(&config.redis_url).await {
            Ok(limiter) => return (Arc::new(limiter), None),
            Err(e) => warn!("Failed to connect to Redis, using in-memory rate limits: {}", e),
        }
    }
    let limiter = Arc::new(SlidingWindowLimiter::default());
    let sweeper = limiter
        .clone()
        .spawn_sweeper(Duration::from_secs(RATE_LIMIT_SWEEP_SECS));
    (limiter, Some(sweeper))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
