mod analysis;
mod config;
mod errors;
mod nlp;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::registry::{spawn_eviction_sweep, JobRegistry};
use crate::config::Config;
use crate::nlp::EngineHandle;
use crate::routes::build_router;
use crate::state::AppState;

const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vellum API v{}", env!("CARGO_PKG_VERSION"));

    // Job registry plus its periodic eviction sweep
    let registry = Arc::new(JobRegistry::new(
        config.subscriber_buffer,
        Duration::from_secs(config.job_ttl_secs),
    ));
    spawn_eviction_sweep(&registry, EVICTION_SWEEP_INTERVAL);
    info!(
        "Job registry initialized (completed-job TTL: {}s)",
        config.job_ttl_secs
    );

    // NLP engines are built lazily on first use and shared by all jobs
    let engines = Arc::new(EngineHandle::new(
        config.inference_api_base.clone(),
        config.inference_api_token.clone(),
    ));
    info!(
        "NLP engine handle initialized (inference base: {})",
        config.inference_api_base
    );

    // Build app state
    let state = AppState {
        registry,
        engines,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
