use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use providers::SourceCache;
use providers::extractor::default_client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::handlers;

pub struct AppState {
    pub http: reqwest::Client,
    pub config: ServerConfig,
    pub cache: SourceCache,
    pub proxy: playlist::ProxyUrls,
    pub pipeline: segio::PipelineConfig,
}

pub type SharedState = Arc<AppState>;

pub fn build_state(config: ServerConfig) -> SharedState {
    let proxy = playlist::ProxyUrls::new(config.public_base_url.clone());
    let pipeline = config.pipeline_config();
    Arc::new(AppState {
        http: default_client(),
        config,
        cache: SourceCache::new(),
        proxy,
        pipeline,
    })
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/stream", get(handlers::stream::stream))
        .route("/proxy/manifest", get(handlers::proxy::manifest))
        .route("/proxy/segment", get(handlers::proxy::segment))
        .route("/download", get(handlers::download::download))
        .route("/vibix/parse", post(handlers::vibix::parse))
        .route("/addons/stream", get(handlers::addons::stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let bind = config.bind;
    let state = build_state(config);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "shutdown signal unavailable");
        return;
    }
    info!("shutdown signal received");
}
