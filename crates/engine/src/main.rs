use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;

use prospect_engine::server::{
    health_handler, metrics_handler, source_candidates_handler, AppState,
};
use prospect_engine::Engine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Prospect engine starting");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    // PROSPECT_CONFIG points at engine.toml; unset means defaults.
    let config_path = std::env::var("PROSPECT_CONFIG").ok().map(PathBuf::from);
    let config = match prospect_engine::config::load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start on invalid configuration");
            std::process::exit(1);
        }
    };

    let engine = match Engine::from_config(config).await {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!(error = %e, "Failed to assemble engine");
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        engine,
        metrics_handle,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/source-candidates", post(source_candidates_handler))
        .with_state(state);

    let port: u16 = std::env::var("PROSPECT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!(port = port, "Prospect engine listening");

    axum::serve(listener, app).await.expect("HTTP server error");
}
