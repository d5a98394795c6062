use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use prospect_common::types::{JobResult, JobSpec, SourceId};
use prospect_common::EngineError;

use crate::engine::Engine;
use crate::sources::SourceStatus;

/// Shared HTTP state.
pub struct AppState {
    pub engine: Arc<Engine>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// POST /source-candidates — run one sourcing job synchronously.
///
/// 200 with the JobResult (partial failures included), 400 on an
/// invalid spec, 503 when the engine cannot admit more work.
pub async fn source_candidates_handler(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<JobSpec>,
) -> Result<Json<JobResult>, (StatusCode, String)> {
    match state.engine.run_job(spec).await {
        Ok(result) => Ok(Json(result)),
        Err(e @ EngineError::Validation(_)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(e @ EngineError::Busy(_)) => Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, "Job failed to start");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: BTreeMap<SourceId, SourceStatus>,
}

/// GET /health — overall and per-source status.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, sources) = state.engine.health_snapshot();
    Json(HealthResponse { status, sources })
}

/// GET /metrics — Prometheus exposition text.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
