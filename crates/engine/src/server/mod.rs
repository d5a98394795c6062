mod routes;

pub use routes::{
    health_handler, metrics_handler, source_candidates_handler, AppState, HealthResponse,
};
