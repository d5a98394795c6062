//! Live-adapter tests against a local upstream that throttles.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use prospect_common::config::EngineConfig;
use prospect_common::types::{JobSpec, SeniorityHint};

use prospect_engine::Engine;

/// First call answers 429 with Retry-After: 2, then results.
async fn search_handler(State(hits): State<Arc<AtomicU32>>) -> axum::response::Response {
    let hit = hits.fetch_add(1, Ordering::SeqCst);
    if hit == 0 {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", "2")],
            "slow down",
        )
            .into_response()
    } else {
        Json(json!({
            "results": [{
                "name": "Sarah Chen",
                "headline": "Senior ML Engineer at Google",
                "location": "San Francisco, CA, USA",
                "profile_url": "https://profiles.example.com/in/sarah-chen",
                "skills": ["PyTorch", "Python", "TensorFlow"],
                "experience": [
                    {"title": "Senior ML Engineer", "company": "Google", "start": "2021-03", "end": "present"}
                ],
                "education": [{"degree": "MS", "school": "Stanford University", "year": 2018}]
            }]
        }))
        .into_response()
    }
}

async fn spawn_upstream() -> (SocketAddr, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    let app = Router::new()
        .route("/v1/people/search", get(search_handler))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn live_profiles_config(addr: SocketAddr) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.sources.profiles.demo_mode = false;
    config.sources.profiles.base_url = format!("http://{addr}");
    config.sources.profiles.requests_per_window = 100;
    config.sources.profiles.window_seconds = 1;
    config.sources.code_host.enabled = false;
    config.sources.microblog.enabled = false;
    config.sources.website.enabled = false;
    config
}

fn spec() -> JobSpec {
    JobSpec {
        id: "job-429".into(),
        title: "ML Engineer".into(),
        company: "Acme AI".into(),
        description: String::new(),
        highlights: vec![],
        required_skills: vec!["PyTorch".into()],
        preferred_skills: vec![],
        location_preferences: vec![],
        seniority_hint: SeniorityHint::Senior,
        rubric_weights: None,
        max_candidates: 5,
        include_outreach: false,
    }
}

/// Upstream 429 with retry_after = 2: the adapter waits at least that
/// long, retries, and the job completes with the record and no partial
/// failures.
#[tokio::test]
async fn test_upstream_429_is_retried_after_prescribed_delay() {
    let (addr, hits) = spawn_upstream().await;
    let engine = Engine::from_config(live_profiles_config(addr)).await.unwrap();

    let started = std::time::Instant::now();
    let result = engine.run_job(spec()).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2), "retried too early: {elapsed:?}");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(result.partial_failures.is_empty());
    assert_eq!(result.candidates_found, 1);
    assert_eq!(result.top_candidates[0].candidate.name, "Sarah Chen");
}

/// A second identical job is served from the query cache: no further
/// upstream calls.
#[tokio::test]
async fn test_repeat_query_served_from_cache() {
    let (addr, hits) = spawn_upstream().await;
    let engine = Engine::from_config(live_profiles_config(addr))
        .await
        .unwrap();

    // First run absorbs the 429 + retry and populates the query cache.
    let first = engine.run_job(spec()).await.unwrap();
    assert_eq!(first.candidates_found, 1);
    let upstream_calls = hits.load(Ordering::SeqCst);

    let mut second_spec = spec();
    second_spec.id = "job-429-again".into();
    let second = engine.run_job(second_spec).await.unwrap();
    assert_eq!(second.candidates_found, 1);
    assert_eq!(hits.load(Ordering::SeqCst), upstream_calls);
}
