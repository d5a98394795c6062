mod codehost;
mod demo;
mod health;
mod microblog;
mod professional;
mod website;

pub use codehost::CodeHostSource;
pub use demo::demo_records;
pub use health::{SourceHealthRegistry, SourceStatus};
pub use microblog::MicroblogSource;
pub use professional::ProfessionalSource;
pub use website::WebsiteSource;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use prospect_common::config::SourceConfig;
use prospect_common::types::{failure_reason, JobSpec, PartialFailure, RawRecord, SourceId};

use crate::cache::{source_query_key, CacheStore};
use crate::rate_limit::SourceRateLimiter;

/// Retry budget per external call, on top of the initial attempt.
pub const MAX_RETRIES: u32 = 3;

/// Per-request transport timeout. The orchestrator applies the
/// per-source discovery timeout on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const RETRY_BACKOFF_INITIAL: Duration = Duration::from_millis(500);

/// What one adapter produced for a job: zero or more raw records plus at
/// most one structured failure. No error type escapes this boundary.
#[derive(Debug, Default)]
pub struct SourceYield {
    pub records: Vec<RawRecord>,
    pub failure: Option<PartialFailure>,
}

impl SourceYield {
    pub fn records(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    pub fn failed(source: SourceId, reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(PartialFailure::new(source, reason)),
        }
    }
}

/// A provider of raw candidate records. Object-safe; adapters are held
/// as trait objects by the orchestrator.
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Yield a finite batch of raw records for the spec. Must not fail:
    /// permanent problems surface as `SourceYield::failure`.
    fn discover<'a>(
        &'a self,
        spec: &'a JobSpec,
    ) -> Pin<Box<dyn Future<Output = SourceYield> + Send + 'a>>;
}

/// Shared plumbing handed to every adapter: HTTP client, cache, pacing,
/// health reporting, and the process-wide in-flight cap.
pub struct SourceContext {
    pub http: reqwest::Client,
    pub cache: Arc<dyn CacheStore>,
    pub limiter: Arc<SourceRateLimiter>,
    pub health: Arc<SourceHealthRegistry>,
    pub global_in_flight: Arc<Semaphore>,
    pub cache_ttl: Duration,
}

impl SourceContext {
    /// Consult the query cache for a previous run of this fingerprint.
    pub async fn cached_records(
        &self,
        source: SourceId,
        fingerprint: &str,
    ) -> Option<Vec<RawRecord>> {
        let key = source_query_key(source, fingerprint);
        let raw = self.cache.get(&key).await?;
        match serde_json::from_str(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                tracing::warn!(source = source.as_str(), error = %e, "Dropping corrupt cache entry");
                self.cache.invalidate(&key).await;
                None
            }
        }
    }

    pub async fn store_records(&self, source: SourceId, fingerprint: &str, records: &[RawRecord]) {
        if let Ok(serialized) = serde_json::to_string(records) {
            let key = source_query_key(source, fingerprint);
            self.cache.put(&key, serialized, self.cache_ttl).await;
        }
    }

    /// Rate-limited GET with the shared retry ladder:
    /// 429 → report_throttle (retry-after honored) and retry, 5xx and
    /// transport errors → exponential backoff and retry, auth failures
    /// and other 4xx → permanent. Success and permanent outcomes feed
    /// the health registry.
    pub async fn fetch_json(
        &self,
        source: SourceId,
        config: &SourceConfig,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, PartialFailure> {
        let credential = read_credential(config);
        let mut backoff = RETRY_BACKOFF_INITIAL;

        for attempt in 0..=MAX_RETRIES {
            // Pacing first: a throttled source suspends here.
            self.limiter.acquire(source).await;
            let _global = self.global_in_flight.acquire().await.ok();

            let mut request = self
                .http
                .get(url)
                .query(query)
                .timeout(REQUEST_TIMEOUT);
            if let Some(token) = &credential {
                request = request.bearer_auth(token);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    // without_url: failure reasons must not leak endpoints.
                    if attempt == MAX_RETRIES {
                        self.health.record_unavailable(source);
                        return Err(transport_failure(source, &e.without_url().to_string()));
                    }
                    tracing::warn!(
                        source = source.as_str(),
                        attempt,
                        "Transport error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    continue;
                }
            };

            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                self.limiter.report_throttle(source, retry_after).await;
                self.health.record_throttled(source);
                if attempt == MAX_RETRIES {
                    return Err(PartialFailure::new(source, failure_reason::THROTTLED));
                }
                // The next acquire serves the prescribed delay.
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                self.health.record_unavailable(source);
                return Err(PartialFailure::new(source, failure_reason::CREDENTIAL));
            }

            if status.is_server_error() {
                if attempt == MAX_RETRIES {
                    self.health.record_unavailable(source);
                    return Err(PartialFailure::new(
                        source,
                        format!("{}: {}", failure_reason::UPSTREAM_5XX, status.as_u16()),
                    ));
                }
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            if !status.is_success() {
                self.health.record_unavailable(source);
                return Err(transport_failure(
                    source,
                    &format!("status {}", status.as_u16()),
                ));
            }

            match response.json::<serde_json::Value>().await {
                Ok(body) => {
                    self.health.record_success(source);
                    metrics::counter!("source.fetch.ok", "source" => source.as_str())
                        .increment(1);
                    return Ok(body);
                }
                Err(e) => {
                    self.health.record_unavailable(source);
                    return Err(transport_failure(source, &format!("bad body: {e}")));
                }
            }
        }

        unreachable!("retry loop always returns");
    }
}

/// Resolve the credential env var named in config. The value never
/// appears in logs or failure reasons.
fn read_credential(config: &SourceConfig) -> Option<String> {
    let var = config.credential.as_deref()?;
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn transport_failure(source: SourceId, detail: &str) -> PartialFailure {
    metrics::counter!("source.fetch.errors", "source" => source.as_str()).increment(1);
    PartialFailure::new(source, format!("{}: {}", failure_reason::TRANSPORT, detail))
}

/// Join the query terms a search-style source cares about.
pub(crate) fn search_terms(spec: &JobSpec) -> String {
    let mut terms = vec![spec.title.trim().to_string()];
    terms.extend(spec.required_skills.iter().map(|s| s.trim().to_string()));
    terms.retain(|t| !t.is_empty());
    terms.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_terms_joins_title_and_skills() {
        let spec = JobSpec {
            id: "j".into(),
            title: "ML Engineer".into(),
            company: "Acme".into(),
            description: String::new(),
            highlights: vec![],
            required_skills: vec!["pytorch".into(), " python ".into()],
            preferred_skills: vec![],
            location_preferences: vec![],
            seniority_hint: Default::default(),
            rubric_weights: None,
            max_candidates: 5,
            include_outreach: false,
        };
        assert_eq!(search_terms(&spec), "ML Engineer pytorch python");
    }
}
