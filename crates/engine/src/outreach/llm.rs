use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use prospect_common::config::AiConfig;
use prospect_common::types::SourceId;

use crate::rate_limit::SourceRateLimiter;

use super::{anthropic, openai};

/// Errors from the AI backend.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI HTTP error: {0}")]
    Http(String),

    #[error("AI auth error: {0}")]
    Auth(String),

    #[error("AI rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Model-level rejection. Never retried.
    #[error("AI request rejected: {0}")]
    Rejected(String),

    #[error("AI response parse error: {0}")]
    Parse(String),
}

impl AiError {
    fn is_non_retryable(&self) -> bool {
        matches!(self, AiError::Auth(_) | AiError::Rejected(_))
    }
}

/// Text-completion capability consumed by the outreach generator.
/// Object-safe so tests can substitute a mock.
pub trait AiBackend: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>>;

    /// Cheap availability probe; false skips the AI path entirely.
    fn healthy(&self) -> bool {
        true
    }
}

/// Provider-dispatch AI client. Calls pace through the shared rate
/// limiter under the "ai" source id.
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
    api_key: String,
    limiter: Arc<SourceRateLimiter>,
}

/// Initial attempt plus two retries on transient network failures.
const MAX_ATTEMPTS: u32 = 3;

impl AiClient {
    /// Reads the API key from the env var named in config (falling back
    /// to the provider's standard variable). None when the key is
    /// missing: the generator then always uses templates.
    pub fn new(config: AiConfig, limiter: Arc<SourceRateLimiter>) -> Option<Self> {
        let env_var = match config.credential.as_deref() {
            Some(var) => var.to_string(),
            None => match config.provider.as_str() {
                "anthropic" => "ANTHROPIC_API_KEY".to_string(),
                "openai" => "OPENAI_API_KEY".to_string(),
                other => {
                    tracing::warn!(provider = other, "Unknown AI provider");
                    return None;
                }
            },
        };

        let api_key = match std::env::var(&env_var) {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::info!(
                    env_var = env_var.as_str(),
                    provider = config.provider.as_str(),
                    "AI credential not set, backend disabled"
                );
                return None;
            }
        };

        Some(Self {
            http: reqwest::Client::new(),
            config,
            api_key,
            limiter,
        })
    }

    fn max_tokens(&self) -> u32 {
        ((self.config.max_output_chars / 3) as u32).clamp(256, 4096)
    }

    async fn generate_inner(&self, prompt: &str) -> Result<String, AiError> {
        let mut backoff = Duration::from_millis(500);

        for attempt in 1..=MAX_ATTEMPTS {
            self.limiter.acquire(SourceId::Ai).await;
            let result = self.send_once(prompt).await;

            match result {
                Ok(text) => {
                    metrics::counter!("ai.requests.ok", "provider" => self.config.provider.clone())
                        .increment(1);
                    return Ok(text);
                }
                Err(e) if e.is_non_retryable() => {
                    metrics::counter!("ai.requests.errors", "provider" => self.config.provider.clone())
                        .increment(1);
                    return Err(e);
                }
                Err(AiError::RateLimited { retry_after }) => {
                    self.limiter
                        .report_throttle(SourceId::Ai, retry_after.map(Duration::from_secs))
                        .await;
                    if attempt == MAX_ATTEMPTS {
                        return Err(AiError::RateLimited { retry_after });
                    }
                    // The next acquire serves the prescribed delay.
                }
                Err(e) => {
                    if attempt == MAX_ATTEMPTS {
                        metrics::counter!("ai.requests.errors", "provider" => self.config.provider.clone())
                            .increment(1);
                        return Err(e);
                    }
                    tracing::warn!(attempt, error = %e, "AI call failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
        unreachable!("retry loop always returns")
    }

    async fn send_once(&self, prompt: &str) -> Result<String, AiError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match self.config.provider.as_str() {
            "anthropic" => {
                anthropic::complete(
                    &self.http,
                    &self.api_key,
                    &self.config.model,
                    self.max_tokens(),
                    timeout,
                    prompt,
                )
                .await
            }
            "openai" => {
                openai::complete(
                    &self.http,
                    &self.api_key,
                    &self.config.model,
                    self.max_tokens(),
                    timeout,
                    prompt,
                )
                .await
            }
            other => Err(AiError::Rejected(format!("unknown provider: {other}"))),
        }
    }
}

impl AiBackend for AiClient {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
        Box::pin(self.generate_inner(prompt))
    }
}
