use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::Instrument;

use prospect_common::config::EngineConfig;
use prospect_common::types::{JobResult, JobSpec, SourceId};
use prospect_common::{EngineError, Result};

use crate::cache::{build_cache, CacheStore};
use crate::normalize::Normalizer;
use crate::orchestrator::JobRun;
use crate::outreach::OutreachGenerator;
use crate::rate_limit::{BackoffPolicy, SourceRateLimiter};
use crate::score::FitScorer;
use crate::sources::{
    CodeHostSource, MicroblogSource, ProfessionalSource, SourceAdapter, SourceContext,
    SourceHealthRegistry, SourceStatus, WebsiteSource,
};

/// The sourcing pipeline engine.
///
/// All collaborators are construction-time dependencies; the engine
/// itself is stateless across jobs. The rate limiter and cache are the
/// only process-wide shared components.
pub struct Engine {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) cache: Arc<dyn CacheStore>,
    pub(crate) adapters: Vec<Arc<dyn SourceAdapter>>,
    pub(crate) normalizer: Arc<Normalizer>,
    pub(crate) scorer: Arc<FitScorer>,
    pub(crate) outreach: Arc<OutreachGenerator>,
    pub(crate) health: Arc<SourceHealthRegistry>,
    admission: Arc<Semaphore>,
}

impl Engine {
    /// Build the full engine from configuration: cache backing, rate
    /// limiter, the enabled source adapters, and the outreach generator.
    pub async fn from_config(config: EngineConfig) -> Result<Self> {
        let cache = build_cache(&config.cache).await?;
        let limiter = Arc::new(SourceRateLimiter::new(
            &config.sources,
            BackoffPolicy::default(),
        ));
        let health = Arc::new(SourceHealthRegistry::new());
        let http = reqwest::Client::builder()
            .user_agent("prospect-engine/0.1")
            .build()
            .map_err(|e| EngineError::Internal(format!("http client: {e}")))?;

        let ctx = Arc::new(SourceContext {
            http,
            cache: Arc::clone(&cache),
            limiter: Arc::clone(&limiter),
            health: Arc::clone(&health),
            global_in_flight: Arc::new(Semaphore::new(
                config.orchestrator.global_max_in_flight.max(1),
            )),
            cache_ttl: Duration::from_secs(config.cache.default_ttl_s.max(1)),
        });

        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        if config.sources.profiles.enabled {
            adapters.push(Arc::new(ProfessionalSource::new(
                Arc::clone(&ctx),
                config.sources.profiles.clone(),
            )));
        }
        if config.sources.code_host.enabled {
            adapters.push(Arc::new(CodeHostSource::new(
                Arc::clone(&ctx),
                config.sources.code_host.clone(),
            )));
        }
        if config.sources.microblog.enabled {
            adapters.push(Arc::new(MicroblogSource::new(
                Arc::clone(&ctx),
                config.sources.microblog.clone(),
            )));
        }
        if config.sources.website.enabled {
            adapters.push(Arc::new(WebsiteSource::new(
                Arc::clone(&ctx),
                config.sources.website.clone(),
            )));
        }

        let outreach = Arc::new(OutreachGenerator::from_config(&config.ai, limiter));

        tracing::info!(
            adapters = adapters.len(),
            cache = ?config.cache.kind,
            "Engine assembled"
        );
        Ok(Self::assemble(config, cache, adapters, outreach, health))
    }

    /// Explicit parts, used by tests to inject mock adapters and
    /// backends.
    pub fn with_parts(
        config: EngineConfig,
        cache: Arc<dyn CacheStore>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        outreach: Arc<OutreachGenerator>,
        health: Arc<SourceHealthRegistry>,
    ) -> Self {
        Self::assemble(config, cache, adapters, outreach, health)
    }

    fn assemble(
        config: EngineConfig,
        cache: Arc<dyn CacheStore>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        outreach: Arc<OutreachGenerator>,
        health: Arc<SourceHealthRegistry>,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(config.orchestrator.global_max_in_flight.max(1)));
        let normalizer = Arc::new(Normalizer::new(config.scoring.skill_vocabulary.clone()));
        let scorer = Arc::new(FitScorer::new(config.scoring.clone()));
        Self {
            config: Arc::new(config),
            cache,
            adapters,
            normalizer,
            scorer,
            outreach,
            health,
            admission,
        }
    }

    /// Run one job to completion. Single-source problems land in
    /// `partial_failures`, never here; errors are reserved for invalid
    /// specs and admission.
    pub async fn run_job(&self, spec: JobSpec) -> Result<JobResult> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_job_with_cancel(spec, cancel_rx).await
    }

    /// Like `run_job`, but cooperatively cancellable: flip the watch to
    /// true and the job returns its partial results within the grace
    /// bound.
    pub async fn run_job_with_cancel(
        &self,
        spec: JobSpec,
        cancel: watch::Receiver<bool>,
    ) -> Result<JobResult> {
        spec.validate()?;

        let _permit = match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                metrics::counter!("jobs.rejected_busy").increment(1);
                return Err(EngineError::Busy(
                    "concurrency caps exhausted at admission".into(),
                ));
            }
        };

        let span = tracing::info_span!("job", job_id = %spec.id);
        JobRun::new(self, spec, cancel).run().instrument(span).await
    }

    /// Health view for the HTTP surface: overall status plus per-source
    /// states for the configured adapters.
    pub fn health_snapshot(&self) -> (&'static str, BTreeMap<SourceId, SourceStatus>) {
        let sources: Vec<SourceId> = self.adapters.iter().map(|a| a.source_id()).collect();
        (
            self.health.overall(&sources),
            self.health.snapshot(&sources),
        )
    }
}
