use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

use prospect_common::types::{
    failure_reason, Candidate, JobPhase, JobResult, JobSpec, OutreachMessage, PartialFailure,
    ScoredCandidate, SourceId,
};
use prospect_common::Result;

use crate::cache::{score_key, CacheStore};
use crate::engine::Engine;
use crate::merge::merge_candidates;
use crate::normalize::Normalizer;
use crate::outreach::OutreachGenerator;
use crate::score::FitScorer;
use crate::sources::{SourceAdapter, SourceYield};

/// Per-source discovery budget, clamped to the remaining job budget.
const SOURCE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One job's pipeline: Pending → Discovering → Normalizing → Merging →
/// Scoring → Ranking → Generating → Completed. All per-job state lives
/// here and is dropped when the JobResult is returned.
pub(crate) struct JobRun {
    spec: JobSpec,
    cancel: watch::Receiver<bool>,
    phase: JobPhase,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    normalizer: Arc<Normalizer>,
    scorer: Arc<FitScorer>,
    outreach: Arc<OutreachGenerator>,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
    job_timeout: Duration,
    outreach_concurrency: usize,
}

impl JobRun {
    pub(crate) fn new(engine: &Engine, spec: JobSpec, cancel: watch::Receiver<bool>) -> Self {
        Self {
            spec,
            cancel,
            phase: JobPhase::Pending,
            adapters: engine.adapters.clone(),
            normalizer: Arc::clone(&engine.normalizer),
            scorer: Arc::clone(&engine.scorer),
            outreach: Arc::clone(&engine.outreach),
            cache: Arc::clone(&engine.cache),
            cache_ttl: Duration::from_secs(engine.config.cache.default_ttl_s.max(1)),
            job_timeout: Duration::from_secs(engine.config.orchestrator.job_timeout_s.max(1)),
            outreach_concurrency: engine.config.orchestrator.outreach_concurrency.max(1),
        }
    }

    fn set_phase(&mut self, phase: JobPhase) {
        tracing::debug!(
            from = self.phase.as_str(),
            to = phase.as_str(),
            "Job phase transition"
        );
        metrics::counter!("jobs.phase", "phase" => phase.as_str()).increment(1);
        self.phase = phase;
    }

    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub(crate) async fn run(mut self) -> Result<JobResult> {
        let started = std::time::Instant::now();
        let deadline = tokio::time::Instant::now() + self.job_timeout;
        metrics::counter!("jobs.started").increment(1);

        // Fan out to every configured source concurrently.
        self.set_phase(JobPhase::Discovering);
        let (tx, mut rx) = mpsc::unbounded_channel::<SourceYield>();
        let mut fetchers: Vec<JoinHandle<()>> = Vec::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let spec = self.spec.clone();
            let tx = tx.clone();
            let cancel = self.cancel.clone();
            let budget = SOURCE_FETCH_TIMEOUT
                .min(deadline.saturating_duration_since(tokio::time::Instant::now()));

            fetchers.push(tokio::spawn(async move {
                let source = adapter.source_id();
                let yielded = tokio::select! {
                    result = tokio::time::timeout(budget, adapter.discover(&spec)) => match result {
                        Ok(yielded) => yielded,
                        Err(_) => {
                            tracing::warn!(source = source.as_str(), "Source discovery timed out");
                            SourceYield::failed(source, failure_reason::TIMEOUT)
                        }
                    },
                    _ = cancelled_signal(cancel) => {
                        SourceYield::failed(source, failure_reason::CANCELLED)
                    }
                };
                let _ = tx.send(yielded);
            }));
        }
        drop(tx);

        // Records are normalized as they arrive; staging is keyed later
        // by identity in the merger, so arrival order does not matter.
        self.set_phase(JobPhase::Normalizing);
        let mut staged: Vec<Candidate> = Vec::new();
        let mut failures: Vec<PartialFailure> = Vec::new();
        let mut drops: BTreeMap<SourceId, u32> = BTreeMap::new();
        while let Some(yielded) = rx.recv().await {
            if let Some(failure) = yielded.failure {
                tracing::warn!(
                    source = failure.source.as_str(),
                    reason = failure.reason.as_str(),
                    "Source contributed a partial failure"
                );
                failures.push(failure);
            }
            for record in yielded.records {
                match self.normalizer.normalize(&record) {
                    Ok(candidate) => staged.push(candidate),
                    Err(e) => {
                        tracing::debug!(
                            source = record.source.as_str(),
                            error = %e,
                            "Dropping unparseable record"
                        );
                        *drops.entry(record.source).or_default() += 1;
                    }
                }
            }
        }
        for fetcher in fetchers {
            let _ = fetcher.await;
        }
        for (source, count) in drops {
            failures.push(PartialFailure::new(
                source,
                format!("{}: {count} records", failure_reason::UNPARSEABLE),
            ));
        }

        self.set_phase(JobPhase::Merging);
        let merged = merge_candidates(staged);
        let candidates_found = merged.len();

        // CPU-light; sequential keeps it deterministic.
        self.set_phase(JobPhase::Scoring);
        let job_fingerprint = self.spec.fingerprint();
        let mut scored: Vec<ScoredCandidate> = Vec::with_capacity(merged.len());
        for candidate in &merged {
            scored.push(self.score_with_cache(candidate, &job_fingerprint).await);
        }

        self.set_phase(JobPhase::Ranking);
        scored.sort_by(|a, b| a.ranking_cmp(b));
        scored.truncate(self.spec.max_candidates);

        let mut messages = None;
        if self.spec.include_outreach && !scored.is_empty() {
            self.set_phase(JobPhase::Generating);
            if self.cancelled() {
                failures.push(PartialFailure::new(SourceId::Ai, failure_reason::CANCELLED));
            } else if tokio::time::Instant::now() >= deadline {
                failures.push(PartialFailure::new(
                    SourceId::Ai,
                    format!("{}: job budget exhausted", failure_reason::TIMEOUT),
                ));
            } else {
                messages =
                    Some(self.generate_messages(&scored, deadline, &mut failures).await);
            }
        }

        self.set_phase(JobPhase::Completed);
        let processing_time_ms = started.elapsed().as_millis() as u64;
        metrics::counter!("jobs.completed").increment(1);
        metrics::histogram!("jobs.duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            job_id = self.spec.id.as_str(),
            candidates_found,
            returned = scored.len(),
            partial_failures = failures.len(),
            elapsed_ms = processing_time_ms,
            "Job completed"
        );

        Ok(JobResult {
            job_id: self.spec.id.clone(),
            candidates_found,
            top_candidates: scored,
            messages,
            processing_time_ms,
            partial_failures: failures,
        })
    }

    /// Score with a `score:<identity>:job:<hash>` cache in front, so
    /// repeated jobs over the same spec skip recomputation.
    async fn score_with_cache(
        &self,
        candidate: &Candidate,
        job_fingerprint: &str,
    ) -> ScoredCandidate {
        let key = score_key(&candidate.identity_key, job_fingerprint);
        if let Some(raw) = self.cache.get(&key).await {
            match serde_json::from_str::<ScoredCandidate>(&raw) {
                Ok(cached) => return cached,
                Err(_) => self.cache.invalidate(&key).await,
            }
        }

        let scored = self.scorer.score(candidate, &self.spec);
        if let Ok(serialized) = serde_json::to_string(&scored) {
            self.cache.put(&key, serialized, self.cache_ttl).await;
        }
        scored
    }

    /// Bounded outreach fan-out. Message order follows candidate rank.
    async fn generate_messages(
        &self,
        scored: &[ScoredCandidate],
        deadline: tokio::time::Instant,
        failures: &mut Vec<PartialFailure>,
    ) -> Vec<OutreachMessage> {
        let semaphore = Arc::new(Semaphore::new(self.outreach_concurrency));
        let mut handles: Vec<JoinHandle<Option<(usize, OutreachMessage)>>> =
            Vec::with_capacity(scored.len());

        for (index, candidate) in scored.iter().enumerate() {
            let outreach = Arc::clone(&self.outreach);
            let spec = self.spec.clone();
            let candidate = candidate.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok()?;
                if *cancel.borrow() {
                    return None;
                }
                let budget = deadline.saturating_duration_since(tokio::time::Instant::now());
                tokio::select! {
                    result = tokio::time::timeout(budget, outreach.generate(&candidate, &spec)) => {
                        result.ok().map(|message| (index, message))
                    }
                    _ = cancelled_signal(cancel) => None,
                }
            }));
        }

        let mut indexed = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(Some(pair)) = handle.await {
                indexed.push(pair);
            }
        }

        if indexed.len() < scored.len() {
            let reason = if self.cancelled() {
                failure_reason::CANCELLED.to_string()
            } else {
                format!("{}: outreach budget exhausted", failure_reason::TIMEOUT)
            };
            failures.push(PartialFailure::new(SourceId::Ai, reason));
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, message)| message).collect()
    }
}

/// Resolves when the cancel flag flips to true. A dropped sender means
/// the caller cannot cancel anymore; that is not a cancellation.
async fn cancelled_signal(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
