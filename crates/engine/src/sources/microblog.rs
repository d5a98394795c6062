use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;

use prospect_common::config::SourceConfig;
use prospect_common::types::{JobSpec, RawRecord, SourceId};

use super::{demo, search_terms, SourceAdapter, SourceContext, SourceYield};

const RESULT_LIMIT: u32 = 20;

/// Short-form public posts profile search. Bios double as headlines and
/// follower/post counts ride along as enrichment.
pub struct MicroblogSource {
    ctx: Arc<SourceContext>,
    config: SourceConfig,
    in_flight: Semaphore,
}

impl MicroblogSource {
    pub fn new(ctx: Arc<SourceContext>, config: SourceConfig) -> Self {
        let permits = config.max_in_flight.max(1) as usize;
        Self {
            ctx,
            config,
            in_flight: Semaphore::new(permits),
        }
    }

    async fn discover_inner(&self, spec: &JobSpec) -> SourceYield {
        let source = SourceId::Microblog;

        if self.config.demo_mode {
            return SourceYield::records(demo::demo_records(source, spec));
        }

        let fingerprint = spec.fingerprint();
        if let Some(records) = self.ctx.cached_records(source, &fingerprint).await {
            return SourceYield::records(records);
        }

        let _permit = self.in_flight.acquire().await.ok();
        let url = format!(
            "{}/v1/accounts/search",
            self.config.base_url.trim_end_matches('/')
        );
        let query = [
            ("query", search_terms(spec)),
            ("limit", RESULT_LIMIT.to_string()),
        ];

        let body = match self.ctx.fetch_json(source, &self.config, &url, &query).await {
            Ok(body) => body,
            Err(failure) => {
                return SourceYield {
                    records: Vec::new(),
                    failure: Some(failure),
                }
            }
        };

        let records: Vec<RawRecord> = body
            .get("accounts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .cloned()
            .map(|payload| RawRecord::new(source, payload))
            .collect();

        tracing::debug!(count = records.len(), "Microblog search complete");
        self.ctx.store_records(source, &fingerprint, &records).await;
        SourceYield::records(records)
    }
}

impl SourceAdapter for MicroblogSource {
    fn source_id(&self) -> SourceId {
        SourceId::Microblog
    }

    fn discover<'a>(
        &'a self,
        spec: &'a JobSpec,
    ) -> Pin<Box<dyn Future<Output = SourceYield> + Send + 'a>> {
        Box::pin(self.discover_inner(spec))
    }
}
