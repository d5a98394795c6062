use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use scraper::{Html, Selector};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use prospect_common::config::SourceConfig;
use prospect_common::types::{JobSpec, RawRecord, SourceId};

use super::{demo, search_terms, SourceAdapter, SourceContext, SourceYield};

/// How many search hits to follow up with a page fetch.
const MAX_PAGES: usize = 3;

const PAGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Best-effort discovery of independent personal sites: a web search for
/// portfolio/blog pages, then a metadata extraction pass over the top
/// hits. Page-level failures are skipped silently; only a failed search
/// is reported.
pub struct WebsiteSource {
    ctx: Arc<SourceContext>,
    config: SourceConfig,
    in_flight: Semaphore,
}

impl WebsiteSource {
    pub fn new(ctx: Arc<SourceContext>, config: SourceConfig) -> Self {
        let permits = config.max_in_flight.max(1) as usize;
        Self {
            ctx,
            config,
            in_flight: Semaphore::new(permits),
        }
    }

    async fn discover_inner(&self, spec: &JobSpec) -> SourceYield {
        let source = SourceId::Website;

        if self.config.demo_mode {
            return SourceYield::records(demo::demo_records(source, spec));
        }

        let fingerprint = spec.fingerprint();
        if let Some(records) = self.ctx.cached_records(source, &fingerprint).await {
            return SourceYield::records(records);
        }

        let _permit = self.in_flight.acquire().await.ok();
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let query = [
            ("q", format!("{} portfolio blog", search_terms(spec))),
            ("format", "json".to_string()),
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

        let hits: Vec<String> = body
            .get("results")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|r| r.get("url").and_then(Value::as_str))
            .map(String::from)
            .take(MAX_PAGES)
            .collect();

        let mut records = Vec::new();
        for page_url in hits {
            match self.fetch_page(source, &page_url).await {
                Some(html) => {
                    if let Some(payload) = extract_site_profile(&html, &page_url) {
                        records.push(RawRecord::new(source, payload));
                    }
                }
                None => continue,
            }
        }

        tracing::debug!(count = records.len(), "Website discovery complete");
        self.ctx.store_records(source, &fingerprint, &records).await;
        SourceYield::records(records)
    }

    /// Single-attempt page fetch under the same pacing as the search.
    async fn fetch_page(&self, source: SourceId, url: &str) -> Option<String> {
        self.ctx.limiter.acquire(source).await;
        let _global = self.ctx.global_in_flight.acquire().await.ok();

        let response = self
            .ctx
            .http
            .get(url)
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .ok()?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.ctx.limiter.report_throttle(source, None).await;
            return None;
        }
        if !response.status().is_success() {
            return None;
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("text/html"));
        if !is_html {
            return None;
        }

        response.text().await.ok()
    }
}

/// Pull author/title/description/keywords out of a page head. Returns
/// None when there is no usable author signal.
fn extract_site_profile(html: &str, url: &str) -> Option<Value> {
    let document = Html::parse_document(html);

    let select_meta = |name: &str| -> Option<String> {
        let selector = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    });

    let author = select_meta("author").or_else(|| {
        // "Jane Doe — personal site" style titles carry the name.
        title
            .as_deref()
            .and_then(|t| t.split(['—', '|', '-']).next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s.split_whitespace().count() <= 4)
    })?;

    let topics: Vec<String> = select_meta("keywords")
        .map(|kw| {
            kw.split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(json!({
        "url": url,
        "title": title,
        "author": author,
        "description": select_meta("description"),
        "topics": topics,
    }))
}

impl SourceAdapter for WebsiteSource {
    fn source_id(&self) -> SourceId {
        SourceId::Website
    }

    fn discover<'a>(
        &'a self,
        spec: &'a JobSpec,
    ) -> Pin<Box<dyn Future<Output = SourceYield> + Send + 'a>> {
        Box::pin(self.discover_inner(spec))
    }
}
