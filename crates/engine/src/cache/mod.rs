mod memory;
mod redis;

pub use self::redis::RedisCache;
pub use memory::MemoryCache;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use prospect_common::config::{CacheKind, CacheSettings};
use prospect_common::types::SourceId;
use prospect_common::{EngineError, Result};

/// Pluggable TTL key→value store shared by fetchers and scorers.
///
/// The cache is advisory: callers treat a miss (including a degraded
/// backing store) as a silent event and fetch. Values are opaque
/// serialized strings. Object-safe for dyn dispatch.
pub trait CacheStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    fn invalidate<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Build the configured backing store. External backing reads the
/// Redis address from the REDIS_URL environment variable.
pub async fn build_cache(settings: &CacheSettings) -> Result<Arc<dyn CacheStore>> {
    match settings.kind {
        CacheKind::Memory => Ok(Arc::new(MemoryCache::new(settings.capacity))),
        CacheKind::External => {
            let url = std::env::var("REDIS_URL").map_err(|_| {
                EngineError::Config("cache.kind = external requires REDIS_URL".into())
            })?;
            let cache = RedisCache::connect(&url).await?;
            Ok(Arc::new(cache))
        }
    }
}

/// Key for a cached source query: `src:<source_id>:q:<hash>`.
pub fn source_query_key(source: SourceId, fingerprint: &str) -> String {
    format!("src:{}:q:{}", source.as_str(), fingerprint)
}

/// Key for a cached score: `score:<identity_key>:job:<hash>`.
pub fn score_key(identity_key: &str, job_fingerprint: &str) -> String {
    format!("score:{identity_key}:job:{job_fingerprint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        assert_eq!(
            source_query_key(SourceId::CodeHost, "abc"),
            "src:code_host:q:abc"
        );
        assert_eq!(score_key("k1", "j2"), "score:k1:job:j2");
    }
}
