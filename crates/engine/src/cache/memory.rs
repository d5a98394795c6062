use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::CacheStore;

/// In-memory TTL cache with lazy eviction and a capacity bound.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    async fn get_inner(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                metrics::counter!("cache.hit", "backing" => "memory").increment(1);
                Some(entry.value.clone())
            }
            _ => {
                metrics::counter!("cache.miss", "backing" => "memory").increment(1);
                None
            }
        }
    }

    async fn put_inner(&self, key: &str, value: String, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        // Evict expired entries on insert.
        entries.retain(|_, entry| entry.expires_at > now);

        // Still full: drop the entry closest to expiry.
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
                metrics::counter!("cache.evicted", "backing" => "memory").increment(1);
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }
}

impl CacheStore for MemoryCache {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(self.get_inner(key))
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.put_inner(key, value, ttl))
    }

    fn invalidate<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
        })
    }
}
