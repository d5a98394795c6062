use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use prospect_common::{EngineError, Result};

use super::CacheStore;

/// External cache backing over Redis.
///
/// Values carry their own expiry timestamp in addition to the Redis-side
/// TTL, so entries written by a peer with clock skew still expire. Any
/// Redis error degrades to a miss.
pub struct RedisCache {
    manager: ConnectionManager,
}

/// Opaque serialized value with embedded expiry.
#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: i64,
    payload: String,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| EngineError::Cache(format!("invalid redis url: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| EngineError::Cache(format!("redis connect failed: {e}")))?;
        Ok(Self { manager })
    }

    async fn get_inner(&self, key: &str) -> Option<String> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Redis get failed, treating as miss");
                metrics::counter!("cache.errors", "backing" => "redis").increment(1);
                return None;
            }
        };

        let envelope: Envelope = match raw.as_deref().map(serde_json::from_str) {
            Some(Ok(envelope)) => envelope,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Corrupt cache envelope, treating as miss");
                return None;
            }
            None => {
                metrics::counter!("cache.miss", "backing" => "redis").increment(1);
                return None;
            }
        };

        if envelope.expires_at <= Utc::now().timestamp() {
            metrics::counter!("cache.miss", "backing" => "redis").increment(1);
            return None;
        }

        metrics::counter!("cache.hit", "backing" => "redis").increment(1);
        Some(envelope.payload)
    }

    async fn put_inner(&self, key: &str, value: String, ttl: Duration) {
        let envelope = Envelope {
            expires_at: Utc::now().timestamp() + ttl.as_secs() as i64,
            payload: value,
        };
        let serialized = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize cache envelope");
                return;
            }
        };

        let mut conn = self.manager.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, serialized, ttl.as_secs().max(1))
            .await
        {
            tracing::warn!(error = %e, "Redis set failed, entry not cached");
            metrics::counter!("cache.errors", "backing" => "redis").increment(1);
        }
    }

    async fn invalidate_inner(&self, key: &str) {
        let mut conn = self.manager.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!(error = %e, "Redis del failed");
            metrics::counter!("cache.errors", "backing" => "redis").increment(1);
        }
    }
}

impl CacheStore for RedisCache {
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
        Box::pin(self.invalidate_inner(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope {
            expires_at: 1_900_000_000,
            payload: r#"{"records":[]}"#.into(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.expires_at, envelope.expires_at);
        assert_eq!(parsed.payload, envelope.payload);
    }
}
