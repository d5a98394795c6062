use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use prospect_common::config::SourcesConfig;
use prospect_common::types::SourceId;

/// Backoff shape applied when a source reports throttling without a
/// retry-after hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    /// base × failure_count
    Linear,
    /// base × 2^failure_count
    Exponential,
    /// base × fib(failure_count)
    Fibonacci,
}

#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub strategy: BackoffStrategy,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given consecutive failure count (1-based), with
    /// ±10–15% jitter folded in and the result clamped to `max_delay`.
    pub fn delay_for(&self, failure_count: u32) -> Duration {
        let n = failure_count.max(1).min(16);
        let multiplier = match self.strategy {
            BackoffStrategy::Fixed => 1.0,
            BackoffStrategy::Linear => n as f64,
            BackoffStrategy::Exponential => 2f64.powi(n as i32),
            BackoffStrategy::Fibonacci => fibonacci(n) as f64,
        };
        let raw = self.base_delay.as_secs_f64() * multiplier * jitter_factor();
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 2..=n {
        let next = a + b;
        a = b;
        b = next;
    }
    b
}

/// Multiplicative jitter in [0.85, 0.90] ∪ [1.10, 1.15], derived from the
/// wall clock's sub-second noise so no rand dependency is needed.
fn jitter_factor() -> f64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::hash::DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos()
        .hash(&mut hasher);
    let bits = hasher.finish();
    let magnitude = 0.10 + (bits % 1_000) as f64 / 1_000.0 * 0.05;
    if bits & 1 == 0 {
        1.0 + magnitude
    } else {
        1.0 - magnitude
    }
}

/// Token bucket with continuous refill: `capacity` requests per `window`,
/// accruing at capacity/window up to capacity.
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    /// Throttle suspension deadline. Takes precedence over token math.
    suspended_until: Option<Instant>,
    failure_count: u32,
    throttled_since_acquire: bool,
}

impl TokenBucket {
    fn new(requests: u32, window: Duration) -> Self {
        let capacity = requests.max(1) as f64;
        let window_s = window.as_secs_f64().max(0.001);
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: capacity / window_s,
            last_refill: Instant::now(),
            suspended_until: None,
            failure_count: 0,
            throttled_since_acquire: false,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = (now - self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Zero when a token is available *and taken*, otherwise the minimal
    /// wait before the next token (or suspension end).
    fn try_take(&mut self) -> Duration {
        if let Some(until) = self.suspended_until {
            let now = Instant::now();
            if now < until {
                return until - now;
            }
            self.suspended_until = None;
        }
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            if self.throttled_since_acquire {
                self.throttled_since_acquire = false;
            } else {
                self.failure_count = self.failure_count.saturating_sub(1);
            }
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
        }
    }
}

struct SourceBucket {
    /// Fair turnstile: tokio mutexes wake waiters in FIFO order, which
    /// gives the per-source acquire ordering guarantee.
    turnstile: Mutex<()>,
    bucket: Mutex<TokenBucket>,
}

impl SourceBucket {
    fn new(requests: u32, window: Duration) -> Self {
        Self {
            turnstile: Mutex::new(()),
            bucket: Mutex::new(TokenBucket::new(requests, window)),
        }
    }
}

/// Process-wide request pacing: one bucket per source plus a global
/// bucket crossed by every acquisition.
pub struct SourceRateLimiter {
    buckets: HashMap<SourceId, SourceBucket>,
    global: Mutex<TokenBucket>,
    backoff: BackoffPolicy,
}

impl SourceRateLimiter {
    /// Build from per-source config. The global bucket allows the sum of
    /// all enabled sources' rates over the smallest configured window.
    pub fn new(config: &SourcesConfig, backoff: BackoffPolicy) -> Self {
        let rates = [
            (SourceId::Profiles, &config.profiles),
            (SourceId::CodeHost, &config.code_host),
            (SourceId::Microblog, &config.microblog),
            (SourceId::Website, &config.website),
        ];

        let mut table: Vec<(SourceId, u32, u64)> = rates
            .iter()
            .map(|(id, c)| (*id, c.requests_per_window, c.window_seconds))
            .collect();
        // The AI backend paces through the same limiter.
        table.push((SourceId::Ai, 30, 60));

        let global_requests: u32 = rates
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(_, c)| c.requests_per_window)
            .sum::<u32>()
            .max(1)
            + 30;
        let global_window = rates
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(_, c)| c.window_seconds)
            .min()
            .unwrap_or(60)
            .max(1);

        Self::with_rates(&table, (global_requests, global_window), backoff)
    }

    /// Explicit rate table, used by tests and embedders.
    pub fn with_rates(
        per_source: &[(SourceId, u32, u64)],
        global: (u32, u64),
        backoff: BackoffPolicy,
    ) -> Self {
        let mut buckets = HashMap::new();
        for (id, requests, window_s) in per_source {
            buckets.insert(
                *id,
                SourceBucket::new(*requests, Duration::from_secs(*window_s)),
            );
        }
        // Every SourceId must have a bucket; fall back to a permissive one.
        for id in SourceId::DISCOVERY.iter().chain([SourceId::Ai].iter()) {
            buckets
                .entry(*id)
                .or_insert_with(|| SourceBucket::new(30, Duration::from_secs(60)));
        }
        Self {
            buckets,
            global: Mutex::new(TokenBucket::new(global.0, Duration::from_secs(global.1))),
            backoff,
        }
    }

    /// Block cooperatively until a token is available for `source`.
    /// Never fails; may suspend for up to a full refill interval (longer
    /// while the source is under a throttle suspension).
    pub async fn acquire(&self, source: SourceId) {
        let start = Instant::now();
        let sb = &self.buckets[&source];

        // The turnstile spans both buckets so same-source callers are
        // released strictly in arrival order.
        {
            let _turn = sb.turnstile.lock().await;
            loop {
                let wait = sb.bucket.lock().await.try_take();
                if wait.is_zero() {
                    break;
                }
                tokio::time::sleep(wait).await;
            }

            // Global pacing across all sources.
            loop {
                let wait = self.global.lock().await.try_take();
                if wait.is_zero() {
                    break;
                }
                tokio::time::sleep(wait).await;
            }
        }

        let waited = start.elapsed();
        if waited > Duration::from_millis(5) {
            metrics::histogram!("rate_limit.wait_seconds", "source" => source.as_str())
                .record(waited.as_secs_f64());
        }
        metrics::counter!("rate_limit.acquired", "source" => source.as_str()).increment(1);
    }

    /// Record explicit backpressure (e.g. an upstream 429). With
    /// `retry_after`, the source is suspended exactly that long; without,
    /// the configured backoff strategy decides. Returns the suspension.
    pub async fn report_throttle(
        &self,
        source: SourceId,
        retry_after: Option<Duration>,
    ) -> Duration {
        let sb = &self.buckets[&source];
        let mut bucket = sb.bucket.lock().await;
        bucket.failure_count = bucket.failure_count.saturating_add(1);
        bucket.throttled_since_acquire = true;

        let delay = retry_after.unwrap_or_else(|| self.backoff.delay_for(bucket.failure_count));
        let until = Instant::now() + delay;
        bucket.suspended_until = Some(bucket.suspended_until.map_or(until, |u| u.max(until)));

        tracing::warn!(
            source = source.as_str(),
            delay_ms = delay.as_millis() as u64,
            failures = bucket.failure_count,
            "Source throttled, suspending acquisitions"
        );
        metrics::counter!("rate_limit.throttled", "source" => source.as_str()).increment(1);
        delay
    }

    /// Whether the source is currently under a throttle suspension.
    pub async fn is_suspended(&self, source: SourceId) -> bool {
        let bucket = self.buckets[&source].bucket.lock().await;
        bucket
            .suspended_until
            .is_some_and(|until| Instant::now() < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(requests: u32, window_s: u64) -> SourceRateLimiter {
        SourceRateLimiter::with_rates(
            &[(SourceId::Profiles, requests, window_s)],
            (1_000, 1),
            BackoffPolicy::default(),
        )
    }

    /// 2 req / 60 s: five acquisitions must take at least
    /// 60 × (5 − 2) / 2 = 90 s of pacing.
    #[tokio::test(start_paused = true)]
    async fn test_rate_conformance() {
        let limiter = limiter(2, 60);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire(SourceId::Profiles).await;
        }
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(89),
            "elapsed {elapsed:?} under pure enforcement bound"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_suspends_exactly() {
        let limiter = limiter(100, 1);
        limiter.acquire(SourceId::Profiles).await;
        limiter
            .report_throttle(SourceId::Profiles, Some(Duration::from_secs(2)))
            .await;

        let start = Instant::now();
        limiter.acquire(SourceId::Profiles).await;
        assert!(start.elapsed() >= Duration::from_secs(2));

        // Suspension cleared: the next acquire is immediate.
        let start = Instant::now();
        limiter.acquire(SourceId::Profiles).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_order_per_source() {
        let limiter = Arc::new(limiter(1, 10));
        limiter.acquire(SourceId::Profiles).await; // drain the bucket

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for i in 0..3 {
            let limiter = Arc::clone(&limiter);
            let tx = tx.clone();
            tokio::spawn(async move {
                limiter.acquire(SourceId::Profiles).await;
                let _ = tx.send(i);
            });
            // Let the spawned task reach the turnstile before queueing the next.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        drop(tx);

        let mut order = Vec::new();
        while let Some(i) = rx.recv().await {
            order.push(i);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unthrottled_source_unaffected() {
        let limiter = SourceRateLimiter::with_rates(
            &[
                (SourceId::Profiles, 100, 1),
                (SourceId::CodeHost, 100, 1),
            ],
            (1_000, 1),
            BackoffPolicy::default(),
        );
        limiter
            .report_throttle(SourceId::Profiles, Some(Duration::from_secs(30)))
            .await;
        assert!(limiter.is_suspended(SourceId::Profiles).await);

        let start = Instant::now();
        limiter.acquire(SourceId::CodeHost).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_strategies() {
        let policy = |strategy| BackoffPolicy {
            strategy,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(600),
        };

        // Jitter is ±10–15%, so check 0.85–1.15 bands around the ideal.
        let within = |d: Duration, ideal: f64| {
            let s = d.as_secs_f64();
            s >= ideal * 0.85 - 1e-9 && s <= ideal * 1.15 + 1e-9
        };

        assert!(within(policy(BackoffStrategy::Fixed).delay_for(4), 1.0));
        assert!(within(policy(BackoffStrategy::Linear).delay_for(4), 4.0));
        assert!(within(policy(BackoffStrategy::Exponential).delay_for(4), 16.0));
        assert!(within(policy(BackoffStrategy::Fibonacci).delay_for(5), 5.0));
    }

    #[test]
    fn test_backoff_clamped_to_max() {
        let policy = BackoffPolicy {
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };
        assert!(policy.delay_for(16) <= Duration::from_secs(10));
    }

    #[test]
    fn test_fibonacci_sequence() {
        let series: Vec<u64> = (1..=6).map(fibonacci).collect();
        assert_eq!(series, vec![1, 1, 2, 3, 5, 8]);
    }
}
