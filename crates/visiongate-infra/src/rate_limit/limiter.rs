use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_SHARD_COUNT: usize = 16;
const DEFAULT_MAX_BUCKETS: usize = 10_000;

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { limit: u32, remaining: u32 },
    Rejected { limit: u32, retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            Admission::Allowed { limit, .. } | Admission::Rejected { limit, .. } => *limit,
        }
    }
}

/// Fixed window for a single client key.
#[derive(Debug, Clone)]
struct Window {
    count: u32,
    reset_at: Instant,
}

impl Window {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window,
        }
    }

    fn admit(&mut self, now: Instant, limit: u32, window: Duration) -> Admission {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }

        if self.count < limit {
            self.count += 1;
            Admission::Allowed {
                limit,
                remaining: limit - self.count,
            }
        } else {
            Admission::Rejected {
                limit,
                retry_after: self.reset_at.saturating_duration_since(now),
            }
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }

    fn is_stale(&self, now: Instant, grace: Duration) -> bool {
        now >= self.reset_at + grace
    }
}

type Shard = Arc<Mutex<HashMap<String, Window>>>;

/// Sharded fixed-window rate limiter.
///
/// Keys hash to one of several independently locked maps, so concurrent
/// checks for different clients rarely contend. A key's counter is only
/// touched under its shard lock; admissions never exceed `limit` per window.
#[derive(Clone)]
pub struct RateLimiter {
    shards: Vec<Shard>,
    limit: u32,
    window: Duration,
    max_buckets: usize,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_shards(limit, window, DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(limit: u32, window: Duration, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count)
                .map(|_| Arc::new(Mutex::new(HashMap::new())))
                .collect(),
            limit,
            window,
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    /// Cap on tracked keys per shard. Once a shard is full of live windows,
    /// unseen keys are rejected until one of them expires.
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets.max(1);
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn shard_for(&self, key: &str) -> (usize, &Shard) {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        (index, &self.shards[index])
    }

    pub async fn admit(&self, key: &str) -> Admission {
        let (shard_index, shard) = self.shard_for(key);
        let mut windows = shard.lock().await;
        let now = Instant::now();

        if !windows.contains_key(key) && windows.len() >= self.max_buckets {
            // An expired window restarts at zero on its next admission, so
            // dropping it loses nothing. Live windows are never evicted.
            windows.retain(|_, w| !w.is_expired(now));

            if windows.len() >= self.max_buckets {
                let retry_after = windows
                    .values()
                    .map(|w| w.reset_at.saturating_duration_since(now))
                    .min()
                    .unwrap_or(self.window);
                tracing::warn!(
                    client_key = %key,
                    shard_index,
                    tracked_buckets = windows.len(),
                    "Rate limit shard full, rejecting new client"
                );
                return Admission::Rejected {
                    limit: self.limit,
                    retry_after,
                };
            }
        }

        windows
            .entry(key.to_string())
            .or_insert_with(|| Window::new(now, self.window))
            .admit(now, self.limit, self.window)
    }

    /// Drop windows idle for longer than one full window past their reset.
    pub async fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut windows = shard.lock().await;
            let before = windows.len();
            windows.retain(|_, w| !w.is_stale(now, self.window));
            removed += before - windows.len();
        }
        if removed > 0 {
            tracing::debug!(
                buckets_cleaned = removed,
                "Cleaned up expired rate limit windows"
            );
        }
        removed
    }

    pub async fn tracked_keys(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    /// Periodically garbage-collect idle windows until the runtime shuts down.
    pub fn spawn_cleanup(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.cleanup_expired_buckets().await;
            }
        })
    }
}
