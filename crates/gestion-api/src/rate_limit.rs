//! Per-client sliding-window rate limiting.
//!
//! Each `(client, endpoint)` key may make at most
//! [`RATE_LIMIT_PER_MINUTE`] requests in any rolling minute and
//! [`RATE_LIMIT_PER_HOUR`] in any rolling hour. Rejected requests are not
//! recorded.
//!
//! Two implementations:
//! - [`SlidingWindowLimiter`]: process-local map, swept periodically.
//! - [`RedisSlidingWindowLimiter`]: one sorted set per key, shared across
//!   instances and updated by a single script. Fails open when Redis is
//!   unreachable.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use gestion_core::defaults::{
    RATE_LIMIT_PER_HOUR, RATE_LIMIT_PER_MINUTE, RATE_LIMIT_RETRY_AFTER_SECS,
};
use gestion_core::{Error, Result};
use redis::aio::ConnectionManager;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Message carried by every rate-limit rejection.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

pub fn rate_limited() -> Error {
    Error::RateLimited {
        message: RATE_LIMIT_MESSAGE.to_string(),
        retry_after_secs: RATE_LIMIT_RETRY_AFTER_SECS,
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record a request for `key`, or fail with `Error::RateLimited`.
    async fn check(&self, key: &str) -> Result<()>;

    fn backend_name(&self) -> &str;
}

/// Key for a client on an endpoint: `{client}-{endpoint}`.
///
/// The client is the first `X-Forwarded-For` entry, else the socket peer,
/// else `unknown`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, endpoint: &str) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let client = forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}-{}", client, endpoint)
}

/// In-memory sliding windows keyed by client.
pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    per_minute: usize,
    per_hour: usize,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_PER_MINUTE, RATE_LIMIT_PER_HOUR)
    }
}

impl SlidingWindowLimiter {
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            per_minute,
            per_hour,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, VecDeque<Instant>>>> {
        self.windows
            .lock()
            .map_err(|_| Error::Internal("rate limit state poisoned".to_string()))
    }

    fn prune(window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.saturating_duration_since(*oldest) >= HOUR {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drop expired timestamps and empty keys. Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let Ok(mut windows) = self.lock() else {
            return 0;
        };
        let before = windows.len();
        windows.retain(|_, window| {
            Self::prune(window, now);
            !window.is_empty()
        });
        before - windows.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Run [`sweep`](Self::sweep) every `every` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!(removed, remaining = self.tracked_keys(), "rate limit sweep");
                }
            }
        })
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check(&self, key: &str) -> Result<()> {
        let now = Instant::now();
        let mut windows = self.lock()?;
        let window = windows.entry(key.to_string()).or_default();
        Self::prune(window, now);

        let last_minute = window
            .iter()
            .rev()
            .take_while(|t| now.saturating_duration_since(**t) < MINUTE)
            .count();

        if last_minute >= self.per_minute || window.len() >= self.per_hour {
            warn!(
                key = %key,
                last_minute,
                last_hour = window.len(),
                "rate limit exceeded"
            );
            return Err(rate_limited());
        }

        window.push_back(now);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Trim, count and record in one step so concurrent requests on the same
/// key cannot all pass before any of them is recorded.
///
/// KEYS[1] window key. ARGV: now, minute_start, hour_start, per_minute,
/// per_hour, member, ttl_secs. Returns 1 when admitted, 0 when rejected.
const SLIDING_WINDOW_SCRIPT: &str = r"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[3])
local last_minute = redis.call('ZCOUNT', KEYS[1], '(' .. ARGV[2], '+inf')
local last_hour = redis.call('ZCARD', KEYS[1])
if last_minute >= tonumber(ARGV[4]) or last_hour >= tonumber(ARGV[5]) then
  return 0
end
redis.call('ZADD', KEYS[1], ARGV[1], ARGV[6])
redis.call('EXPIRE', KEYS[1], ARGV[7])
return 1
";

/// `(minute_start, hour_start)` for a request at `now_ms`.
///
/// Scores above `minute_start` count toward the minute; scores at or below
/// `hour_start` have aged out, matching the in-memory limiter.
fn window_bounds(now_ms: i64) -> (i64, i64) {
    (
        now_ms - MINUTE.as_millis() as i64,
        now_ms - HOUR.as_millis() as i64,
    )
}

/// Admission for a Redis window check. Errors admit the request.
fn admit(key: &str, outcome: redis::RedisResult<bool>) -> Result<()> {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(key = %key, "rate limit exceeded");
            Err(rate_limited())
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Redis rate limit check failed, allowing request");
            Ok(())
        }
    }
}

/// Sliding windows stored as Redis sorted sets scored by epoch milliseconds.
pub struct RedisSlidingWindowLimiter {
    connection: ConnectionManager,
    script: redis::Script,
    per_minute: u64,
    per_hour: u64,
    prefix: String,
}

impl RedisSlidingWindowLimiter {
    pub async fn connect(redis_url: &str) -> std::result::Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Redis rate limiter connected");
        Ok(Self {
            connection,
            script: redis::Script::new(SLIDING_WINDOW_SCRIPT),
            per_minute: RATE_LIMIT_PER_MINUTE as u64,
            per_hour: RATE_LIMIT_PER_HOUR as u64,
            prefix: "gestion:ratelimit:".to_string(),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn try_check(&self, key: &str) -> redis::RedisResult<bool> {
        let mut conn = self.connection.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let (minute_start, hour_start) = window_bounds(now_ms);
        let member = format!("{}-{}", now_ms, uuid::Uuid::new_v4().simple());

        let admitted: i64 = self
            .script
            .key(self.redis_key(key))
            .arg(now_ms)
            .arg(minute_start)
            .arg(hour_start)
            .arg(self.per_minute)
            .arg(self.per_hour)
            .arg(member)
            .arg(HOUR.as_secs())
            .invoke_async(&mut conn)
            .await?;

        Ok(admitted == 1)
    }
}

#[async_trait]
impl RateLimiter for RedisSlidingWindowLimiter {
    async fn check(&self, key: &str) -> Result<()> {
        admit(key, self.try_check(key).await)
    }

    fn backend_name(&self) -> &str {
        "redis"
    }
}
