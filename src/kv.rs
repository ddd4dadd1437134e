//! Shared key-value store client backing the response cache and admission control.
//!
//! One store, two consumers: the read-through response cache (get/set-with-expiry,
//! pattern delete) and the per-IP rate limiter (atomic increment-with-expiry).
//! The client is threaded through `AppState` rather than imported as a global,
//! so tests run against the in-memory backend.
//!
//! Two backends:
//!
//! - **Redis** -- deadpool pool, shared across instances. Callers treat every
//!   error as a soft failure; the service keeps running without it.
//! - **Memory** -- per-process DashMaps with entry deadlines. Used by tests and
//!   usable for single-instance deployments without a Redis.

use anyhow::{Context, Result};
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// `INCR` + first-write `EXPIRE` + `TTL` in one round trip, so a counter can
/// never be created without a deadline.
static INCR_WINDOW: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r#"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('EXPIRE', KEYS[1], ARGV[1])
        end
        local ttl = redis.call('TTL', KEYS[1])
        return {count, ttl}
        "#,
    )
});

/// Post-increment state of a rate-limit window.
#[derive(Debug, Clone, Copy)]
pub struct WindowCount {
    /// Requests observed in the current window, including this one.
    pub count: u64,
    /// Seconds until the window expires and the counter resets.
    pub reset_secs: u64,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct MemoryCounter {
    count: u64,
    expires_at: Instant,
}

/// In-process backend: values and window counters with per-entry deadlines.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<DashMap<String, MemoryEntry>>,
    counters: Arc<DashMap<String, MemoryCounter>>,
}

#[derive(Clone)]
pub enum KvStore {
    Memory(MemoryKv),
    Redis(Pool),
}

impl KvStore {
    pub fn memory() -> Self {
        KvStore::Memory(MemoryKv::default())
    }

    pub fn redis(pool: Pool) -> Self {
        KvStore::Redis(pool)
    }

    /// Round-trip check, used by the startup policy gate and the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        match self {
            KvStore::Memory(_) => Ok(()),
            KvStore::Redis(pool) => {
                let mut conn = pool.get().await.context("shared store connection")?;
                let _: String = redis::cmd("PING")
                    .query_async(&mut conn)
                    .await
                    .context("shared store PING")?;
                Ok(())
            }
        }
    }

    /// Fetch a value, or `None` if absent or expired.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            KvStore::Memory(kv) => {
                if let Some(entry) = kv.entries.get(key) {
                    if !entry.is_expired() {
                        return Ok(Some(entry.value.clone()));
                    }
                    drop(entry);
                    kv.entries.remove(key);
                }
                Ok(None)
            }
            KvStore::Redis(pool) => {
                let mut conn = pool.get().await.context("shared store connection")?;
                let value: Option<String> = conn.get(key).await.context("shared store GET")?;
                Ok(value)
            }
        }
    }

    /// Store a value that expires after `ttl`.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        match self {
            KvStore::Memory(kv) => {
                kv.entries.insert(
                    key.to_owned(),
                    MemoryEntry {
                        value: value.to_owned(),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(())
            }
            KvStore::Redis(pool) => {
                let mut conn = pool.get().await.context("shared store connection")?;
                let _: () = conn
                    .set_ex(key, value, ttl.as_secs().max(1))
                    .await
                    .context("shared store SETEX")?;
                Ok(())
            }
        }
    }

    /// Delete every key matching a glob pattern (e.g. `chapter*`), returning
    /// how many were removed. Zero matches is a successful no-op.
    pub async fn del_matching(&self, pattern: &str) -> Result<u64> {
        match self {
            KvStore::Memory(kv) => {
                let prefix = pattern.trim_end_matches('*');
                let matched: Vec<String> = kv
                    .entries
                    .iter()
                    .filter(|e| e.key().starts_with(prefix))
                    .map(|e| e.key().clone())
                    .collect();
                let removed = matched.len() as u64;
                for key in matched {
                    kv.entries.remove(&key);
                }
                Ok(removed)
            }
            KvStore::Redis(pool) => {
                let mut conn = pool.get().await.context("shared store connection")?;
                let keys: Vec<String> = conn.keys(pattern).await.context("shared store KEYS")?;
                if keys.is_empty() {
                    return Ok(0);
                }
                let removed: u64 = conn.del(&keys).await.context("shared store DEL")?;
                Ok(removed)
            }
        }
    }

    /// Atomically bump the counter under `key`, creating it with an expiry of
    /// `window` on first use. Returns the post-increment count and the seconds
    /// left until the counter resets.
    pub async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount> {
        match self {
            KvStore::Memory(kv) => {
                let now = Instant::now();
                let mut entry = kv.counters.entry(key.to_owned()).or_insert(MemoryCounter {
                    count: 0,
                    expires_at: now + window,
                });
                if now >= entry.expires_at {
                    // Window elapsed: restart the count under a fresh deadline.
                    entry.count = 0;
                    entry.expires_at = now + window;
                }
                entry.count += 1;
                let reset_secs = entry
                    .expires_at
                    .saturating_duration_since(now)
                    .as_secs()
                    .max(1);
                Ok(WindowCount {
                    count: entry.count,
                    reset_secs,
                })
            }
            KvStore::Redis(pool) => {
                let mut conn = pool.get().await.context("shared store connection")?;
                let (count, ttl): (u64, i64) = INCR_WINDOW
                    .key(key)
                    .arg(window.as_secs().max(1))
                    .invoke_async(&mut conn)
                    .await
                    .context("shared store INCR window")?;
                let reset_secs = if ttl > 0 {
                    ttl as u64
                } else {
                    window.as_secs().max(1)
                };
                Ok(WindowCount { count, reset_secs })
            }
        }
    }
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}
