//! Application state shared across handlers and middleware.

use crate::config::Config;
use crate::kv::KvStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    /// Shared key-value store, injected here (not a global) so tests can swap
    /// in the in-memory backend.
    pub kv: KvStore,
    pub admin_token: Arc<str>,
    pub cache_ttl: Duration,
}

impl AppState {
    pub fn new(db_pool: PgPool, kv: KvStore, config: &Config) -> Self {
        Self {
            db_pool,
            kv,
            admin_token: config.admin_token.as_str().into(),
            cache_ttl: config.cache_ttl(),
        }
    }
}
