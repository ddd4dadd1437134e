//! Environment-derived application configuration.
//!
//! Extracted once at startup via figment's `Env` provider (see `App::new`).
//! Every field maps to an environment variable of the same name in
//! SCREAMING_SNAKE_CASE; `dotenvy` loads a local `.env` first.

use serde::Deserialize;
use std::time::Duration;

fn default_port() -> u16 {
    3000
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_rate_limit_max() -> u64 {
    5
}

fn default_rate_limit_window_secs() -> u64 {
    15 * 60
}

fn default_cache_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `PORT` -- HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// `DATABASE_URL` -- Postgres connection string. Required.
    pub database_url: String,

    /// `REDIS_URL` -- shared store connection string.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// `REDIS_REQUIRED` -- store-unavailability policy. `false` (default)
    /// fails open: an unreachable store logs a warning at startup and the
    /// service runs degraded (no caching, admission control admits
    /// everything). `true` fails closed: startup aborts instead.
    #[serde(default)]
    pub redis_required: bool,

    /// `ADMIN_TOKEN` -- value the `x-admin-token` header must carry on
    /// the chapter write route. Required.
    pub admin_token: String,

    /// `RATE_LIMIT_MAX` -- requests allowed per client IP per window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u64,

    /// `RATE_LIMIT_WINDOW_SECS` -- admission window length.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// `CACHE_TTL_SECS` -- staleness ceiling for cached read responses.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// `LOG_LEVEL` -- base tracing level for this crate's targets.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
