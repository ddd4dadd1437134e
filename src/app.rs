use crate::config::Config;
use crate::kv::KvStore;
use crate::state::AppState;
use crate::web::middleware::rate_limit::{RateLimitState, SharedRateLimitState};
use anyhow::Context;
use figment::{Figment, providers::Env};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
    rate_limit: SharedRateLimitState,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new() -> Result<Self, anyhow::Error> {
        // Load configuration
        let config: Config = Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")?;

        // Create database connection pool
        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect(&config.database_url)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 8,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            "database pool established"
        );

        // Run database migrations
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed");

        // Shared store: reachability is checked once here; the per-request
        // policy is always fail-open (see kv.rs and the rate limiter).
        let redis_pool = deadpool_redis::Config::from_url(&config.redis_url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .context("Failed to create shared store pool")?;
        let kv = KvStore::redis(redis_pool);

        match kv.ping().await {
            Ok(()) => info!("Shared store connected"),
            Err(e) if config.redis_required => {
                return Err(e.context("Shared store unreachable and REDIS_REQUIRED is set"));
            }
            Err(e) => {
                warn!(
                    error = ?e,
                    "Shared store unreachable; caching and rate limiting run degraded (fail-open)"
                );
            }
        }

        let rate_limit = Arc::new(RateLimitState::new(
            kv.clone(),
            config.rate_limit_max,
            config.rate_limit_window(),
        ));
        let app_state = AppState::new(db_pool, kv, &config);

        Ok(App {
            config,
            app_state,
            rate_limit,
        })
    }

    /// Bind the listener and serve until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let router = crate::web::create_router(self.app_state, self.rate_limit);
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(port = self.config.port, "web server listening");

        // connect_info supplies the socket peer as the client-IP fallback.
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web server error")
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
