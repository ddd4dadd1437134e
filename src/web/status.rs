//! Liveness and health handlers.

use axum::extract::State;
use axum::response::Json;
use serde_json::{Value, json};
use tracing::trace;

use crate::state::AppState;

/// `GET /` -- plain liveness probe.
pub(super) async fn root() -> &'static str {
    "Hello World!"
}

/// `GET /api/v1/health`
///
/// Reports reachability of both collaborators. The shared store being down is
/// degraded, not unhealthy -- the service keeps answering without it.
pub(super) async fn health(State(state): State<AppState>) -> Json<Value> {
    trace!("health check requested");

    let database = sqlx::query("SELECT 1").execute(&state.db_pool).await.is_ok();
    let shared_store = state.kv.ping().await.is_ok();

    let status = match (database, shared_store) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };

    Json(json!({
        "status": status,
        "database": database,
        "sharedStore": shared_store,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
