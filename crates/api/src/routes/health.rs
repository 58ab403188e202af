//! Health check endpoints.

use axum::{Json, Router, extract::State, routing::get};
use ragvault_core::auth::KeyCacheStats;
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Whether the database answered a ping.
    pub database: bool,
    /// Object storage backend in use.
    pub storage: &'static str,
    /// Verification key cache.
    pub signing_keys: SigningKeysHealth,
}

/// Key cache diagnostics. Failure detail stays in the logs.
#[derive(Debug, Serialize)]
pub struct SigningKeysHealth {
    /// `empty`, `populated`, `refreshing` or `stale_failed`.
    pub state: String,
    /// Cached keys.
    pub key_count: usize,
    /// Seconds since the last successful fetch.
    pub age_secs: Option<u64>,
    /// Seconds until the next proactive refresh.
    pub ttl_remaining_secs: Option<u64>,
    /// Successful fetches since start.
    pub refresh_count: u64,
    /// Whether the most recent fetch failed.
    pub last_refresh_failed: bool,
}

impl From<KeyCacheStats> for SigningKeysHealth {
    fn from(stats: KeyCacheStats) -> Self {
        Self {
            state: stats.state.to_string(),
            key_count: stats.key_count,
            age_secs: stats.age.map(|d| d.as_secs()),
            ttl_remaining_secs: stats.ttl_remaining.map(|d| d.as_secs()),
            refresh_count: stats.refresh_count,
            last_refresh_failed: stats.last_error.is_some(),
        }
    }
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await.is_ok();
    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        storage: state.storage.provider_name(),
        signing_keys: state.verifier.keys().stats().into(),
    })
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
