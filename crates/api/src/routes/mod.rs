//! API route definitions.

use std::net::IpAddr;

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::{Router, middleware};
use ragvault_core::auth::ClientInfo;

use crate::{AppState, middleware::auth::auth_middleware};

pub mod audit_logs;
pub mod auth;
pub mod documents;
pub mod health;
pub mod jwks;
pub mod me;

/// Longest user agent kept on a session row.
const MAX_USER_AGENT_LEN: usize = 512;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(me::routes())
        .merge(documents::routes())
        .merge(audit_logs::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(protected_routes)
}

/// Client address as reported by the first proxy hop.
///
/// Anything that is not a literal IP address is dropped.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_string())
}

/// Session metadata taken from request headers.
pub(crate) fn client_info(headers: &HeaderMap) -> ClientInfo {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect());
    ClientInfo {
        user_agent,
        ip_address: client_ip(headers),
    }
}
