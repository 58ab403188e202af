//! The caller's verified identity.

use axum::{Json, Router, routing::get};
use ragvault_shared::VerifiedToken;

use crate::AppState;
use crate::middleware::AuthUser;

/// GET /me
async fn me(AuthUser(token): AuthUser) -> Json<VerifiedToken> {
    Json(token)
}

/// Creates the identity route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}
