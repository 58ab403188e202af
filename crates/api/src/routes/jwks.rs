//! Public keys of the first-party issuer.

use axum::{
    Json, Router,
    extract::State,
    http::header::CACHE_CONTROL,
    response::IntoResponse,
    routing::get,
};

use crate::AppState;

/// GET /.well-known/jwks.json
async fn jwks(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CACHE_CONTROL, "public, max-age=300")],
        Json(state.issuer.public_jwks().clone()),
    )
}

/// Creates the JWKS route, mounted at the root rather than under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/.well-known/jwks.json", get(jwks))
}
