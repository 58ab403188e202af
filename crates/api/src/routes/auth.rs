//! Authentication routes for login, refresh and logout.
//!
//! Access tokens travel in the response body, refresh tokens only in the
//! cookie described by [`CookieSettings`](crate::middleware::CookieSettings).

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use ragvault_core::auth::{IssuedSession, LoginInput};
use ragvault_shared::auth::{LoginRequest, TokenResponse};
use tracing::{debug, info};

use super::client_info;
use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Creates the auth router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

fn token_response(session: &IssuedSession) -> TokenResponse {
    TokenResponse {
        access_token: session.access_token.clone(),
        token_type: "Bearer",
        expires_in: session.expires_in,
        user: session.user.clone(),
    }
}

/// POST /auth/login - Authenticate with a password and start a session.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let session = state
        .sessions
        .login(LoginInput {
            tenant: payload.tenant,
            email: payload.email,
            password: payload.password,
            client: client_info(&headers),
        })
        .await?;

    info!(
        user_id = %session.user.id,
        tenant_id = %session.user.tenant_id,
        family_id = %session.family_id,
        "login succeeded"
    );
    let body = token_response(&session);
    let jar = state.cookies.set(jar, session.refresh_token);
    Ok((jar, Json(body)))
}

/// POST /auth/refresh - Rotate the refresh cookie and mint a new access token.
///
/// The cookie is cleared when the token is dead (unknown, expired, revoked or
/// reused). Store outages and lost rotation races keep it, so the client can
/// retry.
async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenResponse>), (CookieJar, ApiError)> {
    let Some(raw) = state.cookies.read(&jar).map(str::to_owned) else {
        debug!("refresh without cookie");
        return Err((jar, ApiError::unauthorized("missing refresh cookie")));
    };

    match state.sessions.refresh(&raw, client_info(&headers)).await {
        Ok(session) => {
            let body = token_response(&session);
            let jar = state.cookies.set(jar, session.refresh_token);
            Ok((jar, Json(body)))
        }
        Err(err) => {
            let jar = if err.ends_session() {
                state.cookies.clear(jar)
            } else {
                debug!(error = %err, "refresh failed, keeping cookie");
                jar
            };
            Err((jar, ApiError::from(err)))
        }
    }
}

/// POST /auth/logout - Revoke the session family and clear the cookie.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(raw) = state.cookies.read(&jar) {
        state.sessions.logout(raw).await;
    }
    (state.cookies.clear(jar), StatusCode::NO_CONTENT)
}
