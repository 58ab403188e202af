//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ragvault_core::auth::TokenRejection;
use ragvault_shared::types::{TenantId, UserId};
use ragvault_shared::{AppError, Role, VerifiedToken};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::{AppState, request_id};

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn log_rejection(rejection: &TokenRejection, request_id: &str) {
    if rejection.is_suspicious() {
        warn!(target: "ragvault::security", reason = %rejection, request_id, "access token rejected");
    } else {
        info!(reason = %rejection, request_id, "access token rejected");
    }
}

/// Authentication middleware that verifies access tokens.
///
/// On success the [`VerifiedToken`] is stored in request extensions. Every
/// failure produces the same 401 body; the reason is only logged.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token);

    let Some(token) = token else {
        info!(request_id = request_id(&request), "missing bearer token");
        return ApiError::unauthorized("missing bearer token").into_response();
    };

    match state.verifier.verify(token).await {
        Ok(verified) => {
            request.extensions_mut().insert(verified);
            next.run(request).await
        }
        Err(rejection) => {
            log_rejection(&rejection, request_id(&request));
            ApiError::from(rejection).into_response()
        }
    }
}

/// Extractor for the authenticated caller.
///
/// ```ignore
/// async fn handler(AuthUser(token): AuthUser) -> impl IntoResponse {
///     let tenant = token.tenant_id;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub VerifiedToken);

impl AuthUser {
    /// Tenant the caller acts within.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.0.tenant_id
    }

    /// Caller's user id, when the subject is one of ours.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.0.subject_uuid().map(UserId::from_uuid)
    }

    /// Caller's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.0.role
    }

    /// Fails with 403 unless the caller holds at least `minimum`.
    ///
    /// # Errors
    ///
    /// Returns a forbidden error naming the required role.
    pub fn require(&self, minimum: Role) -> Result<(), ApiError> {
        require_role(&self.0, minimum)
    }
}

/// Fails with 403 unless `token` carries at least `minimum`.
///
/// # Errors
///
/// Returns a forbidden error naming the required role.
pub fn require_role(token: &VerifiedToken, minimum: Role) -> Result<(), ApiError> {
    if token.role.satisfies(minimum) {
        Ok(())
    } else {
        info!(
            subject = %token.subject,
            tenant_id = %token.tenant_id,
            role = token.role.as_str(),
            required = minimum.as_str(),
            "insufficient role"
        );
        Err(ApiError(AppError::Forbidden(format!(
            "requires {} role",
            minimum.as_str()
        ))))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedToken>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| ApiError::unauthorized("no verified token in request"))
    }
}
