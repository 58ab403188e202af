//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - The first-party JWKS at `/.well-known/jwks.json`
//! - Authentication middleware and role checks
//! - The refresh token cookie
//! - Error responses

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use ragvault_core::auth::{
    HttpKeySource, KeyCache, KeySource, SessionService, StaticKeySource, TokenIssuer,
    TokenVerifier, VerifierConfig,
};
use ragvault_core::document::IntakeLimits;
use ragvault_core::storage::{ObjectStore, StorageProvider};
use ragvault_db::{PgUserDirectory, RefreshTokenRepository};
use ragvault_shared::{AppConfig, AppError};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

use crate::middleware::CookieSettings;

/// Room for multipart framing and the text fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (application role, subject to RLS).
    pub db: Arc<DatabaseConnection>,
    /// Access token verifier.
    pub verifier: Arc<TokenVerifier>,
    /// First-party token issuer.
    pub issuer: Arc<TokenIssuer>,
    /// Login, refresh and logout.
    pub sessions: SessionService,
    /// Object storage for uploaded documents.
    pub storage: ObjectStore,
    /// Refresh cookie attributes.
    pub cookies: CookieSettings,
    /// Upload limits.
    pub intake: IntakeLimits,
}

impl AppState {
    /// Wires every service from configuration.
    ///
    /// Tokens are verified against `auth.jwks_url` when set, otherwise
    /// against the first-party signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key, storage backend or HTTP client
    /// cannot be initialized.
    pub fn from_config(config: &AppConfig, db: DatabaseConnection) -> Result<Self, AppError> {
        let auth = &config.auth;
        let issuer = Arc::new(
            TokenIssuer::from_pem(
                &auth.signing_key_pem,
                auth.signing_kid.clone(),
                auth.issuer.clone(),
                auth.audience.clone(),
                config.session.access_token_ttl_secs,
            )
            .map_err(|e| AppError::Internal(e.to_string()))?,
        );

        let source: Arc<dyn KeySource> = match &auth.jwks_url {
            Some(url) => {
                let client = reqwest::Client::builder()
                    .build()
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                info!(jwks_url = %url, "verifying tokens against external JWKS");
                Arc::new(HttpKeySource::new(client, url.clone()))
            }
            None => {
                info!(kid = issuer.kid(), "verifying tokens against first-party key");
                Arc::new(StaticKeySource::new(issuer.public_jwks().clone()))
            }
        };
        let keys = KeyCache::with_settings(
            source,
            Duration::from_secs(auth.jwks_ttl_secs),
            Duration::from_secs(auth.jwks_fetch_timeout_secs),
        );
        let verifier = Arc::new(TokenVerifier::new(
            &VerifierConfig {
                issuer: auth.issuer.clone(),
                audience: auth.audience.clone(),
                claim_namespace: auth.claim_namespace.clone(),
            },
            keys,
        ));

        let sessions = SessionService::new(
            Arc::new(PgUserDirectory::new(db.clone())),
            Arc::new(RefreshTokenRepository::new(db.clone())),
            issuer.clone(),
            config.session.refresh_token_ttl_secs,
        )
        .with_reuse_grace_secs(config.session.reuse_grace_secs);

        let storage = ObjectStore::from_provider(&StorageProvider::from_settings(&config.storage)?)?;
        info!(provider = storage.provider_name(), "object storage ready");

        Ok(Self {
            db: Arc::new(db),
            verifier,
            issuer,
            sessions,
            storage,
            cookies: CookieSettings::from_config(&config.session),
            intake: IntakeLimits {
                max_bytes: u64::try_from(config.server.max_upload_bytes).unwrap_or(u64::MAX),
            },
        })
    }

    fn body_limit(&self) -> usize {
        usize::try_from(self.intake.max_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

/// `x-request-id` of a request, as set or forwarded by [`SetRequestIdLayer`].
pub(crate) fn request_id<B>(request: &Request<B>) -> &str {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-")
}

/// Creates the main application router.
///
/// Every request carries an `x-request-id` (the caller's, or a fresh UUID),
/// which is echoed on the response and recorded on the request span.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::jwks::routes())
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.body_limit()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id(request),
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
