//! Login, refresh-token rotation with reuse detection, and logout.
//!
//! Refresh tokens are opaque 32-byte random values, base64url encoded. Only
//! their SHA-256 hex digest is stored. Every refresh rotates the token; a
//! superseded token presented again revokes every session of its owner,
//! unless it arrives within the reuse grace window of its rotation. That
//! case is a client racing itself (two tabs, two replicas) and is rejected
//! without revoking anything.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use ragvault_shared::auth::UserInfo;
use ragvault_shared::types::SessionFamilyId;
use ragvault_shared::AppError;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use super::issuer::TokenIssuer;
use super::password::{burn_verification_time, verify_password};
use super::store::{
    ClientInfo, DirectoryUser, NewRefreshToken, RefreshTokenStore, Replacement, RotateOutcome,
    UserDirectory,
};
use crate::singleflight::SingleFlight;

/// Revocation reason recorded when a rotated token is replayed.
pub const REASON_REUSE: &str = "reuse_detected";
/// Revocation reason recorded on logout.
pub const REASON_LOGOUT: &str = "logout";
/// Revocation reason recorded when the owner is no longer active.
pub const REASON_USER_INACTIVE: &str = "user_inactive";
/// Default window after a rotation in which the old token is treated as a
/// lost race rather than a replay.
pub const DEFAULT_REUSE_GRACE_SECS: u64 = 10;

/// Session failures. Cloneable so one rotation result can be shared by every
/// concurrent caller presenting the same token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Unknown tenant, unknown user, or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Refresh token missing, unknown, expired or revoked.
    #[error("session rejected: {0}")]
    Unauthorized(String),
    /// A rotated refresh token was replayed.
    #[error("refresh token reuse detected")]
    ReuseDetected,
    /// The token was rotated moments ago by a concurrent refresh.
    #[error("refresh token superseded")]
    Superseded,
    /// Store failure.
    #[error("session store failure: {0}")]
    Store(String),
    /// Signing or hashing failure.
    #[error("session internal failure: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether the presented refresh token is dead and the client should
    /// forget it. Transient failures and lost races leave it in place.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::Unauthorized(_) | Self::ReuseDetected
        )
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidCredentials => Self::Unauthorized("invalid credentials".into()),
            SessionError::Unauthorized(reason) => Self::Unauthorized(reason),
            SessionError::ReuseDetected => Self::RefreshReuseDetected("refresh token replayed".into()),
            SessionError::Superseded => Self::Unauthorized("refresh token superseded".into()),
            SessionError::Store(msg) => Self::Database(msg),
            SessionError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<super::store::StoreError> for SessionError {
    fn from(err: super::store::StoreError) -> Self {
        Self::Store(err.0)
    }
}

/// Credentials submitted to log in.
#[derive(Debug, Clone)]
pub struct LoginInput {
    /// Tenant slug.
    pub tenant: String,
    /// Email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
    /// Client metadata.
    pub client: ClientInfo,
}

/// Tokens handed to the client after login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Signed access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Raw refresh token, for the cookie only.
    pub refresh_token: String,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
    /// Session family.
    pub family_id: SessionFamilyId,
    /// The authenticated user.
    pub user: UserInfo,
}

/// Generates a raw refresh token.
#[must_use]
pub fn generate_refresh_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest used as the stored token identity.
#[must_use]
pub fn hash_refresh_token(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

/// Issues, rotates and revokes sessions.
#[derive(Clone)]
pub struct SessionService {
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn RefreshTokenStore>,
    issuer: Arc<TokenIssuer>,
    refresh_ttl: Duration,
    reuse_grace: Duration,
    rotations: Arc<SingleFlight<String, Result<IssuedSession, SessionError>>>,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("refresh_ttl", &self.refresh_ttl)
            .field("reuse_grace", &self.reuse_grace)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: Arc<dyn RefreshTokenStore>,
        issuer: Arc<TokenIssuer>,
        refresh_ttl_secs: u64,
    ) -> Self {
        Self {
            users,
            store,
            issuer,
            refresh_ttl: seconds(refresh_ttl_secs),
            reuse_grace: seconds(DEFAULT_REUSE_GRACE_SECS),
            rotations: Arc::new(SingleFlight::new()),
        }
    }

    /// Sets how long after a rotation the old token counts as a lost race.
    #[must_use]
    pub fn with_reuse_grace_secs(mut self, secs: u64) -> Self {
        self.reuse_grace = seconds(secs);
        self
    }

    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Rotations currently running.
    #[must_use]
    pub fn rotations_in_flight(&self) -> usize {
        self.rotations.in_flight()
    }

    /// Authenticates with a password and starts a new session family.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidCredentials`] for an unknown tenant,
    /// unknown or inactive user, federated user, or wrong password.
    pub async fn login(&self, input: LoginInput) -> Result<IssuedSession, SessionError> {
        let Some(tenant_id) = self.users.find_tenant_by_slug(&input.tenant).await? else {
            burn_verification_time(&input.password);
            return Err(SessionError::InvalidCredentials);
        };

        let user = self
            .users
            .find_user_by_email(tenant_id, input.email.trim())
            .await?
            .filter(|u| u.is_active);
        let Some((user, hash)) = user.and_then(|u| u.password_hash.clone().map(|h| (u, h))) else {
            burn_verification_time(&input.password);
            return Err(SessionError::InvalidCredentials);
        };

        let valid = verify_password(&input.password, &hash)
            .map_err(|e| SessionError::Internal(e.to_string()))?;
        if !valid {
            info!(tenant_id = %tenant_id, user_id = %user.id, "login rejected: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        let family_id = SessionFamilyId::new();
        let refresh_token = generate_refresh_token();
        let refresh_expires_at = Utc::now() + self.refresh_ttl;
        self.store
            .insert(NewRefreshToken {
                family_id,
                user_id: user.id,
                tenant_id,
                token_hash: hash_refresh_token(&refresh_token),
                role: user.role,
                email: user.email.clone(),
                expires_at: refresh_expires_at,
                client: input.client,
            })
            .await?;

        info!(tenant_id = %tenant_id, user_id = %user.id, family_id = %family_id, "login succeeded");
        issue(&self.issuer, &user, family_id, refresh_token, refresh_expires_at)
    }

    /// Exchanges a refresh token for a new access token and refresh token.
    ///
    /// Concurrent calls with the same token share a single rotation and all
    /// receive the same new pair. The rotation runs to completion even if
    /// the caller goes away.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ReuseDetected`] when the token was already
    /// rotated (all of the owner's sessions are revoked first),
    /// [`SessionError::Superseded`] when that rotation happened within the
    /// grace window, and [`SessionError::Unauthorized`] for unknown, expired
    /// or revoked tokens.
    pub async fn refresh(&self, raw: &str, client: ClientInfo) -> Result<IssuedSession, SessionError> {
        if raw.is_empty() {
            return Err(SessionError::Unauthorized("missing refresh token".into()));
        }
        let presented_hash = hash_refresh_token(raw);
        let users = Arc::clone(&self.users);
        let store = Arc::clone(&self.store);
        let issuer = Arc::clone(&self.issuer);
        let windows = Windows {
            ttl: self.refresh_ttl,
            reuse_grace: self.reuse_grace,
        };
        let key = presented_hash.clone();

        self.rotations
            .run(key, move || {
                rotate(users, store, issuer, windows, presented_hash, client)
            })
            .await
            .unwrap_or_else(|aborted| Err(SessionError::Internal(aborted.to_string())))
    }

    /// Revokes the family of `raw`. Failures are logged, never returned.
    pub async fn logout(&self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let hash = hash_refresh_token(raw);
        match self.store.find_by_hash(&hash).await {
            Ok(Some(record)) => {
                match self.store.revoke_family(record.family_id, REASON_LOGOUT).await {
                    Ok(revoked) => {
                        info!(family_id = %record.family_id, revoked, "session logged out");
                    }
                    Err(e) => warn!(error = %e, "logout revocation failed"),
                }
            }
            Ok(None) => info!("logout with unknown refresh token"),
            Err(e) => warn!(error = %e, "logout lookup failed"),
        }
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, Copy)]
struct Windows {
    ttl: Duration,
    reuse_grace: Duration,
}

async fn rotate(
    users: Arc<dyn UserDirectory>,
    store: Arc<dyn RefreshTokenStore>,
    issuer: Arc<TokenIssuer>,
    windows: Windows,
    presented_hash: String,
    client: ClientInfo,
) -> Result<IssuedSession, SessionError> {
    let refresh_token = generate_refresh_token();
    let now = Utc::now();
    let refresh_expires_at = now + windows.ttl;
    let outcome = store
        .rotate(
            &presented_hash,
            Replacement {
                token_hash: hash_refresh_token(&refresh_token),
                expires_at: refresh_expires_at,
                client,
            },
        )
        .await?;

    match outcome {
        RotateOutcome::Rotated { previous, current } => {
            let user = users
                .find_user(previous.tenant_id, previous.user_id)
                .await?
                .filter(|u| u.is_active);
            let Some(user) = user else {
                store.revoke_family(current.family_id, REASON_USER_INACTIVE).await?;
                return Err(SessionError::Unauthorized("user no longer active".into()));
            };
            issue(&issuer, &user, current.family_id, refresh_token, refresh_expires_at)
        }
        RotateOutcome::Reused(record)
            if record.revoked_at.is_none()
                && record
                    .rotated_at
                    .is_some_and(|at| now - at <= windows.reuse_grace) =>
        {
            info!(
                tenant_id = %record.tenant_id,
                user_id = %record.user_id,
                family_id = %record.family_id,
                "refresh lost a race with a concurrent rotation"
            );
            Err(SessionError::Superseded)
        }
        RotateOutcome::Reused(record) => {
            let revoked = store
                .revoke_all_for_user(record.tenant_id, record.user_id, REASON_REUSE)
                .await?;
            warn!(
                target: "ragvault::security",
                tenant_id = %record.tenant_id,
                user_id = %record.user_id,
                family_id = %record.family_id,
                revoked,
                "refresh token reuse detected, all sessions revoked"
            );
            Err(SessionError::ReuseDetected)
        }
        RotateOutcome::Expired => Err(SessionError::Unauthorized("refresh token expired".into())),
        RotateOutcome::Revoked => Err(SessionError::Unauthorized("refresh token revoked".into())),
        RotateOutcome::NotFound => Err(SessionError::Unauthorized("refresh token unknown".into())),
    }
}

fn issue(
    issuer: &TokenIssuer,
    user: &DirectoryUser,
    family_id: SessionFamilyId,
    refresh_token: String,
    refresh_expires_at: DateTime<Utc>,
) -> Result<IssuedSession, SessionError> {
    let access = issuer
        .issue_access_token(&user.id.to_string(), user.tenant_id, user.role, Some(&user.email))
        .map_err(|e| SessionError::Internal(e.to_string()))?;

    Ok(IssuedSession {
        access_token: access.token,
        expires_in: access.expires_in,
        refresh_token,
        refresh_expires_at,
        family_id,
        user: UserInfo {
            id: user.id.into_inner(),
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            role: user.role,
        },
    })
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
