//! Persistence seams for sessions and login.
//!
//! `ragvault-db` implements these over PostgreSQL; [`super::memory`] provides
//! in-process versions for tests and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragvault_shared::Role;
use ragvault_shared::types::{SessionFamilyId, TenantId, UserId};
use thiserror::Error;
use uuid::Uuid;

/// Backend failure, already stripped of driver detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Wraps any displayable error.
    pub fn from_display(err: impl std::fmt::Display) -> Self {
        Self(err.to_string())
    }
}

/// A stored refresh token. The raw token is never stored, only its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Row id.
    pub id: Uuid,
    /// Family shared by every rotation descended from one login.
    pub family_id: SessionFamilyId,
    /// Owner.
    pub user_id: UserId,
    /// Tenant of the owner.
    pub tenant_id: TenantId,
    /// SHA-256 hex of the raw token.
    pub token_hash: String,
    /// Role at issue time.
    pub role: Role,
    /// Email at issue time.
    pub email: String,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Set when this token was exchanged for a successor.
    pub rotated_at: Option<DateTime<Utc>>,
    /// Successor row id.
    pub replaced_by: Option<Uuid>,
    /// Set when the family was revoked.
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Data for a new refresh token row.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    /// Family (new for login, inherited on rotation).
    pub family_id: SessionFamilyId,
    /// Owner.
    pub user_id: UserId,
    /// Tenant of the owner.
    pub tenant_id: TenantId,
    /// SHA-256 hex of the raw token.
    pub token_hash: String,
    /// Role at issue time.
    pub role: Role,
    /// Email at issue time.
    pub email: String,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Client metadata.
    pub client: ClientInfo,
}

/// The successor minted during a rotation. Identity fields are inherited.
#[derive(Debug, Clone)]
pub struct Replacement {
    /// SHA-256 hex of the new raw token.
    pub token_hash: String,
    /// Expiry of the new token.
    pub expires_at: DateTime<Utc>,
    /// Client metadata.
    pub client: ClientInfo,
}

/// Request metadata recorded with a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// `User-Agent` header.
    pub user_agent: Option<String>,
    /// Peer address.
    pub ip_address: Option<String>,
}

/// Result of an atomic rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The presented token was current and has been replaced.
    Rotated {
        /// The superseded token.
        previous: RefreshTokenRecord,
        /// Its successor.
        current: RefreshTokenRecord,
    },
    /// The presented token had already been rotated.
    Reused(RefreshTokenRecord),
    /// The presented token is past its expiry.
    Expired,
    /// The presented token's family was revoked.
    Revoked,
    /// No token with this hash exists.
    NotFound,
}

impl RotateOutcome {
    /// Classifies a record that could not be rotated.
    ///
    /// Rotation is checked before revocation so a replayed token is always
    /// reported as reuse, even after its family was revoked.
    #[must_use]
    pub fn classify_unrotatable(record: RefreshTokenRecord, now: DateTime<Utc>) -> Option<Self> {
        if record.rotated_at.is_some() {
            Some(Self::Reused(record))
        } else if record.revoked_at.is_some() {
            Some(Self::Revoked)
        } else if record.expires_at <= now {
            Some(Self::Expired)
        } else {
            None
        }
    }
}

/// Refresh token persistence.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Stores a new token.
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError>;

    /// Looks up a token by hash.
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Atomically marks the presented token rotated and inserts its successor.
    ///
    /// Only one of several concurrent rotations of the same token may succeed;
    /// the others observe [`RotateOutcome::Reused`] carrying the winner's
    /// `rotated_at`, which the session layer uses to tell a race from a replay.
    async fn rotate(&self, presented_hash: &str, replacement: Replacement) -> Result<RotateOutcome, StoreError>;

    /// Revokes every live token of a family. Returns the number revoked.
    async fn revoke_family(&self, family_id: SessionFamilyId, reason: &str) -> Result<u64, StoreError>;

    /// Revokes every live token of a user. Returns the number revoked.
    async fn revoke_all_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        reason: &str,
    ) -> Result<u64, StoreError>;
}

/// A user as seen by the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// User id.
    pub id: UserId,
    /// Tenant id.
    pub tenant_id: TenantId,
    /// Email.
    pub email: String,
    /// Argon2id PHC hash; `None` for federated users.
    pub password_hash: Option<String>,
    /// Role.
    pub role: Role,
    /// Inactive users cannot log in or refresh.
    pub is_active: bool,
}

/// Tenant and user lookups needed to log in and refresh.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolves an active tenant by slug.
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<TenantId>, StoreError>;

    /// Finds a user by email inside a tenant.
    async fn find_user_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> Result<Option<DirectoryUser>, StoreError>;

    /// Finds a user by id inside a tenant.
    async fn find_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<DirectoryUser>, StoreError>;
}
