//! Authentication types shared by the verifier, the session service and the API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::TenantId;

/// Tenant role, ordered from least to most privileged.
///
/// The derived ordering is the role hierarchy: `Viewer < Member < Admin < Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access. Assigned when a token carries no recognised role.
    #[default]
    Viewer,
    /// May upload and query documents.
    Member,
    /// May delete documents and read the audit trail.
    Admin,
    /// Full control over the tenant.
    Owner,
}

impl Role {
    /// All roles, least privileged first.
    pub const ALL: [Self; 4] = [Self::Viewer, Self::Member, Self::Admin, Self::Owner];

    /// Numeric rank used for comparisons (viewer = 0 .. owner = 3).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Member => 1,
            Self::Admin => 2,
            Self::Owner => 3,
        }
    }

    /// Returns true when this role grants at least the privileges of `minimum`.
    #[must_use]
    pub const fn satisfies(self, minimum: Self) -> bool {
        self.rank() >= minimum.rank()
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known role.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Identity established by a successfully verified access token.
///
/// This is the only way a request obtains a tenant context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedToken {
    /// Token subject (the user identifier at the issuer).
    pub subject: String,
    /// Tenant the caller acts within.
    pub tenant_id: TenantId,
    /// Effective role inside the tenant.
    pub role: Role,
    /// Email claim, when the issuer provides one.
    pub email: Option<String>,
    /// Expiry taken from the `exp` claim.
    pub expires_at: DateTime<Utc>,
}

impl VerifiedToken {
    /// Returns the subject as a UUID when the issuer uses UUID subjects.
    #[must_use]
    pub fn subject_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.subject).ok()
    }
}

/// Login request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Tenant slug.
    pub tenant: String,
    /// User email.
    pub email: String,
    /// User password.
    pub password: String,
}

/// Access token response returned by login and refresh.
///
/// The refresh token is never part of the body; it travels in a cookie.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    /// Signed access token.
    pub access_token: String,
    /// Always `Bearer`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Authenticated user.
    pub user: UserInfo,
}

/// User info returned in auth responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User ID.
    pub id: Uuid,
    /// Tenant ID.
    pub tenant_id: TenantId,
    /// User email.
    pub email: String,
    /// Role inside the tenant.
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_role_hierarchy_ordering() {
        assert!(Role::Viewer < Role::Member);
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
    }

    #[rstest]
    #[case(Role::Owner, Role::Admin, true)]
    #[case(Role::Admin, Role::Admin, true)]
    #[case(Role::Member, Role::Admin, false)]
    #[case(Role::Viewer, Role::Member, false)]
    #[case(Role::Viewer, Role::Viewer, true)]
    fn test_role_satisfies(#[case] role: Role, #[case] minimum: Role, #[case] expected: bool) {
        assert_eq!(role.satisfies(minimum), expected);
    }

    #[test]
    fn test_role_default_is_least_privileged() {
        assert_eq!(Role::default(), Role::Viewer);
        assert_eq!(Role::ALL[0], Role::default());
    }

    #[rstest]
    #[case("owner", Role::Owner)]
    #[case("ADMIN", Role::Admin)]
    #[case(" member ", Role::Member)]
    #[case("viewer", Role::Viewer)]
    fn test_role_from_str(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(raw.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn test_role_from_str_unknown() {
        assert!("superuser".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(role, Role::Owner);
    }

    #[test]
    fn test_role_display_roundtrip() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }
}
