//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `UserId` where a `TenantId` is expected.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

typed_id!(TenantId, "Unique identifier for a tenant (the isolation boundary).");
typed_id!(UserId, "Unique identifier for a user.");
typed_id!(DocumentId, "Unique identifier for an uploaded document.");
typed_id!(ChunkId, "Unique identifier for a document chunk.");
typed_id!(
    SessionFamilyId,
    "Identifier shared by every refresh token descended from one login."
);

/// Reasons a raw tenant identifier is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TenantIdError {
    /// Not a well-formed UUID.
    #[error("tenant identifier is not a well-formed UUID")]
    Malformed,
    /// The nil UUID never names a tenant.
    #[error("tenant identifier must not be the nil UUID")]
    Nil,
}

impl TenantId {
    /// Parses an untrusted tenant identifier (token claim, header, path).
    ///
    /// Surrounding whitespace is not tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`TenantIdError`] when the input is not a UUID or is nil.
    pub fn parse(raw: &str) -> Result<Self, TenantIdError> {
        if raw.trim() != raw {
            return Err(TenantIdError::Malformed);
        }
        let uuid = Uuid::parse_str(raw).map_err(|_| TenantIdError::Malformed)?;
        if uuid.is_nil() {
            return Err(TenantIdError::Nil);
        }
        Ok(Self(uuid))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
