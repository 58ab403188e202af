//! Access token verification.
//!
//! A token is accepted only if it is RS256, names a `kid` known to the key
//! cache, carries a valid signature, is unexpired (no leeway), matches the
//! configured issuer and audience, and carries a subject and a well-formed
//! tenant claim. Every failure has a distinct [`TokenRejection`] for logs but
//! collapses to a single `Unauthorized` outward.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use ragvault_shared::types::TenantId;
use ragvault_shared::{AppError, VerifiedToken};
use serde_json::{Map, Value};
use thiserror::Error;

use super::claims::ClaimRules;
use super::jwks::KeyCache;

/// Why a token was refused. Internal only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    /// Not a structurally valid JWT.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// Header algorithm is not RS256.
    #[error("algorithm not allowed")]
    Algorithm,
    /// Header has no `kid`.
    #[error("token header has no kid")]
    MissingKeyId,
    /// No cached or freshly fetched key matches the `kid`.
    #[error("unknown signing key {0}")]
    UnknownKey(String),
    /// Signature does not verify.
    #[error("invalid signature")]
    Signature,
    /// `exp` is in the past.
    #[error("token expired")]
    Expired,
    /// `iss` does not match.
    #[error("issuer mismatch")]
    Issuer,
    /// `aud` does not match.
    #[error("audience mismatch")]
    Audience,
    /// A required registered claim is missing.
    #[error("missing claim {0}")]
    MissingClaim(String),
    /// No tenant claim under any recognised name.
    #[error("missing tenant claim")]
    MissingTenant,
    /// The tenant claim is not a well-formed, non-nil UUID.
    #[error("tenant claim is not a valid tenant id")]
    InvalidTenant,
}

impl TokenRejection {
    /// True for rejections that point at tampering or misconfiguration rather
    /// than ordinary expiry.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::Algorithm | Self::Signature | Self::Issuer | Self::Audience | Self::InvalidTenant
        )
    }
}

impl From<jsonwebtoken::errors::Error> for TokenRejection {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::Signature,
            ErrorKind::InvalidIssuer => Self::Issuer,
            ErrorKind::InvalidAudience => Self::Audience,
            ErrorKind::InvalidAlgorithm => Self::Algorithm,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed(err.to_string()),
        }
    }
}

impl From<TokenRejection> for AppError {
    fn from(rejection: TokenRejection) -> Self {
        Self::Unauthorized(rejection.to_string())
    }
}

/// Expected issuer, audience and claim namespace.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Expected `iss`.
    pub issuer: String,
    /// Expected `aud`.
    pub audience: String,
    /// Provider claim namespace, if any.
    pub claim_namespace: Option<String>,
}

/// Verifies access tokens against a [`KeyCache`].
#[derive(Debug)]
pub struct TokenVerifier {
    keys: KeyCache,
    validation: Validation,
    rules: ClaimRules,
}

impl TokenVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(config: &VerifierConfig, keys: KeyCache) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            keys,
            validation,
            rules: ClaimRules::new(config.claim_namespace.as_deref()),
        }
    }

    /// The underlying key cache.
    #[must_use]
    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    /// Verifies `token` and extracts the caller's identity.
    ///
    /// # Errors
    ///
    /// Returns the specific [`TokenRejection`].
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, TokenRejection> {
        let header = decode_header(token).map_err(|e| TokenRejection::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(TokenRejection::Algorithm);
        }
        let kid = header.kid.ok_or(TokenRejection::MissingKeyId)?;
        let key = self
            .keys
            .resolve(&kid)
            .await
            .map_err(|e| TokenRejection::UnknownKey(e.kid))?;

        let data = decode::<Map<String, Value>>(token, &key, &self.validation)?;
        self.identity(&data.claims)
    }

    fn identity(&self, claims: &Map<String, Value>) -> Result<VerifiedToken, TokenRejection> {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TokenRejection::MissingClaim("sub".into()))?;

        let raw_tenant = self.rules.tenant(claims).ok_or(TokenRejection::MissingTenant)?;
        let tenant_id = TenantId::parse(raw_tenant).map_err(|_| TokenRejection::InvalidTenant)?;

        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
            .ok_or_else(|| TokenRejection::MissingClaim("exp".into()))?;

        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(VerifiedToken {
            subject: subject.to_string(),
            tenant_id,
            role: self.rules.role(claims),
            email,
            expires_at,
        })
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod tests;
