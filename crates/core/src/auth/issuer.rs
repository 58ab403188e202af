//! First-party access token issuer.
//!
//! Signs RS256 access tokens with the platform's own RSA key and publishes
//! the matching public key as a JWK set, so the verifier treats first-party
//! tokens exactly like tokens from an external identity provider.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use ragvault_shared::Role;
use ragvault_shared::types::TenantId;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Issuer failures.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// The configured key is not an RSA private key in PEM form.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    /// Encoding or signing failed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by first-party access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Tenant ID.
    pub tenant_id: String,
    /// Role inside the tenant.
    pub role: Role,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    /// Compact JWS.
    pub token: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Signs first-party access tokens.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    kid: String,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    jwks: JwkSet,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("kid", &self.kid)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Builds an issuer from a PKCS#8 (or PKCS#1) PEM private key.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::InvalidKey`] if the PEM is not an RSA private key.
    pub fn from_pem(
        pem: &str,
        kid: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_ttl_secs: u64,
    ) -> Result<Self, IssuerError> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| IssuerError::InvalidKey(e.to_string()))?;
        let der = private
            .to_pkcs1_der()
            .map_err(|e| IssuerError::InvalidKey(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        let kid = kid.into();
        let jwk: Jwk = serde_json::from_value(json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
        }))
        .map_err(|e| IssuerError::InvalidKey(e.to_string()))?;

        Ok(Self {
            encoding_key,
            kid,
            issuer: issuer.into(),
            audience: audience.into(),
            access_ttl: Duration::seconds(i64::try_from(access_ttl_secs).unwrap_or(i64::MAX)),
            jwks: JwkSet { keys: vec![jwk] },
        })
    }

    /// Key id placed in every token header.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Value of the `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Value of the `aud` claim.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Public keys for `/.well-known/jwks.json`.
    #[must_use]
    pub fn public_jwks(&self) -> &JwkSet {
        &self.jwks
    }

    /// Signs an access token for a user of `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::Signing`] if encoding fails.
    pub fn issue_access_token(
        &self,
        subject: &str,
        tenant: TenantId,
        role: Role,
        email: Option<&str>,
    ) -> Result<IssuedAccessToken, IssuerError> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            sub: subject.to_string(),
            tenant_id: tenant.to_string(),
            role,
            email: email.map(str::to_string),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = self.sign_claims(&claims)?;
        Ok(IssuedAccessToken {
            token,
            expires_at,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Signs arbitrary claims under this issuer's key and `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`IssuerError::Signing`] if the claims cannot be encoded.
    pub fn sign_claims<T: Serialize>(&self, claims: &T) -> Result<String, IssuerError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).map_err(|e| IssuerError::Signing(e.to_string()))
    }
}
