//! Authentication.
//!
//! This module provides:
//! - [`jwks::KeyCache`]: issuer keys with single-flight refresh
//! - [`verifier::TokenVerifier`]: RS256 access token verification
//! - [`issuer::TokenIssuer`]: first-party access tokens and their JWKS
//! - [`session::SessionService`]: login, refresh rotation, logout
//! - Password hashing with Argon2id

pub mod claims;
pub mod issuer;
pub mod jwks;
pub mod memory;
mod password;
pub mod session;
pub mod store;
pub mod verifier;

pub use claims::{ClaimRules, ClaimSource};
pub use issuer::{IssuerError, TokenIssuer};
pub use jwks::{CacheState, HttpKeySource, KeyCache, KeyCacheStats, KeySource, StaticKeySource};
pub use password::{PasswordError, burn_verification_time, hash_password, verify_password};
pub use session::{IssuedSession, LoginInput, SessionError, SessionService};
pub use store::{ClientInfo, RefreshTokenStore, StoreError, UserDirectory};
pub use verifier::{TokenRejection, TokenVerifier, VerifierConfig};
