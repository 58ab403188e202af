//! Request middleware and extractors.

pub mod auth;
pub mod cookies;

pub use auth::{AuthUser, auth_middleware, require_role};
pub use cookies::CookieSettings;
