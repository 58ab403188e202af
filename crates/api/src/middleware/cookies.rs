//! Refresh token cookie.
//!
//! The refresh token never appears in a response body. It is set as an
//! `HttpOnly`, `SameSite=Strict` cookie scoped to the auth routes.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use ragvault_shared::config::SessionConfig;

/// Attributes of the refresh cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// `Path` attribute.
    pub path: String,
    /// Whether `Secure` is set.
    pub secure: bool,
    /// `Max-Age` in seconds.
    pub max_age_secs: i64,
}

impl CookieSettings {
    /// Builds the settings from session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            path: config.cookie_path.clone(),
            secure: config.cookie_secure,
            max_age_secs: i64::try_from(config.refresh_token_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Raw refresh token presented by the client, if any.
    #[must_use]
    pub fn read<'a>(&self, jar: &'a CookieJar) -> Option<&'a str> {
        jar.get(&self.name)
            .map(Cookie::value)
            .filter(|value| !value.is_empty())
    }

    /// Stores `token` in the jar.
    #[must_use]
    pub fn set(&self, jar: CookieJar, token: String) -> CookieJar {
        let cookie = Cookie::build((self.name.clone(), token))
            .path(self.path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.max_age_secs));
        jar.add(cookie)
    }

    /// Expires the cookie on the client.
    #[must_use]
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(self.name.clone()).path(self.path.clone()))
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
