//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Token verification and signing configuration.
    pub auth: AuthConfig,
    /// Session (refresh token) configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL for the application role (subject to RLS).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a free connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    5
}

/// Token verification and first-party signing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    /// Namespace used by providers that prefix custom claims with a URL.
    #[serde(default)]
    pub claim_namespace: Option<String>,
    /// JWKS endpoint of an external issuer. When unset, tokens are verified
    /// against the first-party signing key.
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// How long fetched keys are trusted before a proactive refresh.
    #[serde(default = "default_jwks_ttl")]
    pub jwks_ttl_secs: u64,
    /// Upper bound on a single JWKS fetch.
    #[serde(default = "default_jwks_fetch_timeout")]
    pub jwks_fetch_timeout_secs: u64,
    /// PKCS#8 PEM RSA private key used to sign first-party access tokens.
    pub signing_key_pem: String,
    /// `kid` published for the signing key.
    #[serde(default = "default_signing_kid")]
    pub signing_kid: String,
}

fn default_jwks_ttl() -> u64 {
    3600
}

fn default_jwks_fetch_timeout() -> u64 {
    10
}

fn default_signing_kid() -> String {
    "ragvault-1".to_string()
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: u64,
    /// Seconds after a rotation in which presenting the old refresh token is
    /// treated as a concurrent refresh instead of reuse.
    #[serde(default = "default_reuse_grace")]
    pub reuse_grace_secs: u64,
    /// Name of the refresh cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Path attribute of the refresh cookie.
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
    /// Whether the refresh cookie carries `Secure`.
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
            reuse_grace_secs: default_reuse_grace(),
            cookie_name: default_cookie_name(),
            cookie_path: default_cookie_path(),
            cookie_secure: default_cookie_secure(),
        }
    }
}

fn default_access_ttl() -> u64 {
    900 // 15 minutes
}

fn default_refresh_ttl() -> u64 {
    1_209_600 // 14 days
}

fn default_reuse_grace() -> u64 {
    10
}

fn default_cookie_name() -> String {
    "rv_refresh".to_string()
}

fn default_cookie_path() -> String {
    "/api/v1/auth".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend: `fs`, `s3` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// Root directory for the `fs` backend.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Bucket for the `s3` backend.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Region for the `s3` backend.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint (MinIO, R2).
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            root: default_storage_root(),
            bucket: None,
            region: None,
            endpoint: None,
        }
    }
}

fn default_storage_backend() -> String {
    "fs".to_string()
}

fn default_storage_root() -> String {
    "./data/uploads".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("RAGVAULT").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required_env() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("RUN_MODE", Some("config-test-nonexistent")),
            ("RAGVAULT__DATABASE__URL", Some("postgres://app@localhost/ragvault")),
            ("RAGVAULT__AUTH__ISSUER", Some("https://auth.example.com")),
            ("RAGVAULT__AUTH__AUDIENCE", Some("ragvault-api")),
            ("RAGVAULT__AUTH__SIGNING_KEY_PEM", Some("pem")),
        ]
    }

    #[test]
    fn test_load_applies_defaults() {
        temp_env::with_vars(required_env(), || {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.server.max_upload_bytes, 50 * 1024 * 1024);
            assert_eq!(config.auth.jwks_ttl_secs, 3600);
            assert_eq!(config.auth.jwks_fetch_timeout_secs, 10);
            assert_eq!(config.session.cookie_name, "rv_refresh");
            assert_eq!(config.session.reuse_grace_secs, 10);
            assert_eq!(config.session.cookie_path, "/api/v1/auth");
            assert!(config.session.cookie_secure);
            assert!(!config.log.json);
            assert!(config.auth.jwks_url.is_none());
        });
    }

    #[test]
    fn test_load_reads_nested_env_overrides() {
        let mut vars = required_env();
        vars.push(("RAGVAULT__SERVER__PORT", Some("9090")));
        vars.push(("RAGVAULT__SESSION__COOKIE_SECURE", Some("false")));
        vars.push(("RAGVAULT__AUTH__CLAIM_NAMESPACE", Some("https://ragvault.io")));
        temp_env::with_vars(vars, || {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.server.port, 9090);
            assert!(!config.session.cookie_secure);
            assert_eq!(
                config.auth.claim_namespace.as_deref(),
                Some("https://ragvault.io")
            );
        });
    }

    #[test]
    fn test_load_fails_without_database_url() {
        temp_env::with_vars(
            [
                ("RUN_MODE", Some("config-test-nonexistent")),
                ("RAGVAULT__DATABASE__URL", None),
                ("RAGVAULT__AUTH__ISSUER", Some("https://auth.example.com")),
                ("RAGVAULT__AUTH__AUDIENCE", Some("ragvault-api")),
                ("RAGVAULT__AUTH__SIGNING_KEY_PEM", Some("pem")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
