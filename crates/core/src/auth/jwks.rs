//! JWKS key cache with single-flight refresh and serve-stale-on-error.
//!
//! ```text
//!   Empty ──fetch ok──▶ Populated ──ttl / unknown kid──▶ Refreshing
//!                                                         │      │
//!                                                  fetch ok    fetch failed
//!                                                         ▼      ▼
//!                                                  Populated   StaleFailed (old keys kept)
//! ```
//!
//! Reads take a shared lock and never wait on the network. Only one fetch is
//! ever in flight; every caller that needs fresh keys awaits that fetch.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::singleflight::SingleFlight;

/// Default time fetched keys are trusted.
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);
/// Default upper bound on one fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Minimum spacing between proactive refreshes after a failed one.
pub const FAILED_REFRESH_BACKOFF: Duration = Duration::from_secs(30);
/// Default minimum spacing between fetches started by an unknown `kid`.
pub const DEFAULT_MISS_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Failure to obtain a key set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyFetchError {
    /// Transport or HTTP status failure.
    #[error("key set request failed: {0}")]
    Http(String),
    /// The fetch did not finish in time.
    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The body was not a JWK set.
    #[error("key set is malformed: {0}")]
    Malformed(String),
    /// The set contained no RSA signing key with a `kid`.
    #[error("key set contains no usable signing keys")]
    NoUsableKeys,
    /// The fetch task died before producing a result.
    #[error("key set fetch aborted: {0}")]
    Aborted(String),
}

/// Somewhere a JWK set can be fetched from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetches the current key set.
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Fetches keys from an issuer's JWKS endpoint.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySource {
    /// Creates a source for `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Conventional JWKS location for an issuer.
    #[must_use]
    pub fn for_issuer(client: reqwest::Client, issuer: &str) -> Self {
        Self::new(
            client,
            format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/')),
        )
    }

    /// Endpoint this source fetches from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| KeyFetchError::Http(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeyFetchError::Malformed(e.to_string()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// An in-process key set, used for first-party tokens and in tests.
#[derive(Debug)]
pub struct StaticKeySource {
    keys: RwLock<JwkSet>,
}

impl StaticKeySource {
    /// Creates a source serving `keys`.
    #[must_use]
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: RwLock::new(keys),
        }
    }

    /// Replaces the served key set (key rotation).
    pub fn replace(&self, keys: JwkSet) {
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = keys;
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<JwkSet, KeyFetchError> {
        Ok(self.keys.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Lifecycle state of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No keys have ever been fetched.
    Empty,
    /// Keys are present and the last fetch succeeded.
    Populated,
    /// A fetch is in flight; previous keys remain readable.
    Refreshing,
    /// The last fetch failed; previous keys are still served.
    StaleFailed,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Populated => "populated",
            Self::Refreshing => "refreshing",
            Self::StaleFailed => "stale_failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCacheStats {
    /// Current state.
    pub state: CacheState,
    /// Number of cached keys.
    pub key_count: usize,
    /// Time since the last successful fetch.
    pub age: Option<Duration>,
    /// Time until a proactive refresh is due.
    pub ttl_remaining: Option<Duration>,
    /// Successful refreshes since start.
    pub refresh_count: u64,
    /// Message of the last failed fetch, cleared on success.
    pub last_error: Option<String>,
}

struct CacheInner {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
    failed_at: Option<Instant>,
    attempted_at: Option<Instant>,
    state: CacheState,
    last_error: Option<String>,
}

/// Reason a key could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no signing key with kid {kid}")]
pub struct UnknownKey {
    /// The requested key id.
    pub kid: String,
}

/// Read-mostly cache of issuer verification keys.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    inner: Arc<RwLock<CacheInner>>,
    flight: SingleFlight<(), Result<usize, KeyFetchError>>,
    refreshes: Arc<AtomicU64>,
    ttl: Duration,
    fetch_timeout: Duration,
    miss_refresh_interval: Duration,
}

impl fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCache")
            .field("source", &self.source.describe())
            .field("ttl", &self.ttl)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl KeyCache {
    /// Creates an empty cache with the default TTL and fetch timeout.
    #[must_use]
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        Self::with_settings(source, DEFAULT_KEY_TTL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates an empty cache.
    #[must_use]
    pub fn with_settings(source: Arc<dyn KeySource>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            source,
            inner: Arc::new(RwLock::new(CacheInner {
                keys: HashMap::new(),
                fetched_at: None,
                failed_at: None,
                attempted_at: None,
                state: CacheState::Empty,
                last_error: None,
            })),
            flight: SingleFlight::new(),
            refreshes: Arc::new(AtomicU64::new(0)),
            ttl,
            fetch_timeout,
            miss_refresh_interval: DEFAULT_MISS_REFRESH_INTERVAL,
        }
    }

    /// Sets the minimum spacing between fetches triggered by unknown key ids.
    #[must_use]
    pub fn with_miss_refresh_interval(mut self, interval: Duration) -> Self {
        self.miss_refresh_interval = interval;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CacheState {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Diagnostics snapshot.
    #[must_use]
    pub fn stats(&self) -> KeyCacheStats {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let age = inner.fetched_at.map(|at| at.elapsed());
        KeyCacheStats {
            state: inner.state,
            key_count: inner.keys.len(),
            age,
            ttl_remaining: age.map(|age| self.ttl.saturating_sub(age)),
            refresh_count: self.refreshes.load(Ordering::Relaxed),
            last_error: inner.last_error.clone(),
        }
    }

    /// Returns the key for `kid`, refreshing at most once if it is missing.
    ///
    /// Expired keys trigger a refresh first; if that refresh fails the stale
    /// keys are still used. A miss only starts a new fetch when the previous
    /// one began at least the miss refresh interval ago; otherwise it joins a
    /// fetch already in flight or fails straight away.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownKey`] when the key is absent even after a refresh.
    pub async fn resolve(&self, kid: &str) -> Result<DecodingKey, UnknownKey> {
        let mut refreshed = false;
        if self.is_expired() {
            refreshed = true;
            if let Err(e) = self.refresh_keys().await {
                warn!(error = %e, "proactive key refresh failed, serving stale keys");
            }
        }

        if let Some(key) = self.lookup(kid) {
            return Ok(key);
        }

        if !refreshed && self.miss_refresh_due() {
            debug!(kid, "signing key not cached, refreshing");
            if let Err(e) = self.refresh_keys().await {
                warn!(error = %e, kid, "key refresh after cache miss failed");
            }
            if let Some(key) = self.lookup(kid) {
                return Ok(key);
            }
        }

        Err(UnknownKey {
            kid: kid.to_string(),
        })
    }

    /// Fetches the key set and replaces the cache, sharing one fetch among
    /// concurrent callers. Returns the number of usable keys.
    ///
    /// On failure the previous keys stay in place.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure.
    pub async fn refresh_keys(&self) -> Result<usize, KeyFetchError> {
        let source = Arc::clone(&self.source);
        let inner = Arc::clone(&self.inner);
        let refreshes = Arc::clone(&self.refreshes);
        let timeout = self.fetch_timeout;

        self.flight
            .run((), move || fetch_and_install(source, inner, refreshes, timeout))
            .await
            .unwrap_or_else(|aborted| Err(KeyFetchError::Aborted(aborted.to_string())))
    }

    fn miss_refresh_due(&self) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let due = inner.state == CacheState::Refreshing
            || inner
                .attempted_at
                .is_none_or(|at| at.elapsed() >= self.miss_refresh_interval);
        if !due {
            debug!("unknown key id inside miss refresh interval, not fetching");
        }
        due
    }

    fn is_expired(&self) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let expired = inner.fetched_at.is_none_or(|at| at.elapsed() >= self.ttl);
        let backing_off = !inner.keys.is_empty()
            && inner
                .failed_at
                .is_some_and(|at| at.elapsed() < FAILED_REFRESH_BACKOFF);
        expired && !backing_off
    }

    fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys
            .get(kid)
            .cloned()
    }
}

async fn fetch_and_install(
    source: Arc<dyn KeySource>,
    inner: Arc<RwLock<CacheInner>>,
    refreshes: Arc<AtomicU64>,
    timeout: Duration,
) -> Result<usize, KeyFetchError> {
    {
        let mut guard = inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.state = CacheState::Refreshing;
        guard.attempted_at = Some(Instant::now());
    }

    let result = match tokio::time::timeout(timeout, source.fetch()).await {
        Ok(fetched) => fetched.and_then(|set| decoding_keys(&set)),
        Err(_) => Err(KeyFetchError::Timeout(timeout)),
    };

    let mut guard = inner.write().unwrap_or_else(PoisonError::into_inner);
    match result {
        Ok(keys) => {
            let count = keys.len();
            guard.keys = keys;
            guard.fetched_at = Some(Instant::now());
            guard.failed_at = None;
            guard.state = CacheState::Populated;
            guard.last_error = None;
            refreshes.fetch_add(1, Ordering::Relaxed);
            info!(source = %source.describe(), keys = count, "signing keys refreshed");
            Ok(count)
        }
        Err(e) => {
            guard.state = if guard.keys.is_empty() {
                CacheState::Empty
            } else {
                CacheState::StaleFailed
            };
            guard.failed_at = Some(Instant::now());
            guard.last_error = Some(e.to_string());
            warn!(source = %source.describe(), error = %e, "signing key refresh failed");
            Err(e)
        }
    }
}

fn decoding_keys(set: &JwkSet) -> Result<HashMap<String, DecodingKey>, KeyFetchError> {
    let mut keys = HashMap::new();
    for jwk in &set.keys {
        let Some(kid) = jwk.common.key_id.as_deref() else {
            debug!("skipping key without kid");
            continue;
        };
        if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
            debug!(kid, "skipping non-RSA key");
            continue;
        }
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                keys.insert(kid.to_string(), key);
            }
            Err(e) => warn!(kid, error = %e, "skipping undecodable key"),
        }
    }
    if keys.is_empty() {
        return Err(KeyFetchError::NoUsableKeys);
    }
    Ok(keys)
}

#[cfg(test)]
#[path = "jwks_tests.rs"]
mod tests;
