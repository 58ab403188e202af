//! Provider-specific claim lookup.
//!
//! Identity providers put the tenant and role in different places: Cognito
//! uses `custom:` attributes and `cognito:groups`, Auth0 requires namespaced
//! claims, first-party tokens use plain names. [`ClaimRules`] holds the lookup
//! order for each value; the first present, non-empty claim wins.

use ragvault_shared::Role;
use serde_json::{Map, Value};
use tracing::warn;

/// Where to look for one claim value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimSource {
    /// A string claim with this exact name.
    Named(String),
    /// The first element of an array-of-strings claim with this name.
    FirstOf(String),
}

impl ClaimSource {
    fn lookup<'a>(&self, claims: &'a Map<String, Value>) -> Option<&'a str> {
        let value = match self {
            Self::Named(name) => claims.get(name)?,
            Self::FirstOf(name) => claims.get(name)?.as_array()?.first()?,
        };
        value.as_str().filter(|s| !s.trim().is_empty())
    }
}

/// Ordered lookup rules for the tenant and role claims.
#[derive(Debug, Clone)]
pub struct ClaimRules {
    tenant: Vec<ClaimSource>,
    role: Vec<ClaimSource>,
}

impl ClaimRules {
    /// Builds the default rules, optionally including `<namespace>/...` claims.
    #[must_use]
    pub fn new(namespace: Option<&str>) -> Self {
        let namespace = namespace
            .map(|ns| ns.trim_end_matches('/'))
            .filter(|ns| !ns.is_empty());

        let mut tenant = vec![ClaimSource::Named("custom:tenant_id".into())];
        let mut role = vec![ClaimSource::Named("custom:role".into())];
        if let Some(ns) = namespace {
            tenant.push(ClaimSource::Named(format!("{ns}/tenant_id")));
            role.push(ClaimSource::Named(format!("{ns}/role")));
        }
        tenant.push(ClaimSource::Named("tenant_id".into()));
        role.push(ClaimSource::Named("role".into()));
        role.push(ClaimSource::FirstOf("cognito:groups".into()));

        Self { tenant, role }
    }

    /// Tenant lookup order.
    #[must_use]
    pub fn tenant_sources(&self) -> &[ClaimSource] {
        &self.tenant
    }

    /// Role lookup order.
    #[must_use]
    pub fn role_sources(&self) -> &[ClaimSource] {
        &self.role
    }

    /// Raw tenant claim, unparsed.
    #[must_use]
    pub fn tenant<'a>(&self, claims: &'a Map<String, Value>) -> Option<&'a str> {
        self.tenant.iter().find_map(|source| source.lookup(claims))
    }

    /// Effective role. Missing or unrecognised values fall back to [`Role::Viewer`].
    #[must_use]
    pub fn role(&self, claims: &Map<String, Value>) -> Role {
        let Some(raw) = self.role.iter().find_map(|source| source.lookup(claims)) else {
            return Role::default();
        };
        raw.parse().unwrap_or_else(|_| {
            warn!(role = %raw, "unrecognised role claim, using least privilege");
            Role::default()
        })
    }
}

impl Default for ClaimRules {
    fn default() -> Self {
        Self::new(None)
    }
}
