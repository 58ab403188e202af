//! Object store and its tenant-scoped view.

use bytes::Bytes;
use opendal::{ErrorKind, Operator, services};
use ragvault_shared::types::TenantId;
use tracing::debug;

use super::config::StorageProvider;
use super::error::StorageError;

/// Prefix owned by a tenant: `tenants/<tenant_id>/`.
#[must_use]
pub fn tenant_prefix(tenant: TenantId) -> String {
    format!("tenants/{tenant}/")
}

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Full storage key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
}

/// Shared handle to the configured backend.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    operator: Operator,
    provider: &'static str,
}

impl ObjectStore {
    /// Creates the store for `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialised.
    pub fn from_provider(provider: &StorageProvider) -> Result<Self, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                bucket,
                region,
                endpoint,
            } => {
                let mut builder = services::S3::default().bucket(bucket).region(region);
                if let Some(endpoint) = endpoint {
                    builder = builder.endpoint(endpoint);
                }
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::LocalFs { root } => {
                let root = root
                    .to_str()
                    .ok_or_else(|| StorageError::configuration("invalid path"))?;
                Operator::new(services::Fs::default().root(root))
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::Memory => Operator::new(services::Memory::default())
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish(),
        };

        Ok(Self {
            operator,
            provider: provider.name(),
        })
    }

    /// In-memory store for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory backend cannot be built.
    pub fn memory() -> Result<Self, StorageError> {
        Self::from_provider(&StorageProvider::Memory)
    }

    /// Provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider
    }

    /// View of the store limited to one tenant's prefix.
    #[must_use]
    pub fn for_tenant(&self, tenant: TenantId) -> TenantStorage {
        TenantStorage {
            operator: self.operator.clone(),
            tenant,
            prefix: tenant_prefix(tenant),
        }
    }
}

/// Object storage confined to `tenants/<tenant_id>/`.
#[derive(Debug, Clone)]
pub struct TenantStorage {
    operator: Operator,
    tenant: TenantId,
    prefix: String,
}

impl TenantStorage {
    /// Tenant this view is bound to.
    #[must_use]
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// Prefix prepended to every key.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full key for a tenant-relative key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for empty or absolute keys,
    /// backslashes, and `.`/`..`/empty path segments.
    pub fn full_key(&self, relative: &str) -> Result<String, StorageError> {
        validate_relative_key(relative)?;
        Ok(format!("{}{relative}", self.prefix))
    }

    /// Tenant-relative part of a full key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is outside this tenant.
    pub fn relative_key<'a>(&self, full: &'a str) -> Result<&'a str, StorageError> {
        let relative = full
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| StorageError::invalid_key("key is outside the tenant prefix"))?;
        validate_relative_key(relative)?;
        Ok(relative)
    }

    /// Writes an object.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid key or a backend failure.
    pub async fn write(&self, relative: &str, content: Bytes) -> Result<ObjectMetadata, StorageError> {
        let key = self.full_key(relative)?;
        let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
        self.operator.write(&key, content).await?;
        debug!(tenant_id = %self.tenant, key = %key, size, "object written");
        Ok(ObjectMetadata { key, size })
    }

    /// Reads an object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if it does not exist.
    pub async fn read(&self, relative: &str) -> Result<Bytes, StorageError> {
        let key = self.full_key(relative)?;
        Ok(self.operator.read(&key).await?.to_bytes())
    }

    /// Deletes an object. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid key or a backend failure.
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let key = self.full_key(relative)?;
        self.operator.delete(&key).await?;
        Ok(())
    }

    /// Whether an object exists.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid key or a backend failure other than
    /// "not found".
    pub async fn exists(&self, relative: &str) -> Result<bool, StorageError> {
        let key = self.full_key(relative)?;
        match self.operator.stat(&key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_relative_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::invalid_key("key is empty"));
    }
    if key.starts_with('/') {
        return Err(StorageError::invalid_key("key must be relative"));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StorageError::invalid_key("key contains a forbidden character"));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::invalid_key("key contains an empty or relative segment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn storage() -> TenantStorage {
        ObjectStore::memory().unwrap().for_tenant(TenantId::new())
    }

    #[rstest]
    #[case("")]
    #[case("/etc/passwd")]
    #[case("../other-tenant/documents/x.pdf")]
    #[case("documents/../../x")]
    #[case("documents//x")]
    #[case("./x")]
    #[case("documents\\x")]
    #[case("documents/")]
    fn test_rejects_escaping_keys(#[case] key: &str) {
        assert!(matches!(storage().full_key(key), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_full_key_is_prefixed() {
        let storage = storage();
        let key = storage.full_key("documents/a.pdf").unwrap();
        assert_eq!(key, format!("tenants/{}/documents/a.pdf", storage.tenant()));
        assert_eq!(storage.relative_key(&key).unwrap(), "documents/a.pdf");
    }

    #[test]
    fn test_relative_key_rejects_other_tenant() {
        let store = ObjectStore::memory().unwrap();
        let a = store.for_tenant(TenantId::new());
        let b = store.for_tenant(TenantId::new());
        let key = a.full_key("documents/a.pdf").unwrap();
        assert!(b.relative_key(&key).is_err());
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let storage = storage();
        let meta = storage
            .write("documents/a.txt", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(meta.size, 5);
        assert!(meta.key.starts_with(storage.prefix()));

        assert!(storage.exists("documents/a.txt").await.unwrap());
        assert_eq!(storage.read("documents/a.txt").await.unwrap(), Bytes::from_static(b"hello"));

        storage.delete("documents/a.txt").await.unwrap();
        assert!(!storage.exists("documents/a.txt").await.unwrap());
        assert!(matches!(
            storage.read("documents/a.txt").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_tenants_do_not_see_each_other() {
        let store = ObjectStore::memory().unwrap();
        let a = store.for_tenant(TenantId::new());
        let b = store.for_tenant(TenantId::new());
        a.write("documents/x.txt", Bytes::from_static(b"a")).await.unwrap();
        assert!(!b.exists("documents/x.txt").await.unwrap());
    }

    proptest! {
        #[test]
        fn prop_valid_keys_stay_under_prefix(segments in prop::collection::vec("[a-zA-Z0-9_-][a-zA-Z0-9._-]{0,15}", 1..5)) {
            let storage = storage();
            let relative = segments.join("/");
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));
            let key = storage.full_key(&relative).unwrap();
            prop_assert!(key.starts_with(storage.prefix()));
            prop_assert!(!key.contains("/../"));
        }
    }
}
