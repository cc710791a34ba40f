//! Read-only storage client.
//!
//! For credentials that may only enumerate and download, such as a discovery
//! service account. There are no mutating operations; the only sanctioned way
//! to validate credentials is [`ReadOnlyStorageClient::verify_bucket_access`].

use bytes::Bytes;
use tracing::{info, warn};

use super::credentials::Credentials;
use super::error::{ConfigurationError, StorageError};
use super::factory::StorageFactory;
use super::traits::BoxedObjectStore;
use super::types::{ObjectInfo, ObjectMetadata, StorageConfig, StorageType};

/// Prefix listed by [`ReadOnlyStorageClient::verify_bucket_access`] by default.
pub const DEFAULT_PROBE_PREFIX: &str = "stats/installs";

/// Listing and download access to one bucket.
pub struct ReadOnlyStorageClient {
    store: BoxedObjectStore,
    probe_prefix: String,
}

impl ReadOnlyStorageClient {
    /// Build from configuration. Any resource handle the factory produces is
    /// discarded. Never contacts the backend.
    pub fn new(config: &StorageConfig, credentials: Credentials) -> Result<Self, ConfigurationError> {
        let handles = StorageFactory::create(config, credentials)?;
        Ok(Self::from_store(handles.client))
    }

    /// Wrap an existing object handle.
    pub fn from_store(store: BoxedObjectStore) -> Self {
        Self {
            store,
            probe_prefix: DEFAULT_PROBE_PREFIX.to_string(),
        }
    }

    /// Use a different prefix for the access probe.
    pub fn with_probe_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.probe_prefix = prefix.into();
        self
    }

    pub fn bucket_name(&self) -> &str {
        self.store.bucket()
    }

    pub fn provider(&self) -> StorageType {
        self.store.storage_type()
    }

    /// Probe the bucket by listing the probe prefix.
    ///
    /// True iff at least one object is returned. Never fails: credential,
    /// permission and network errors all yield `false`.
    pub async fn verify_bucket_access(&self) -> bool {
        match self.try_list_objects(&self.probe_prefix).await {
            Ok(objects) => !objects.is_empty(),
            Err(err) => {
                warn!(
                    bucket = %self.bucket_name(),
                    prefix = %self.probe_prefix,
                    error = %err,
                    "Bucket access validation failed"
                );
                false
            }
        }
    }

    /// Keys under `prefix`; empty on any failure.
    pub async fn list_files(&self, prefix: Option<&str>) -> Vec<String> {
        self.list_objects(prefix)
            .await
            .into_iter()
            .map(|object| object.key)
            .collect()
    }

    /// Entries under `prefix` with their timestamps; empty on any failure.
    pub async fn list_objects(&self, prefix: Option<&str>) -> Vec<ObjectInfo> {
        match self.try_list_objects(prefix.unwrap_or_default()).await {
            Ok(objects) => {
                info!(
                    bucket = %self.bucket_name(),
                    count = objects.len(),
                    "Detected files in bucket"
                );
                objects
            }
            Err(err) => {
                info!(
                    bucket = %self.bucket_name(),
                    error = %err,
                    "Listing failed, returning no objects"
                );
                Vec::new()
            }
        }
    }

    /// Object metadata without the body.
    pub async fn download_headers(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        self.store
            .head(key)
            .await
            .map_err(|source| StorageError::Metadata {
                key: key.to_string(),
                source,
            })
    }

    /// Full object bytes.
    pub async fn download_blob(&self, key: &str) -> Result<Bytes, StorageError> {
        self.store
            .get(key)
            .await
            .map_err(|source| StorageError::Download {
                key: key.to_string(),
                source,
            })
    }

    async fn try_list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        // Listings carry only names and timestamps.
        let objects = self
            .store
            .list(prefix)
            .await
            .map_err(|source| StorageError::Listing {
                prefix: prefix.to_string(),
                source,
            })?;

        Ok(objects
            .into_iter()
            .map(|object| ObjectInfo {
                created: object.created,
                updated: object.updated,
                ..ObjectInfo::new(object.key)
            })
            .collect())
    }
}

impl std::fmt::Debug for ReadOnlyStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyStorageClient")
            .field("provider", &self.provider())
            .field("bucket", &self.bucket_name())
            .field("probe_prefix", &self.probe_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::types::StorageParams;

    fn local_reader(root: &std::path::Path) -> ReadOnlyStorageClient {
        let config = StorageConfig::new(
            "reader",
            StorageType::LocalFs,
            Some("events".to_string()),
            StorageParams::local_fs(root.to_path_buf()),
        );
        ReadOnlyStorageClient::new(&config, Credentials::Anonymous).unwrap()
    }

    #[tokio::test]
    async fn test_verify_bucket_access_requires_probe_objects() {
        let dir = tempfile::tempdir().unwrap();
        let reader = local_reader(dir.path());
        assert!(!reader.verify_bucket_access().await);

        let installs = dir.path().join("events/stats/installs");
        std::fs::create_dir_all(&installs).unwrap();
        std::fs::write(installs.join("2024-01-01.csv"), b"day,count\n").unwrap();
        assert!(reader.verify_bucket_access().await);

        let reader = reader.with_probe_prefix("stats/uninstalls");
        assert!(!reader.verify_bucket_access().await);
    }

    #[tokio::test]
    async fn test_listing_is_limited_to_names_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let reader = local_reader(dir.path());
        let bucket = dir.path().join("events");
        std::fs::create_dir_all(&bucket).unwrap();
        std::fs::write(bucket.join("a.json"), b"{}").unwrap();

        let objects = reader.list_objects(None).await;
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "a.json");
        assert_eq!(objects[0].size, None);
        assert_eq!(objects[0].etag, None);
        assert!(objects[0].created.is_some());
        assert!(objects[0].updated.is_some());

        assert_eq!(reader.list_files(Some("b")).await, Vec::<String>::new());
        assert_eq!(
            reader.download_blob("a.json").await.unwrap(),
            Bytes::from_static(b"{}")
        );
        assert_eq!(
            reader.download_headers("a.json").await.unwrap().get("size"),
            Some("2")
        );
        assert!(reader.download_blob("missing.json").await.unwrap_err().is_not_found());
    }
}
