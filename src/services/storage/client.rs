//! Storage client bound to one bucket.
//!
//! Reads that sit on hot paths (`exists`, `list_files`) favor availability:
//! backend failures are logged and degrade to `false`/empty. Writes, downloads,
//! metadata and signed URLs favor correctness and return [`StorageError`].
//! No call is retried.

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::credentials::Credentials;
use super::error::{BackendError, ConfigurationError, StorageError};
use super::factory::StorageFactory;
use super::traits::{BoxedBucketStore, BoxedObjectStore, BucketStore, StorageHandles};
use super::types::{
    BucketInfo, Lookup, ObjectInfo, ObjectMetadata, SignedUrlRequest, StorageConfig, StorageType,
};

/// Read/write client for a single bucket.
///
/// Handles are created once at construction and never rebuilt. The client
/// adds no locking; concurrent callers share the backend's own connection
/// handling.
///
/// # Example
///
/// ```ignore
/// let client = StorageClient::new(&config, Credentials::s3_from_env()?)?;
///
/// client.upload_blob(b"hello".to_vec(), "greetings/hello.txt").await?;
/// let url = client.signed_url("greetings/hello.txt").await?;
/// ```
pub struct StorageClient {
    provider: StorageType,
    bucket: String,
    endpoint: Option<String>,
    region: Option<String>,
    store: BoxedObjectStore,
    buckets: Option<BoxedBucketStore>,
}

impl StorageClient {
    /// Build a client from configuration. Never contacts the backend.
    pub fn new(config: &StorageConfig, credentials: Credentials) -> Result<Self, ConfigurationError> {
        Ok(Self::from_handles(StorageFactory::create(config, credentials)?))
    }

    /// Build a client around existing handles.
    pub fn from_handles(handles: StorageHandles) -> Self {
        let StorageHandles {
            client,
            resource,
            endpoint,
            region,
        } = handles;

        Self {
            provider: client.storage_type(),
            bucket: client.bucket().to_string(),
            endpoint,
            region,
            store: client,
            buckets: resource,
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket
    }

    pub fn provider(&self) -> StorageType {
        self.provider
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Full URI of an object in this bucket.
    pub fn object_uri(&self, key: &str) -> String {
        self.store.object_uri(key)
    }

    /// Check whether any object exists under `key`.
    ///
    /// Never fails: backend errors are logged and reported as `false`.
    pub async fn exists(&self, key: &str) -> bool {
        self.probe(key).await.is_found()
    }

    /// Existence check that keeps "absent" and "unreachable" apart.
    pub async fn probe(&self, key: &str) -> Lookup {
        if key.is_empty() {
            debug!(bucket = %self.bucket, "Existence check with empty key");
            return Lookup::Absent;
        }

        match self.store.list(key).await {
            Ok(objects) if !objects.is_empty() => Lookup::Found,
            Ok(_) => Lookup::Absent,
            Err(err) if err.is_not_found() => {
                debug!(bucket = %self.bucket, key = %key, "Bucket missing, key is absent");
                Lookup::Absent
            }
            Err(err) => {
                info!(
                    bucket = %self.bucket,
                    key = %key,
                    error = %err,
                    "Existence check failed, treating key as absent"
                );
                Lookup::Unreachable(err)
            }
        }
    }

    /// Upload a local file. The key defaults to the file's base name.
    ///
    /// Returns `Ok(false)` without contacting the backend when the path is
    /// not an existing file.
    pub async fn upload_file(
        &self,
        local_path: impl AsRef<Path>,
        key: Option<&str>,
    ) -> Result<bool, StorageError> {
        let local_path = local_path.as_ref();

        let is_file = async_fs::metadata(local_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            debug!(path = %local_path.display(), "Upload source does not exist");
            return Ok(false);
        }

        let key = match key {
            Some(key) => key.to_string(),
            None => match local_path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => return Ok(false),
            },
        };

        self.store
            .put_file(&key, local_path)
            .await
            .map_err(|source| StorageError::Upload {
                key: key.clone(),
                source,
            })?;

        info!(bucket = %self.bucket, key = %key, "File uploaded");
        Ok(true)
    }

    /// Upload an in-memory payload under `key`.
    pub async fn upload_blob(&self, payload: impl Into<Bytes>, key: &str) -> Result<(), StorageError> {
        let payload = payload.into();
        let size = payload.len();

        self.store
            .put(key, payload)
            .await
            .map_err(|source| StorageError::Upload {
                key: key.to_string(),
                source,
            })?;

        debug!(bucket = %self.bucket, key = %key, size, "Blob uploaded");
        Ok(())
    }

    /// Download an object's bytes.
    pub async fn download_blob(&self, key: &str) -> Result<Bytes, StorageError> {
        let data = self
            .store
            .get(key)
            .await
            .map_err(|source| StorageError::Download {
                key: key.to_string(),
                source,
            })?;

        debug!(bucket = %self.bucket, key = %key, size = data.len(), "Blob downloaded");
        Ok(data)
    }

    /// Issue a time-limited URL for an object.
    ///
    /// Any failure is logged and reported with a generic message; the backend
    /// error stays available as the error source.
    pub async fn get_signed_url(&self, request: &SignedUrlRequest) -> Result<String, StorageError> {
        match self.store.presign(request).await {
            Ok(url) => {
                debug!(
                    bucket = %self.bucket,
                    key = %request.key,
                    method = ?request.method,
                    expires_in = request.expiry.as_secs(),
                    "Signed URL issued"
                );
                Ok(url)
            }
            Err(source) => {
                error!(
                    bucket = %self.bucket,
                    key = %request.key,
                    error = %source,
                    "Failed to sign URL"
                );
                Err(StorageError::SignedUrl {
                    key: request.key.clone(),
                    source,
                })
            }
        }
    }

    /// GET URL valid for 24 hours.
    pub async fn signed_url(&self, key: &str) -> Result<String, StorageError> {
        self.get_signed_url(&SignedUrlRequest::new(key)).await
    }

    /// Fetch all metadata fields of an object. Never cached.
    pub async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        self.store
            .head(key)
            .await
            .map_err(|source| StorageError::Metadata {
                key: key.to_string(),
                source,
            })
    }

    /// Fetch one metadata field. `None` when the backend does not report it.
    pub async fn get_metadata(&self, key: &str, field: &str) -> Result<Option<String>, StorageError> {
        let metadata = self.head_object(key).await?;
        Ok(metadata.get(field).map(str::to_string))
    }

    /// Create the bucket unless it already exists; return its creation time.
    pub async fn create_bucket_if_absent(&self) -> Result<DateTime<Utc>, StorageError> {
        let buckets = self.resource("create_bucket")?;

        let mut existing = self.find_bucket(buckets).await?;
        if existing.is_none() {
            buckets
                .create_bucket(&self.bucket)
                .await
                .map_err(|source| self.bucket_error("create_bucket", source))?;
            info!(bucket = %self.bucket, provider = %self.provider, "Created bucket");
            existing = self.find_bucket(buckets).await?;
        }

        existing
            .and_then(|bucket| bucket.created)
            .ok_or_else(|| {
                self.bucket_error(
                    "create_bucket",
                    BackendError::NotFound {
                        key: self.bucket.clone(),
                    },
                )
            })
    }

    /// Delete every object in the bucket, then the bucket itself.
    ///
    /// Irreversible; meant for test environments. A missing bucket is a no-op.
    pub async fn delete_bucket(&self) -> Result<(), StorageError> {
        let buckets = self.resource("delete_bucket")?;

        if self.find_bucket(buckets).await?.is_none() {
            debug!(bucket = %self.bucket, "Bucket absent, nothing to delete");
            return Ok(());
        }

        let keys = self.try_list_files(None).await?;
        for key in &keys {
            self.store
                .delete(key)
                .await
                .map_err(|source| self.bucket_error("delete_object", source))?;
        }

        buckets
            .delete_bucket(&self.bucket)
            .await
            .map_err(|source| self.bucket_error("delete_bucket", source))?;

        info!(bucket = %self.bucket, objects = keys.len(), "Deleted bucket");
        Ok(())
    }

    /// Keys under `prefix` in backend order; empty on any failure.
    pub async fn list_files(&self, prefix: Option<&str>) -> Vec<String> {
        self.try_list_files(prefix).await.unwrap_or_else(|err| {
            info!(bucket = %self.bucket, error = %err, "Listing failed, returning no keys");
            Vec::new()
        })
    }

    /// Keys under `prefix`, reporting backend failures.
    pub async fn try_list_files(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        Ok(self
            .try_list_objects(prefix)
            .await?
            .into_iter()
            .map(|object| object.key)
            .collect())
    }

    /// Listing entries under `prefix`; empty on any failure.
    pub async fn list_objects(&self, prefix: Option<&str>) -> Vec<ObjectInfo> {
        self.try_list_objects(prefix).await.unwrap_or_else(|err| {
            info!(bucket = %self.bucket, error = %err, "Listing failed, returning no objects");
            Vec::new()
        })
    }

    async fn try_list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, StorageError> {
        let prefix = prefix.unwrap_or_default();
        self.store
            .list(prefix)
            .await
            .map_err(|source| StorageError::Listing {
                prefix: prefix.to_string(),
                source,
            })
    }

    fn resource(&self, operation: &'static str) -> Result<&dyn BucketStore, StorageError> {
        self.buckets
            .as_deref()
            .ok_or_else(|| self.bucket_error(operation, BackendError::Unsupported { operation }))
    }

    async fn find_bucket(&self, buckets: &dyn BucketStore) -> Result<Option<BucketInfo>, StorageError> {
        let listed = buckets
            .list_buckets()
            .await
            .map_err(|source| self.bucket_error("list_buckets", source))?;
        Ok(listed.into_iter().find(|bucket| bucket.name == self.bucket))
    }

    fn bucket_error(&self, operation: &'static str, source: BackendError) -> StorageError {
        StorageError::Bucket {
            bucket: self.bucket.clone(),
            operation,
            source,
        }
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("provider", &self.provider)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::types::StorageParams;

    fn local_client(root: &Path, bucket: &str) -> StorageClient {
        let config = StorageConfig::new(
            "local",
            StorageType::LocalFs,
            Some(bucket.to_string()),
            StorageParams::local_fs(root.to_path_buf()),
        );
        StorageClient::new(&config, Credentials::Anonymous).unwrap()
    }

    #[test]
    fn test_identity_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let client = local_client(dir.path(), "media");

        assert_eq!(client.bucket_name(), "media");
        assert_eq!(client.provider(), StorageType::LocalFs);
        assert_eq!(client.endpoint(), None);
        assert_eq!(client.region(), None);
    }

    #[tokio::test]
    async fn test_empty_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let client = local_client(dir.path(), "media");
        client.upload_blob(b"x".to_vec(), "anything").await.unwrap();

        assert!(matches!(client.probe("").await, Lookup::Absent));
        assert!(!client.exists("").await);
    }

    #[tokio::test]
    async fn test_upload_file_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let client = local_client(dir.path(), "media");

        let uploaded = client
            .upload_file(dir.path().join("does-not-exist.bin"), None)
            .await
            .unwrap();
        assert!(!uploaded);
        assert!(client.list_files(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_file_with_explicit_key() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("photo.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();
        let client = local_client(&dir.path().join("buckets"), "media");

        assert!(client.upload_file(&source, Some("albums/1/cover.jpg")).await.unwrap());
        assert!(client.exists("albums/1/cover.jpg").await);
        assert!(!client.exists("photo.jpg").await);
    }
}
