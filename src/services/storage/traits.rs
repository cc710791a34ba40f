//! Storage capability traits.
//!
//! [`ObjectStore`] is the low-level operational handle used for object calls
//! (put/get/head/list/presign). [`BucketStore`] is the resource handle used
//! for bucket lifecycle calls. The storage clients depend only on these
//! traits, so any backend (or a test double) can stand behind them.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::BackendError;
use super::types::{BucketInfo, ObjectInfo, ObjectMetadata, SignedUrlRequest, StorageType};

/// Object-level operations against one bucket.
///
/// Each method is a single backend round trip (listings may page internally).
/// Implementations must not validate credentials at construction; the first
/// call reports them.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get the storage type for this handle.
    fn storage_type(&self) -> StorageType;

    /// The bucket every call targets.
    fn bucket(&self) -> &str;

    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BackendError>;

    /// Store the contents of a local file under `key`.
    ///
    /// The default buffers the whole file; backends that can stream override it.
    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), BackendError> {
        let data = async_fs::read(local_path).await?;
        self.put(key, Bytes::from(data)).await
    }

    /// Read the full object.
    async fn get(&self, key: &str) -> Result<Bytes, BackendError>;

    /// Fetch object metadata without the body.
    async fn head(&self, key: &str) -> Result<ObjectMetadata, BackendError>;

    /// List objects whose key starts with `prefix` (empty lists everything).
    ///
    /// Only objects are returned, never directory markers.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, BackendError>;

    /// Delete one object.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Produce a time-limited URL for `request.key`.
    async fn presign(&self, request: &SignedUrlRequest) -> Result<String, BackendError>;

    /// Full URI of an object (e.g. `s3://bucket/path/to/object`).
    fn object_uri(&self, key: &str) -> String {
        format!(
            "{}://{}/{}",
            self.storage_type().scheme(),
            self.bucket(),
            key.trim_start_matches('/')
        )
    }
}

/// Bucket lifecycle operations for an account.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// List all buckets visible to the credentials.
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BackendError>;

    /// Create a bucket.
    async fn create_bucket(&self, name: &str) -> Result<(), BackendError>;

    /// Remove a bucket. The bucket must already be emptied of objects.
    async fn delete_bucket(&self, name: &str) -> Result<(), BackendError>;
}

/// A boxed object store for dynamic dispatch.
pub type BoxedObjectStore = Box<dyn ObjectStore>;

/// A boxed bucket store for dynamic dispatch.
pub type BoxedBucketStore = Box<dyn BucketStore>;

/// The handles produced by [`super::StorageFactory`] for one backend identity.
pub struct StorageHandles {
    /// Operational handle for object calls.
    pub client: BoxedObjectStore,
    /// Resource handle for bucket calls; `None` when the backend offers no
    /// bucket lifecycle.
    pub resource: Option<BoxedBucketStore>,
    /// Endpoint the handles talk to, when not the provider default.
    pub endpoint: Option<String>,
    /// Region the handles are bound to.
    pub region: Option<String>,
}

impl StorageHandles {
    /// Pair an object store with an optional bucket store.
    pub fn new(client: BoxedObjectStore, resource: Option<BoxedBucketStore>) -> Self {
        Self {
            client,
            resource,
            endpoint: None,
            region: None,
        }
    }
}

impl std::fmt::Debug for StorageHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandles")
            .field("provider", &self.client.storage_type())
            .field("bucket", &self.client.bucket())
            .field("has_resource", &self.resource.is_some())
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}
