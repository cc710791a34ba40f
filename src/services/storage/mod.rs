//! Object storage clients.
//!
//! A single client interface over several blob storage backends, built on
//! Apache OpenDAL for object operations:
//!
//! - **Amazon S3** and S3-compatible services (MinIO, Cloudflare R2)
//! - **Google Cloud Storage (GCS)** with service account credentials
//! - **Local Filesystem** for development and testing
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │      StorageClient       │   │  ReadOnlyStorageClient   │
//! │  read/write, lifecycle   │   │  list, download, probe   │
//! └──────────────────────────┘   └──────────────────────────┘
//!               │                              │
//!               └──────────────┬───────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    StorageFactory                           │
//! │  - Object handle (OpenDAL operator)                         │
//! │  - Resource handle for bucket lifecycle, where available    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┼───────────────┐
//!              ▼               ▼               ▼
//! ┌──────────────────┐ ┌──────────────┐ ┌────────────────────┐
//! │ S3Store          │ │  GcsStore    │ │ LocalFsStore       │
//! │ + S3Buckets      │ │ + JSON API   │ │ + DirectoryBuckets │
//! └──────────────────┘ └──────────────┘ └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cloudstore::services::storage::{
//!     Credentials, StorageClient, StorageConfig, StorageParams, StorageType,
//! };
//!
//! let config = StorageConfig::new(
//!     "uploads",
//!     StorageType::S3,
//!     None, // falls back to S3_BUCKET_NAME
//!     StorageParams::s3(None, Some("eu-west-1".to_string())),
//! );
//!
//! let client = StorageClient::new(&config, Credentials::s3_from_env()?)?;
//! client.upload_blob(b"{}".to_vec(), "reports/today.json").await?;
//!
//! for key in client.list_files(Some("reports/")).await {
//!     println!("{key}");
//! }
//! ```

mod client;
mod credentials;
mod error;
mod factory;
mod gcs;
mod local_fs;
mod operator;
mod read_only;
mod s3;
mod traits;
mod types;

pub use client::StorageClient;
pub use credentials::{Credentials, ServiceAccountKey};
pub use error::{BackendError, ConfigurationError, StorageError};
pub use factory::StorageFactory;
pub use read_only::{DEFAULT_PROBE_PREFIX, ReadOnlyStorageClient};
pub use traits::{BoxedBucketStore, BoxedObjectStore, BucketStore, ObjectStore, StorageHandles};
pub use types::{
    BucketInfo, DEFAULT_S3_REGION, DEFAULT_SIGNED_URL_EXPIRY, GCS_READ_ONLY_SCOPE, GcsOptions,
    HttpMethod, Lookup, ObjectInfo, ObjectMetadata, SignedUrlRequest, StorageConfig,
    StorageParams, StorageType,
};

// Backend implementations
pub use gcs::GcsStore;
pub use local_fs::{DirectoryBuckets, LocalFsStore};
pub use s3::{S3Buckets, S3Store};
