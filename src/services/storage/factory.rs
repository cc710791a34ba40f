//! Storage handle factory.
//!
//! Builds the operational handle and the resource handle for a configuration
//! and its credentials. Construction never talks to the backend; invalid
//! credentials surface on the first call (or through an explicit probe such as
//! [`super::ReadOnlyStorageClient::verify_bucket_access`]).

use tracing::info;

use super::credentials::Credentials;
use super::error::ConfigurationError;
use super::gcs::GcsStore;
use super::local_fs::{DirectoryBuckets, LocalFsStore};
use super::s3::{S3Buckets, S3Settings, S3Store};
use super::traits::{BoxedBucketStore, StorageHandles};
use super::types::{DEFAULT_S3_REGION, StorageConfig, StorageParams, StorageType};

/// Factory for storage handles.
///
/// # Example
///
/// ```ignore
/// use cloudstore::services::storage::{Credentials, StorageConfig, StorageFactory, StorageParams, StorageType};
///
/// let config = StorageConfig::new(
///     "uploads",
///     StorageType::S3,
///     Some("my-bucket".to_string()),
///     StorageParams::s3(None, Some("eu-west-1".to_string())),
/// );
///
/// let handles = StorageFactory::create(&config, Credentials::s3_from_env()?)?;
/// ```
pub struct StorageFactory;

impl StorageFactory {
    /// Create the handles for a configuration.
    ///
    /// The credentials are consumed; nothing keeps them once the handles exist.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if:
    /// - The configuration is invalid for the storage type
    /// - No bucket is configured or present in the environment
    /// - The credentials belong to a different provider or are empty
    pub fn create(
        config: &StorageConfig,
        credentials: Credentials,
    ) -> Result<StorageHandles, ConfigurationError> {
        config.validate()?;
        let bucket = config.resolve_bucket()?;

        if credentials.provider() != config.storage_type {
            return Err(ConfigurationError::CredentialsMismatch {
                provider: config.storage_type,
            });
        }

        let handles = match (&config.params, &credentials) {
            (
                StorageParams::S3 { path_style, .. },
                Credentials::AccessKey { access_key_id, .. },
            ) => {
                let secret_access_key = credentials.secret_access_key().unwrap_or_default();
                if access_key_id.is_empty() || secret_access_key.is_empty() {
                    return Err(ConfigurationError::MissingCredentials {
                        provider: StorageType::S3,
                    });
                }

                let region = config.params.region().unwrap_or(DEFAULT_S3_REGION);
                let settings = S3Settings {
                    bucket: &bucket,
                    endpoint: config.params.endpoint(),
                    region,
                    path_style: *path_style,
                    access_key_id,
                    secret_access_key,
                };

                let resource: BoxedBucketStore = Box::new(S3Buckets::new(&settings));
                StorageHandles {
                    client: Box::new(S3Store::new(&settings)?),
                    resource: Some(resource),
                    endpoint: config.params.endpoint().map(str::to_string),
                    region: Some(region.to_string()),
                }
            }
            (StorageParams::Gcs { options, .. }, Credentials::ServiceAccount(key)) => {
                let store = GcsStore::new(&bucket, config.params.endpoint(), key, options)?;
                StorageHandles {
                    client: Box::new(store),
                    resource: None,
                    endpoint: config.params.endpoint().map(str::to_string),
                    region: None,
                }
            }
            (StorageParams::LocalFs { root_path }, Credentials::Anonymous) => {
                let resource: BoxedBucketStore = Box::new(DirectoryBuckets::new(root_path));
                StorageHandles::new(
                    Box::new(LocalFsStore::new(root_path, &bucket)?),
                    Some(resource),
                )
            }
            _ => {
                return Err(ConfigurationError::CredentialsMismatch {
                    provider: config.storage_type,
                });
            }
        };

        info!(
            name = %config.name,
            provider = %config.storage_type,
            bucket = %bucket,
            "Storage handles initialized"
        );

        Ok(handles)
    }

    /// Check if a storage type has a backend implementation.
    pub fn is_supported(storage_type: StorageType) -> bool {
        match storage_type {
            StorageType::S3 | StorageType::Gcs | StorageType::LocalFs => true,
        }
    }

    /// Whether the storage type offers bucket lifecycle operations.
    pub fn supports_bucket_lifecycle(storage_type: StorageType) -> bool {
        match storage_type {
            StorageType::S3 | StorageType::LocalFs => true,
            StorageType::Gcs => false,
        }
    }

    /// Get a list of all supported storage types.
    pub fn supported_types() -> Vec<StorageType> {
        StorageType::all()
            .into_iter()
            .filter(|t| Self::is_supported(*t))
            .collect()
    }
}
