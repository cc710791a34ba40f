//! Storage types and configuration.
//!
//! This module defines types for blob storage connections including
//! storage types, configuration, object listings and metadata.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{BackendError, ConfigurationError};

/// Default lifetime of a signed URL (24 hours).
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(86_400);

/// Default OAuth scope requested for Google Cloud Storage service accounts.
pub const GCS_READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_only";

/// Region used when an S3 configuration does not name one.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Amazon S3 and S3-compatible services (MinIO, R2, DigitalOcean Spaces)
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Local filesystem, one directory per bucket
    LocalFs,
}

impl StorageType {
    /// Get the display name for this storage type.
    pub fn display_name(&self) -> &'static str {
        match self {
            StorageType::S3 => "Amazon S3",
            StorageType::Gcs => "Google Cloud Storage",
            StorageType::LocalFs => "Local Filesystem",
        }
    }

    /// URI scheme used by [`super::ObjectStore::object_uri`].
    pub fn scheme(&self) -> &'static str {
        match self {
            StorageType::S3 => "s3",
            StorageType::Gcs => "gs",
            StorageType::LocalFs => "file",
        }
    }

    /// Environment variable naming the process-wide default bucket.
    pub fn bucket_env_var(&self) -> &'static str {
        match self {
            StorageType::S3 => "S3_BUCKET_NAME",
            StorageType::Gcs => "GCS_BUCKET_NAME",
            StorageType::LocalFs => "LOCAL_BUCKET_NAME",
        }
    }

    /// Get all available storage types.
    pub fn all() -> Vec<StorageType> {
        vec![StorageType::S3, StorageType::Gcs, StorageType::LocalFs]
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Recognized options for Google Cloud Storage connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsOptions {
    /// OAuth scopes requested for the service account.
    #[serde(default = "GcsOptions::default_scopes")]
    pub scopes: Vec<String>,
}

impl GcsOptions {
    fn default_scopes() -> Vec<String> {
        vec![GCS_READ_ONLY_SCOPE.to_string()]
    }
}

impl Default for GcsOptions {
    fn default() -> Self {
        Self {
            scopes: Self::default_scopes(),
        }
    }
}

/// Storage-specific connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageParams {
    /// S3 and S3-compatible storage parameters.
    S3 {
        /// Endpoint URL (leave empty for AWS, set for MinIO/R2/etc.)
        endpoint: Option<String>,
        /// AWS region, defaults to `us-east-1`
        region: Option<String>,
        /// Use path-style addressing (required for MinIO)
        #[serde(default)]
        path_style: bool,
    },
    /// Google Cloud Storage parameters.
    Gcs {
        /// Endpoint override (emulators, private endpoints)
        endpoint: Option<String>,
        #[serde(default)]
        options: GcsOptions,
    },
    /// Local filesystem parameters.
    #[serde(rename = "local_fs")]
    LocalFs {
        /// Directory holding one subdirectory per bucket
        root_path: PathBuf,
    },
}

impl StorageParams {
    /// Create S3 parameters.
    pub fn s3(endpoint: Option<String>, region: Option<String>) -> Self {
        let path_style = endpoint.is_some();
        StorageParams::S3 {
            endpoint,
            region,
            path_style,
        }
    }

    /// Create GCS parameters with default options.
    pub fn gcs() -> Self {
        StorageParams::Gcs {
            endpoint: None,
            options: GcsOptions::default(),
        }
    }

    /// Create local filesystem parameters.
    pub fn local_fs(root_path: PathBuf) -> Self {
        StorageParams::LocalFs { root_path }
    }

    /// Get the parameter type name.
    pub fn param_type(&self) -> &'static str {
        match self {
            StorageParams::S3 { .. } => "s3",
            StorageParams::Gcs { .. } => "gcs",
            StorageParams::LocalFs { .. } => "local_fs",
        }
    }

    /// Configured endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            StorageParams::S3 { endpoint, .. } | StorageParams::Gcs { endpoint, .. } => {
                endpoint.as_deref().filter(|ep| !ep.is_empty())
            }
            StorageParams::LocalFs { .. } => None,
        }
    }

    /// Configured region, if any.
    pub fn region(&self) -> Option<&str> {
        match self {
            StorageParams::S3 { region, .. } => region.as_deref().filter(|r| !r.is_empty()),
            _ => None,
        }
    }
}

/// Configuration for a storage client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// User-friendly name, used in logs.
    pub name: String,
    /// The type of storage backend.
    pub storage_type: StorageType,
    /// Target bucket. Falls back to the provider's bucket env var when absent.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Storage-specific parameters.
    pub params: StorageParams,
}

impl StorageConfig {
    /// Create a new storage configuration.
    pub fn new(
        name: impl Into<String>,
        storage_type: StorageType,
        bucket: Option<String>,
        params: StorageParams,
    ) -> Self {
        Self {
            name: name.into(),
            storage_type,
            bucket,
            params,
        }
    }

    /// Resolve the bucket name from the explicit value or the process environment.
    pub fn resolve_bucket(&self) -> Result<String, ConfigurationError> {
        let env_var = self.storage_type.bucket_env_var();
        self.bucket
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .filter(|bucket| !bucket.trim().is_empty())
            .ok_or(ConfigurationError::MissingBucket {
                provider: self.storage_type,
                env_var,
            })
    }

    /// Validate the configuration for the given storage type.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match (&self.storage_type, &self.params) {
            (StorageType::S3, StorageParams::S3 { .. }) => Ok(()),
            (StorageType::Gcs, StorageParams::Gcs { options, .. }) => {
                if options.scopes.is_empty() {
                    return Err(ConfigurationError::InvalidParams(
                        "GCS requires at least one OAuth scope".to_string(),
                    ));
                }
                Ok(())
            }
            (StorageType::LocalFs, StorageParams::LocalFs { root_path }) => {
                if root_path.as_os_str().is_empty() {
                    return Err(ConfigurationError::InvalidParams(
                        "Local filesystem root path is required".to_string(),
                    ));
                }
                Ok(())
            }
            _ => Err(ConfigurationError::InvalidParams(format!(
                "Parameter type mismatch: {} params for {:?} storage",
                self.params.param_type(),
                self.storage_type
            ))),
        }
    }
}

/// Information about an object in storage, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full key relative to the bucket root.
    pub key: String,
    /// Last path segment of the key.
    pub name: String,
    /// Size in bytes, when the listing reports it.
    pub size: Option<u64>,
    /// Creation timestamp, when the backend reports it.
    pub created: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated: Option<DateTime<Utc>>,
    /// Content type / MIME type.
    pub content_type: Option<String>,
    /// ETag or version identifier.
    pub etag: Option<String>,
}

impl ObjectInfo {
    /// Create object info carrying only the key.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let name = key.rsplit('/').next().unwrap_or(&key).to_string();
        Self {
            key,
            name,
            size: None,
            created: None,
            updated: None,
            content_type: None,
            etag: None,
        }
    }

    /// Get a human-readable size string.
    pub fn size_display(&self) -> String {
        match self.size {
            Some(bytes) if bytes >= 1_073_741_824 => {
                format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
            }
            Some(bytes) if bytes >= 1_048_576 => {
                format!("{:.1} MB", bytes as f64 / 1_048_576.0)
            }
            Some(bytes) if bytes >= 1024 => {
                format!("{:.1} KB", bytes as f64 / 1024.0)
            }
            Some(bytes) => format!("{} B", bytes),
            None => "-".to_string(),
        }
    }
}

/// Object metadata as surfaced by the backend's head/get-metadata call.
///
/// Field names follow the backend's own schema (`ContentLength` on S3,
/// `timeCreated` on GCS). Values are strings; timestamps are RFC 3339.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectMetadata {
    fields: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Insert a field only when a value is present.
    pub fn insert_opt<V: Into<String>>(&mut self, field: &str, value: Option<V>) {
        if let Some(value) = value {
            self.insert(field, value);
        }
    }

    /// Look up a field. Exact match wins; otherwise ASCII case is ignored.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(field))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ObjectMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// HTTP method a signed URL is issued for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Download the object (the backend's default retrieval method).
    #[default]
    Get,
    /// Upload to the key.
    Put,
    /// Read metadata only.
    Head,
}

/// Parameters of a signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlRequest {
    pub key: String,
    pub expiry: Duration,
    pub method: HttpMethod,
}

impl SignedUrlRequest {
    /// A GET URL valid for 24 hours.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expiry: DEFAULT_SIGNED_URL_EXPIRY,
            method: HttpMethod::default(),
        }
    }

    pub fn expires_in(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn expires_in_secs(self, secs: u64) -> Self {
        self.expires_in(Duration::from_secs(secs))
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }
}

/// A bucket as reported by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// Outcome of an existence probe.
///
/// The public `exists` contract collapses this to a boolean; this type keeps
/// "definitely absent" apart from "could not ask".
#[derive(Debug)]
pub enum Lookup {
    Found,
    Absent,
    Unreachable(BackendError),
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_display() {
        assert_eq!(StorageType::S3.display_name(), "Amazon S3");
        assert_eq!(StorageType::Gcs.scheme(), "gs");
        assert_eq!(StorageType::LocalFs.to_string(), "Local Filesystem");
    }

    #[test]
    fn test_storage_config_validation() {
        let config = StorageConfig::new(
            "uploads",
            StorageType::S3,
            Some("my-bucket".to_string()),
            StorageParams::s3(None, Some("eu-west-1".to_string())),
        );
        assert!(config.validate().is_ok());

        let mismatched = StorageConfig::new(
            "uploads",
            StorageType::Gcs,
            Some("my-bucket".to_string()),
            StorageParams::s3(None, None),
        );
        assert!(matches!(
            mismatched.validate(),
            Err(ConfigurationError::InvalidParams(_))
        ));

        let no_scopes = StorageConfig::new(
            "analytics",
            StorageType::Gcs,
            Some("events".to_string()),
            StorageParams::Gcs {
                endpoint: None,
                options: GcsOptions { scopes: vec![] },
            },
        );
        assert!(no_scopes.validate().is_err());
    }

    #[test]
    fn test_resolve_bucket_prefers_explicit_name() {
        let config = StorageConfig::new(
            "local",
            StorageType::LocalFs,
            Some("explicit".to_string()),
            StorageParams::local_fs(PathBuf::from("/tmp/buckets")),
        );
        assert_eq!(config.resolve_bucket().unwrap(), "explicit");

        let blank = StorageConfig::new(
            "local",
            StorageType::LocalFs,
            Some("  ".to_string()),
            StorageParams::local_fs(PathBuf::from("/tmp/buckets")),
        );
        // Blank names never count as configured, even with an env fallback absent.
        if std::env::var("LOCAL_BUCKET_NAME").is_err() {
            assert!(matches!(
                blank.resolve_bucket(),
                Err(ConfigurationError::MissingBucket { .. })
            ));
        }
    }

    #[test]
    fn test_gcs_options_default_scope() {
        let options = GcsOptions::default();
        assert_eq!(options.scopes, vec![GCS_READ_ONLY_SCOPE.to_string()]);

        let parsed: StorageParams =
            serde_json::from_str(r#"{"type":"gcs","endpoint":null}"#).unwrap();
        assert_eq!(parsed, StorageParams::gcs());
    }

    #[test]
    fn test_s3_params_path_style_for_custom_endpoint() {
        let params = StorageParams::s3(Some("http://localhost:9000".to_string()), None);
        assert!(matches!(params, StorageParams::S3 { path_style: true, .. }));
        assert_eq!(params.endpoint(), Some("http://localhost:9000"));
        assert_eq!(params.region(), None);
    }

    #[test]
    fn test_object_metadata_lookup() {
        let metadata: ObjectMetadata = [
            ("ContentLength", "42"),
            ("timeCreated", "2024-01-01T00:00:00+00:00"),
        ]
        .into_iter()
        .collect();

        assert_eq!(metadata.get("ContentLength"), Some("42"));
        assert_eq!(metadata.get("contentlength"), Some("42"));
        assert_eq!(metadata.get("TimeCreated"), Some("2024-01-01T00:00:00+00:00"));
        assert_eq!(metadata.get("updated"), None);
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_signed_url_request_defaults() {
        let request = SignedUrlRequest::new("exports/report.csv");
        assert_eq!(request.expiry, Duration::from_secs(86_400));
        assert_eq!(request.method, HttpMethod::Get);

        let request = request.expires_in_secs(60).method(HttpMethod::Put);
        assert_eq!(request.expiry, Duration::from_secs(60));
        assert_eq!(request.method, HttpMethod::Put);
    }

    #[test]
    fn test_object_info_name_and_size() {
        let info = ObjectInfo {
            size: Some(1_500_000),
            ..ObjectInfo::new("data/2024/events.parquet")
        };
        assert_eq!(info.name, "events.parquet");
        assert_eq!(info.size_display(), "1.4 MB");
        assert_eq!(ObjectInfo::new("flat").name, "flat");
    }
}
