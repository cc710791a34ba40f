//! Error types for storage operations.
//!
//! Three layers:
//! - [`BackendError`] is what a backend handle reports for a single call.
//! - [`ConfigurationError`] is raised at construction, before any backend call.
//! - [`StorageError`] is what the storage clients surface for writes, reads and
//!   credential-bearing requests. It always keeps the backend error as its source.

use thiserror::Error;

use super::types::StorageType;

/// Failure reported by a backend handle.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The object (or bucket) does not exist.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Credentials were rejected or lack permission.
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The backend cannot perform this operation.
    #[error("Operation not supported by this backend: {operation}")]
    Unsupported { operation: &'static str },

    /// A request argument was rejected before reaching the backend.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Local I/O failure (reading an upload source, a local bucket directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by an OpenDAL operator.
    #[error(transparent)]
    OpenDal(opendal::Error),

    /// Error raised by the AWS SDK resource client.
    #[error("S3 {operation} failed: {message}")]
    S3 {
        operation: &'static str,
        message: String,
    },

    /// Error raised by the GCS JSON API client.
    #[error("GCS {operation} failed: {message}")]
    Gcs {
        operation: &'static str,
        message: String,
    },
}

impl BackendError {
    /// Whether this error means the target definitely does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::NotFound { .. } => true,
            BackendError::OpenDal(err) => err.kind() == opendal::ErrorKind::NotFound,
            BackendError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Build an AWS SDK error with its full context chain flattened.
    pub(crate) fn s3<E>(operation: &'static str, err: E) -> Self
    where
        E: std::error::Error,
    {
        BackendError::S3 {
            operation,
            message: aws_sdk_s3::error::DisplayErrorContext(err).to_string(),
        }
    }

    /// Build a GCS JSON API error, keeping any context chain.
    pub(crate) fn gcs(operation: &'static str, err: impl std::fmt::Display) -> Self {
        BackendError::Gcs {
            operation,
            message: format!("{err:#}"),
        }
    }
}

impl From<opendal::Error> for BackendError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::PermissionDenied => BackendError::PermissionDenied {
                message: err.to_string(),
            },
            _ => BackendError::OpenDal(err),
        }
    }
}

/// Invalid construction input. Raised before any backend call is attempted.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No bucket name configured for {provider} (set it explicitly or via {env_var})")]
    MissingBucket {
        provider: StorageType,
        env_var: &'static str,
    },

    #[error("Missing credentials for {provider}")]
    MissingCredentials { provider: StorageType },

    #[error("Credentials do not match storage provider {provider}")]
    CredentialsMismatch { provider: StorageType },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid storage parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to build storage backend: {0}")]
    Backend(#[from] opendal::Error),
}

/// Typed failure for mutating and security-sensitive storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to upload {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to download {key}: {source}")]
    Download {
        key: String,
        #[source]
        source: BackendError,
    },

    /// The message deliberately omits backend detail; the cause is logged
    /// and kept as the error source.
    #[error("Failed to get signed link, please try again")]
    SignedUrl {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to read metadata of {key}: {source}")]
    Metadata {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("Failed to list objects under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: BackendError,
    },

    #[error("Bucket operation {operation} on {bucket} failed: {source}")]
    Bucket {
        bucket: String,
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl StorageError {
    /// The backend failure behind this error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            StorageError::Upload { source, .. }
            | StorageError::Download { source, .. }
            | StorageError::SignedUrl { source, .. }
            | StorageError::Metadata { source, .. }
            | StorageError::Listing { source, .. }
            | StorageError::Bucket { source, .. } => Some(source),
            StorageError::Configuration(_) => None,
        }
    }

    /// Whether the failure was caused by a missing object or bucket.
    pub fn is_not_found(&self) -> bool {
        self.backend_error().is_some_and(BackendError::is_not_found)
    }
}
