//! S3 storage implementation.
//!
//! Object calls go through an OpenDAL operator; bucket lifecycle goes through
//! the AWS SDK client, which exposes bucket listing with creation dates.
//! Works with Amazon S3 and S3-compatible services (MinIO, R2, Spaces).

use std::path::Path;

use async_trait::async_trait;
use aws_credential_types::Credentials as AwsCredentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use opendal::Operator;
use opendal::services::S3;
use tracing::debug;

use super::error::{BackendError, ConfigurationError};
use super::operator;
use super::traits::{BucketStore, ObjectStore};
use super::types::{
    BucketInfo, DEFAULT_S3_REGION, ObjectInfo, ObjectMetadata, SignedUrlRequest, StorageType,
};

/// Connection settings shared by the operator and the SDK client.
pub(crate) struct S3Settings<'a> {
    pub bucket: &'a str,
    pub endpoint: Option<&'a str>,
    pub region: &'a str,
    pub path_style: bool,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
}

/// S3 object handle backed by OpenDAL.
pub struct S3Store {
    bucket: String,
    operator: Operator,
}

impl S3Store {
    /// Build the operator. No request is sent; credentials are checked on first use.
    pub(crate) fn new(settings: &S3Settings<'_>) -> Result<Self, ConfigurationError> {
        let mut builder = S3::default()
            .bucket(settings.bucket)
            .region(settings.region)
            .access_key_id(settings.access_key_id)
            .secret_access_key(settings.secret_access_key)
            // Only the supplied key pair may be used.
            .disable_config_load()
            .disable_ec2_metadata();

        if let Some(endpoint) = settings.endpoint {
            builder = builder.endpoint(endpoint);
        }

        if !settings.path_style {
            builder = builder.enable_virtual_host_style();
        }

        Ok(Self {
            bucket: settings.bucket.to_string(),
            operator: operator::build_operator(builder)?,
        })
    }

    /// Head fields under the names S3 uses in HeadObject responses.
    fn metadata_fields(metadata: &opendal::Metadata) -> ObjectMetadata {
        let mut fields = ObjectMetadata::new();
        fields.insert("ContentLength", metadata.content_length().to_string());
        fields.insert_opt("ContentType", metadata.content_type());
        fields.insert_opt("ETag", metadata.etag());
        fields.insert_opt("ContentMD5", metadata.content_md5());
        fields.insert_opt("VersionId", metadata.version());
        fields.insert_opt(
            "LastModified",
            metadata.last_modified().map(|t| t.to_rfc3339()),
        );
        fields
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn storage_type(&self) -> StorageType {
        StorageType::S3
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), BackendError> {
        operator::put(&self.operator, key, data).await
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), BackendError> {
        operator::put_file(&self.operator, key, local_path).await
    }

    async fn get(&self, key: &str) -> Result<Bytes, BackendError> {
        operator::get(&self.operator, key).await
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, BackendError> {
        let metadata = operator::stat(&self.operator, key).await?;
        Ok(Self::metadata_fields(&metadata))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, BackendError> {
        operator::list_prefix(&self.operator, prefix).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        operator::delete(&self.operator, key).await
    }

    async fn presign(&self, request: &SignedUrlRequest) -> Result<String, BackendError> {
        operator::presign(&self.operator, request).await
    }
}

/// S3 bucket handle backed by the AWS SDK.
pub struct S3Buckets {
    client: aws_sdk_s3::Client,
    region: String,
}

impl S3Buckets {
    pub(crate) fn new(settings: &S3Settings<'_>) -> Self {
        let credentials = AwsCredentials::new(
            settings.access_key_id,
            settings.secret_access_key,
            None,
            None,
            "cloudstore",
        );

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(settings.path_style);

        if let Some(endpoint) = settings.endpoint {
            config = config.endpoint_url(endpoint);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(config.build()),
            region: settings.region.to_string(),
        }
    }

    fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
    }
}

#[async_trait]
impl BucketStore for S3Buckets {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BackendError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| BackendError::s3("ListBuckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                Some(BucketInfo {
                    name: bucket.name()?.to_string(),
                    created: bucket.creation_date().and_then(Self::to_chrono),
                })
            })
            .collect())
    }

    async fn create_bucket(&self, name: &str) -> Result<(), BackendError> {
        let mut request = self.client.create_bucket().bucket(name);

        // us-east-1 rejects an explicit location constraint.
        if self.region != DEFAULT_S3_REGION {
            let configuration = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        request
            .send()
            .await
            .map_err(|e| BackendError::s3("CreateBucket", e))?;
        debug!(bucket = %name, region = %self.region, "S3 bucket created");
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), BackendError> {
        self.client
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| BackendError::s3("DeleteBucket", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::client::StorageClient;
    use crate::services::storage::error::StorageError;
    use crate::services::storage::traits::StorageHandles;
    use crate::services::storage::types::HttpMethod;

    fn settings(endpoint: Option<&'static str>) -> S3Settings<'static> {
        S3Settings {
            bucket: "my-bucket",
            endpoint,
            region: "us-east-1",
            path_style: endpoint.is_some(),
            access_key_id: "AKIAEXAMPLE",
            secret_access_key: "secret",
        }
    }

    #[test]
    fn test_object_uri() {
        let store = S3Store::new(&settings(None)).unwrap();
        assert_eq!(store.object_uri("/data/file.txt"), "s3://my-bucket/data/file.txt");
        assert_eq!(store.storage_type(), StorageType::S3);
    }

    #[test]
    fn test_construction_does_not_contact_backend() {
        // Unroutable endpoint: construction must still succeed.
        let store = S3Store::new(&settings(Some("http://127.0.0.1:1")));
        assert!(store.is_ok());
        let _buckets = S3Buckets::new(&settings(Some("http://127.0.0.1:1")));
    }

    #[test]
    fn test_metadata_fields_use_s3_names() {
        let mut metadata = opendal::Metadata::new(opendal::EntryMode::FILE);
        metadata.set_content_length(12);
        metadata.set_etag("\"abc\"");
        metadata.set_content_type("text/plain");

        let fields = S3Store::metadata_fields(&metadata);
        assert_eq!(fields.get("ContentLength"), Some("12"));
        assert_eq!(fields.get("ETag"), Some("\"abc\""));
        assert_eq!(fields.get("ContentType"), Some("text/plain"));
        assert!(!fields.contains("LastModified"));
    }

    #[tokio::test]
    async fn test_presign_expiry_reaches_query() {
        let store = S3Store::new(&settings(Some("http://127.0.0.1:1"))).unwrap();
        let client = StorageClient::from_handles(StorageHandles::new(Box::new(store), None));

        let url = client.signed_url("a/b.txt").await.unwrap();
        assert!(url.starts_with("http://127.0.0.1:1/my-bucket/a/b.txt?"));
        assert!(url.contains("X-Amz-Expires=86400"));
        assert!(url.contains("X-Amz-Credential=AKIAEXAMPLE"));

        let shortest = SignedUrlRequest::new("a/b.txt").expires_in_secs(1);
        let url = client.get_signed_url(&shortest).await.unwrap();
        assert!(url.contains("X-Amz-Expires=1&") || url.ends_with("X-Amz-Expires=1"));

        let upload = SignedUrlRequest::new("a/b.txt").method(HttpMethod::Put);
        assert!(client.get_signed_url(&upload).await.unwrap().contains("X-Amz-Signature="));

        let zero = SignedUrlRequest::new("a/b.txt").expires_in_secs(0);
        let err = client.get_signed_url(&zero).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::SignedUrl {
                source: BackendError::InvalidArgument(_),
                ..
            }
        ));
    }

    #[test]
    fn test_to_chrono() {
        let ts = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        let converted = S3Buckets::to_chrono(&ts).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
