//! Local filesystem storage implementation using OpenDAL.
//!
//! A root directory holds one subdirectory per bucket. Used for development
//! and tests; it goes through the same traits as the cloud backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use opendal::Operator;
use opendal::services::Fs;

use super::error::{BackendError, ConfigurationError};
use super::operator;
use super::traits::{BucketStore, ObjectStore};
use super::types::{BucketInfo, ObjectInfo, ObjectMetadata, SignedUrlRequest, StorageType};

/// Local filesystem object handle for one bucket directory.
pub struct LocalFsStore {
    bucket: String,
    bucket_path: PathBuf,
    operator: Operator,
}

impl LocalFsStore {
    pub(crate) fn new(root_path: &Path, bucket: &str) -> Result<Self, ConfigurationError> {
        let bucket_path = root_path.join(bucket);
        let root = bucket_path
            .to_str()
            .ok_or_else(|| ConfigurationError::InvalidParams("Invalid path encoding".to_string()))?;

        let builder = Fs::default().root(root);

        Ok(Self {
            bucket: bucket.to_string(),
            operator: operator::build_operator(builder)?,
            bucket_path,
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_path.join(operator::normalize_key(key))
    }

    /// Head fields named like the GCS object resource.
    fn metadata_fields(metadata: &std::fs::Metadata) -> ObjectMetadata {
        let (created, updated) = file_times(metadata);
        let mut fields = ObjectMetadata::new();
        fields.insert("size", metadata.len().to_string());
        fields.insert_opt("timeCreated", created.map(|t| t.to_rfc3339()));
        fields.insert_opt("updated", updated.map(|t| t.to_rfc3339()));
        fields
    }

    async fn ensure_bucket(&self) -> Result<(), BackendError> {
        match async_fs::metadata(&self.bucket_path).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(BackendError::NotFound {
                key: self.bucket.clone(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(BackendError::NotFound {
                key: self.bucket.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn is_file(&self, key: &str) -> bool {
        async_fs::metadata(self.object_path(key))
            .await
            .is_ok_and(|metadata| metadata.is_file())
    }
}

/// Creation and update times of a file. Birth time falls back to mtime.
fn file_times(metadata: &std::fs::Metadata) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let updated = metadata.modified().ok().map(DateTime::<Utc>::from);
    let created = metadata
        .created()
        .ok()
        .map(DateTime::<Utc>::from)
        .or(updated);
    (created, updated)
}

/// Set a freshly written file's mtime to its birth time, so an object that
/// was never rewritten reports the same creation and update time.
async fn align_new_file_times(path: PathBuf) -> Result<(), BackendError> {
    smol::unblock(move || {
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        if let Ok(created) = file.metadata()?.created() {
            file.set_modified(created)?;
        }
        Ok::<_, std::io::Error>(())
    })
    .await?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    fn storage_type(&self) -> StorageType {
        StorageType::LocalFs
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<(), BackendError> {
        let existed = self.is_file(key).await;
        operator::put(&self.operator, key, data).await?;
        if !existed {
            align_new_file_times(self.object_path(key)).await?;
        }
        Ok(())
    }

    async fn put_file(&self, key: &str, local_path: &Path) -> Result<(), BackendError> {
        let existed = self.is_file(key).await;
        operator::put_file(&self.operator, key, local_path).await?;
        if !existed {
            align_new_file_times(self.object_path(key)).await?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BackendError> {
        operator::get(&self.operator, key).await
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, BackendError> {
        let not_found = || BackendError::NotFound {
            key: operator::normalize_key(key).to_string(),
        };
        match async_fs::metadata(self.object_path(key)).await {
            Ok(metadata) if metadata.is_file() => Ok(Self::metadata_fields(&metadata)),
            Ok(_) => Err(not_found()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, BackendError> {
        // The Fs lister reports a missing directory as empty.
        self.ensure_bucket().await?;

        let keys = operator::list_enclosing_dir(&self.operator, prefix).await?;
        let mut objects = Vec::with_capacity(keys.len());
        for key in keys {
            // The lister carries no size or timestamps.
            let metadata = match async_fs::metadata(self.object_path(&key)).await {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            let (created, updated) = file_times(&metadata);
            objects.push(ObjectInfo {
                size: Some(metadata.len()),
                created,
                updated,
                ..ObjectInfo::new(key)
            });
        }

        // Directory iteration order is arbitrary; keep listings stable.
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        operator::delete(&self.operator, key).await
    }

    async fn presign(&self, request: &SignedUrlRequest) -> Result<String, BackendError> {
        // Local files need no signature; hand back a file:// URL instead.
        if request.expiry.is_zero() {
            return Err(BackendError::InvalidArgument(
                "signed URL expiry must be greater than zero".to_string(),
            ));
        }
        Ok(format!("file://{}", self.object_path(&request.key).display()))
    }

    fn object_uri(&self, key: &str) -> String {
        format!(
            "file://{}/{}",
            self.bucket_path.display(),
            operator::normalize_key(key)
        )
    }
}

/// Bucket handle over the root directory: each subdirectory is a bucket.
pub struct DirectoryBuckets {
    root_path: PathBuf,
}

impl DirectoryBuckets {
    pub(crate) fn new(root_path: &Path) -> Self {
        Self {
            root_path: root_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl BucketStore for DirectoryBuckets {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BackendError> {
        let mut entries = match async_fs::read_dir(&self.root_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut buckets = Vec::new();
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            // Birth time is not available on every filesystem.
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            buckets.push(BucketInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                created,
            });
        }

        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn create_bucket(&self, name: &str) -> Result<(), BackendError> {
        async_fs::create_dir_all(self.root_path.join(name)).await?;
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), BackendError> {
        // Nested keys leave empty directories behind; they go with the bucket.
        async_fs::remove_dir_all(self.root_path.join(name)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_uri() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path(), "assets").unwrap();

        assert_eq!(
            store.object_uri("/subdir/file.txt"),
            format!("file://{}/assets/subdir/file.txt", dir.path().display())
        );
    }

    #[tokio::test]
    async fn test_put_get_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path(), "assets").unwrap();

        store.put("b/two.txt", Bytes::from_static(b"2")).await.unwrap();
        store.put("a/one.txt", Bytes::from_static(b"1")).await.unwrap();
        store.put("a/other.txt", Bytes::from_static(b"3")).await.unwrap();

        let keys: Vec<String> = store
            .list("")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/one.txt", "a/other.txt", "b/two.txt"]);

        let keys: Vec<String> = store
            .list("a/on")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["a/one.txt"]);

        assert_eq!(store.get("a/one.txt").await.unwrap(), Bytes::from_static(b"1"));

        let head = store.head("b/two.txt").await.unwrap();
        assert_eq!(head.get("size"), Some("1"));
        assert!(head.contains("updated"));
        assert!(head.contains("timeCreated"));

        let listed = store.list("b/").await.unwrap();
        assert_eq!(listed[0].size, Some(1));
        assert!(listed[0].created.is_some());
        assert!(listed[0].updated.is_some());
        assert!(store.head("b").await.unwrap_err().is_not_found());

        store.delete("a/one.txt").await.unwrap();
        assert!(store.get("a/one.txt").await.unwrap_err().is_not_found());
        assert!(store.head("a/one.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rewrite_keeps_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path(), "assets").unwrap();

        store.put("day.json", Bytes::from_static(b"v1")).await.unwrap();
        let first = store.head("day.json").await.unwrap();
        assert_eq!(first.get("timeCreated"), first.get("updated"));

        smol::Timer::after(std::time::Duration::from_millis(20)).await;
        store.put("day.json", Bytes::from_static(b"v2-longer")).await.unwrap();
        let second = store.head("day.json").await.unwrap();
        assert_eq!(second.get("size"), Some("9"));
        assert_ne!(second.get("updated"), first.get("updated"));

        // Without birth times the creation time tracks mtime.
        let birth_supported = std::fs::metadata(dir.path().join("assets/day.json"))
            .unwrap()
            .created()
            .is_ok();
        if birth_supported {
            assert_eq!(second.get("timeCreated"), first.get("timeCreated"));
        }
    }

    #[tokio::test]
    async fn test_list_missing_bucket_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path(), "assets").unwrap();
        store.put("a.txt", Bytes::from_static(b"1")).await.unwrap();
        assert!(store.list("missing/").await.unwrap().is_empty());

        std::fs::remove_dir_all(dir.path().join("assets")).unwrap();
        let err = store.list("").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_put_file_creates_object() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, b"hello").unwrap();
        let store = LocalFsStore::new(&dir.path().join("buckets"), "assets").unwrap();

        store.put_file("docs/notes.txt", &source).await.unwrap();
        assert_eq!(store.get("docs/notes.txt").await.unwrap(), Bytes::from_static(b"hello"));

        let head = store.head("docs/notes.txt").await.unwrap();
        assert_eq!(head.get("timeCreated"), head.get("updated"));
    }

    #[tokio::test]
    async fn test_presign_returns_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::new(dir.path(), "assets").unwrap();

        let url = store
            .presign(&SignedUrlRequest::new("/docs/readme.md"))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("assets/docs/readme.md"));

        let zero = SignedUrlRequest::new("docs/readme.md").expires_in_secs(0);
        assert!(store.presign(&zero).await.is_err());
    }

    #[tokio::test]
    async fn test_directory_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let buckets = DirectoryBuckets::new(dir.path());

        buckets.create_bucket("beta").await.unwrap();
        buckets.create_bucket("alpha").await.unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"not a bucket").unwrap();

        let listed = buckets.list_buckets().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert!(listed.iter().all(|b| b.created.is_some()));

        buckets.delete_bucket("alpha").await.unwrap();
        let names: Vec<String> = buckets
            .list_buckets()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["beta"]);

        let missing = DirectoryBuckets::new(&dir.path().join("nope"));
        assert!(missing.list_buckets().await.unwrap().is_empty());
    }
}
