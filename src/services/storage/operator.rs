//! Helpers shared by the OpenDAL-backed object stores.

use std::path::Path;

use bytes::Bytes;
use futures::{AsyncReadExt, StreamExt};
use opendal::layers::LoggingLayer;
use opendal::{Builder, EntryMode, Operator};
use tracing::warn;

use super::error::{BackendError, ConfigurationError};
use super::types::{HttpMethod, ObjectInfo, SignedUrlRequest};

/// Read size for streamed uploads.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Build an operator with the logging layer every store carries.
pub(crate) fn build_operator<B: Builder>(builder: B) -> Result<Operator, ConfigurationError> {
    let op = Operator::new(builder)?
        .layer(LoggingLayer::default())
        .finish();
    Ok(op)
}

/// Normalize a key for OpenDAL (no leading slash).
pub(crate) fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

/// Directory enclosing a key prefix: everything up to its last `/`.
pub(crate) fn list_root(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(idx) => &prefix[..=idx],
        None => "",
    }
}

/// Convert an OpenDAL entry to ObjectInfo.
pub(crate) fn entry_to_object_info(path: &str, metadata: &opendal::Metadata) -> ObjectInfo {
    ObjectInfo {
        size: Some(metadata.content_length()),
        updated: metadata.last_modified(),
        content_type: metadata.content_type().map(|s| s.to_string()),
        etag: metadata.etag().map(|s| s.to_string()),
        ..ObjectInfo::new(path)
    }
}

/// List every object whose key starts with `prefix`, in backend order.
///
/// The prefix goes to the backend as is, so only matching keys are fetched.
/// A missing bucket surfaces as an error, not as an empty listing.
pub(crate) async fn list_prefix(
    op: &Operator,
    prefix: &str,
) -> Result<Vec<ObjectInfo>, BackendError> {
    let mut lister = op
        .lister_with(normalize_key(prefix))
        .recursive(true)
        .await?;

    let mut objects = Vec::new();
    while let Some(entry) = lister.next().await {
        let entry = entry?;
        let metadata = entry.metadata();
        if metadata.mode() == EntryMode::FILE {
            objects.push(entry_to_object_info(entry.path(), metadata));
        }
    }

    Ok(objects)
}

/// List the keys under the directory enclosing `prefix`, keeping those that
/// start with `prefix`.
///
/// For backends whose listings only accept directories. A missing
/// subdirectory lists as empty.
pub(crate) async fn list_enclosing_dir(
    op: &Operator,
    prefix: &str,
) -> Result<Vec<String>, BackendError> {
    let prefix = normalize_key(prefix);

    let mut lister = match op.lister_with(list_root(prefix)).recursive(true).await {
        Ok(lister) => lister,
        Err(err) if err.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut keys = Vec::new();
    while let Some(entry) = lister.next().await {
        let entry = entry?;
        if entry.metadata().mode() == EntryMode::FILE && entry.path().starts_with(prefix) {
            keys.push(entry.path().to_string());
        }
    }

    Ok(keys)
}

pub(crate) async fn put(op: &Operator, key: &str, data: Bytes) -> Result<(), BackendError> {
    op.write(normalize_key(key), data).await?;
    Ok(())
}

/// Stream a local file into `key` without holding it in memory.
pub(crate) async fn put_file(
    op: &Operator,
    key: &str,
    local_path: &Path,
) -> Result<(), BackendError> {
    let mut file = async_fs::File::open(local_path).await?;
    let mut writer = op.writer(normalize_key(key)).await?;

    if let Err(err) = copy_chunks(&mut file, &mut writer).await {
        if let Err(abort_err) = writer.abort().await {
            warn!(key = %key, error = %abort_err, "Failed to abort upload");
        }
        return Err(err);
    }

    writer.close().await?;
    Ok(())
}

async fn copy_chunks(
    file: &mut async_fs::File,
    writer: &mut opendal::Writer,
) -> Result<(), BackendError> {
    let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        writer.write(Bytes::copy_from_slice(&buf[..read])).await?;
    }
}

pub(crate) async fn get(op: &Operator, key: &str) -> Result<Bytes, BackendError> {
    let key = normalize_key(key);
    match op.read(key).await {
        Ok(buffer) => Ok(buffer.to_bytes()),
        Err(err) if err.kind() == opendal::ErrorKind::NotFound => Err(BackendError::NotFound {
            key: key.to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn stat(op: &Operator, key: &str) -> Result<opendal::Metadata, BackendError> {
    let key = normalize_key(key);
    match op.stat(key).await {
        Ok(metadata) => Ok(metadata),
        Err(err) if err.kind() == opendal::ErrorKind::NotFound => Err(BackendError::NotFound {
            key: key.to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn delete(op: &Operator, key: &str) -> Result<(), BackendError> {
    op.delete(normalize_key(key)).await?;
    Ok(())
}

pub(crate) async fn presign(
    op: &Operator,
    request: &SignedUrlRequest,
) -> Result<String, BackendError> {
    if request.expiry.is_zero() {
        return Err(BackendError::InvalidArgument(
            "signed URL expiry must be greater than zero".to_string(),
        ));
    }

    let key = normalize_key(&request.key);
    let presigned = match request.method {
        HttpMethod::Get => op.presign_read(key, request.expiry).await?,
        HttpMethod::Put => op.presign_write(key, request.expiry).await?,
        HttpMethod::Head => op.presign_stat(key, request.expiry).await?,
    };

    Ok(presigned.uri().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("/data/file.txt"), "data/file.txt");
        assert_eq!(normalize_key("data/file.txt"), "data/file.txt");
        assert_eq!(normalize_key("/"), "");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_list_root() {
        assert_eq!(list_root("stats/installs"), "stats/");
        assert_eq!(list_root("stats/installs/"), "stats/installs/");
        assert_eq!(list_root("a/b/c.txt"), "a/b/");
        assert_eq!(list_root("report"), "");
        assert_eq!(list_root(""), "");
    }

    fn memory_operator() -> Operator {
        Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish()
    }

    #[tokio::test]
    async fn test_list_prefix_sends_prefix_to_backend() {
        let op = memory_operator();
        for key in [
            "stats/installs/a.csv",
            "stats/inst.csv",
            "statsx/b.csv",
            "other.csv",
        ] {
            op.write(key, Bytes::from_static(b"x")).await.unwrap();
        }

        let mut keys: Vec<String> = list_prefix(&op, "/stats/inst")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["stats/inst.csv", "stats/installs/a.csv"]);

        let keys: Vec<String> = list_prefix(&op, "other")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["other.csv"]);
    }

    #[tokio::test]
    async fn test_list_enclosing_dir_filters_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let builder = opendal::services::Fs::default().root(dir.path().to_str().unwrap());
        let op = Operator::new(builder).unwrap().finish();
        op.write("stats/installs/a.csv", Bytes::from_static(b"x")).await.unwrap();
        op.write("stats/other.csv", Bytes::from_static(b"x")).await.unwrap();

        let keys = list_enclosing_dir(&op, "stats/inst").await.unwrap();
        assert_eq!(keys, vec!["stats/installs/a.csv"]);
        assert!(list_enclosing_dir(&op, "missing/dir/x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_file_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.bin");
        let data: Vec<u8> = (0..UPLOAD_CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        async_fs::write(&source, &data).await.unwrap();

        let op = memory_operator();
        put_file(&op, "/blobs/upload.bin", &source).await.unwrap();
        assert_eq!(op.read("blobs/upload.bin").await.unwrap().to_vec(), data);

        let err = put_file(&op, "blobs/none.bin", &dir.path().join("none.bin"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!op.exists("blobs/none.bin").await.unwrap());
    }
}
