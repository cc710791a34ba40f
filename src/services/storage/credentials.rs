//! Provider credentials and the loaders that source them.
//!
//! Credentials are consumed by [`super::StorageFactory`] and dropped once the
//! backend handles exist. Secret material never appears in `Debug` output.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use super::types::StorageType;

const S3_ACCESS_KEY_ENV: [&str; 2] = ["S3_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID"];
const S3_SECRET_KEY_ENV: [&str; 2] = ["S3_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY"];

/// A Google service account key document.
#[derive(Clone)]
pub struct ServiceAccountKey {
    document: serde_json::Value,
}

impl ServiceAccountKey {
    /// Parse a key document. It must carry `client_email` and `private_key`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: serde_json::Value =
            serde_json::from_str(raw).context("Service account key is not valid JSON")?;
        Self::from_value(document)
    }

    /// Wrap an already parsed key document.
    pub fn from_value(document: serde_json::Value) -> Result<Self> {
        for field in ["client_email", "private_key"] {
            if document.get(field).and_then(|v| v.as_str()).is_none() {
                return Err(anyhow!("Service account key is missing '{}'", field));
            }
        }
        Ok(Self { document })
    }

    /// Read a key document from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = async_fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read service account key {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn client_email(&self) -> &str {
        self.document
            .get("client_email")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    /// Base64 form of the document, as the GCS operator expects it.
    pub(crate) fn to_base64(&self) -> String {
        STANDARD.encode(self.document.to_string())
    }

    /// Raw JSON form of the document, for the token loader.
    pub(crate) fn to_json_bytes(&self) -> Vec<u8> {
        self.document.to_string().into_bytes()
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Provider-specific credential bundle.
#[derive(Clone)]
pub enum Credentials {
    /// S3 access key pair.
    AccessKey {
        access_key_id: String,
        secret_access_key: SecretString,
    },
    /// Google service account key.
    ServiceAccount(ServiceAccountKey),
    /// No credentials (local filesystem buckets).
    Anonymous,
}

impl Credentials {
    pub fn access_key(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Credentials::AccessKey {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
        }
    }

    /// Load an S3 key pair from `S3_ACCESS_KEY_ID`/`S3_SECRET_ACCESS_KEY`,
    /// falling back to the `AWS_*` names.
    pub fn s3_from_env() -> Result<Self> {
        let access_key_id = first_env(&S3_ACCESS_KEY_ENV)
            .ok_or_else(|| anyhow!("No S3 access key id in environment"))?;
        let secret = first_env(&S3_SECRET_KEY_ENV)
            .ok_or_else(|| anyhow!("No S3 secret access key in environment"))?;
        Ok(Self::access_key(access_key_id, secret))
    }

    /// Load a service account key file.
    pub async fn gcs_from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Credentials::ServiceAccount(
            ServiceAccountKey::from_file(path).await?,
        ))
    }

    /// Read a secret from the OS keychain.
    #[cfg(feature = "keyring")]
    pub fn secret_from_keyring(service: &str, account: &str) -> Result<SecretString> {
        let entry = keyring::Entry::new(service, account)
            .context("Failed to create keyring entry")?;
        let secret = entry
            .get_password()
            .context("Failed to retrieve secret from keyring")?;
        Ok(SecretString::from(secret))
    }

    #[cfg(not(feature = "keyring"))]
    pub fn secret_from_keyring(_service: &str, _account: &str) -> Result<SecretString> {
        tracing::warn!("Keyring feature disabled - cannot retrieve stored secret");
        Err(anyhow!("Keyring support is not compiled in"))
    }

    /// The provider these credentials belong to.
    pub fn provider(&self) -> StorageType {
        match self {
            Credentials::AccessKey { .. } => StorageType::S3,
            Credentials::ServiceAccount(_) => StorageType::Gcs,
            Credentials::Anonymous => StorageType::LocalFs,
        }
    }

    pub(crate) fn secret_access_key(&self) -> Option<&str> {
        match self {
            Credentials::AccessKey {
                secret_access_key, ..
            } => Some(secret_access_key.expose_secret()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AccessKey { access_key_id, .. } => f
                .debug_struct("AccessKey")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            Credentials::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}
