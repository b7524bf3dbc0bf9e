//! Blob storage for uploaded files.
//!
//! DESIGN
//! ======
//! [`BlobStore`] hides where bytes live. The local backend writes into a
//! directory the router serves under `/uploads`; the S3 backend writes to a
//! bucket fronted by a public URL. Keys are `{uuid}-{sanitized filename}`,
//! so two uploads with the same name never collide and a key never escapes
//! its directory.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use axum::http::StatusCode;
use uuid::Uuid;

use crate::config::{BlobConfig, S3Config};
use crate::error::ErrorCode;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("s3 error: {0}")]
    S3(String),
    #[error("invalid blob key: {0}")]
    InvalidKey(String),
}

impl ErrorCode for BlobError {
    fn error_code(&self) -> &'static str {
        "storage_error"
    }

    fn status(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }
}

/// A stored object: the key to delete it by and the URL to render it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh key derived from `name`.
    async fn put(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredBlob, BlobError>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Reduce a user-supplied filename to `[A-Za-z0-9._-]`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    let truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if truncated.is_empty() { "file".to_owned() } else { truncated }
}

/// Fresh storage key for an upload named `name`.
#[must_use]
pub fn blob_key(name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(name))
}

fn check_key(key: &str) -> Result<(), BlobError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
        return Err(BlobError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

fn public_url(base: &str, key: &str) -> String {
    format!("{}/{key}", base.trim_end_matches('/'))
}

// =============================================================================
// LOCAL
// =============================================================================

pub struct LocalBlobStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    #[must_use]
    pub fn new(dir: PathBuf, public_base: String) -> Self {
        Self { dir, public_base }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, _content_type: &str, bytes: Vec<u8>) -> Result<StoredBlob, BlobError> {
        let key = blob_key(name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&key), bytes).await?;
        Ok(StoredBlob { url: public_url(&self.public_base, &key), key })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        check_key(key)?;
        match tokio::fs::remove_file(self.dir.join(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// S3
// =============================================================================

pub struct S3BlobStore {
    bucket: String,
    prefix: String,
    public_base: String,
    client: Client,
}

impl S3BlobStore {
    pub async fn new(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let (Some(access_key_id), Some(secret_access_key)) =
            (config.access_key_id.clone(), config.secret_access_key.clone())
        {
            let creds = Credentials::new(access_key_id, secret_access_key, None, None, "static");
            loader = loader.credentials_provider(creds);
        }
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint_url) = config.endpoint_url.as_ref() {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        let prefix = config.prefix.unwrap_or_default().trim_matches('/').to_owned();
        Self {
            bucket: config.bucket,
            prefix,
            public_base: config.public_base,
            client: Client::from_conf(builder.build()),
        }
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() { key.to_owned() } else { format!("{}/{key}", self.prefix) }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredBlob, BlobError> {
        let key = blob_key(name);
        let object_key = self.object_key(&key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| BlobError::S3(format!("put {object_key}: {e:?}")))?;
        Ok(StoredBlob { url: public_url(&self.public_base, &object_key), key })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        check_key(key)?;
        let object_key = self.object_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| BlobError::S3(format!("delete {object_key}: {e:?}")))?;
        Ok(())
    }
}

/// Build the configured backend.
pub async fn build_blob_store(config: &BlobConfig) -> Arc<dyn BlobStore> {
    match config {
        BlobConfig::Local { dir, public_base } => {
            tracing::info!(dir = %dir.display(), "using local blob storage");
            Arc::new(LocalBlobStore::new(dir.clone(), public_base.clone()))
        }
        BlobConfig::S3(s3) => {
            tracing::info!(bucket = %s3.bucket, "using s3 blob storage");
            Arc::new(S3BlobStore::new(s3.clone()).await)
        }
    }
}

/// Delete blobs whose rows are already gone. Failures are logged and
/// skipped; an orphaned object is cheaper than a failed request.
pub async fn delete_all(store: &dyn BlobStore, keys: &[String]) {
    for key in keys {
        if let Err(error) = store.delete(key).await {
            tracing::warn!(%key, %error, "blob delete failed; leaving orphan");
        }
    }
}

// =============================================================================
// IN-MEMORY (tests)
// =============================================================================

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Blob store kept in a map. `fail_deletes` simulates a storage outage.
    #[derive(Default)]
    pub struct MemoryBlobStore {
        pub objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
        pub fail_deletes: bool,
    }

    impl MemoryBlobStore {
        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredBlob, BlobError> {
            let key = blob_key(name);
            self.objects.lock().unwrap().insert(key.clone(), (content_type.to_owned(), bytes));
            Ok(StoredBlob { url: public_url("https://blobs.test", &key), key })
        }

        async fn delete(&self, key: &str) -> Result<(), BlobError> {
            if self.fail_deletes {
                return Err(BlobError::S3("simulated outage".into()));
            }
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "blob_test.rs"]
mod tests;
