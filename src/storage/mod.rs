//! Report file storage over an object store.
//!
//! The store is the only genuinely unreliable dependency in the system, so
//! every call goes through bounded retries with exponential backoff and a
//! per-attempt timeout. S3 is used when credentials are configured, a local
//! directory otherwise (development and tests).

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

const RETRY_ATTEMPTS: u32 = 3;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object store operation failed: {0}")]
    Backend(String),

    #[error("Object store operation timed out")]
    Timeout,
}

enum Backend {
    Local { store: LocalFileSystem, root: PathBuf },
    S3 { store: AmazonS3 },
}

/// Handle to the configured object store.
pub struct ReportStore {
    backend: Backend,
    prefix: String,
}

async fn with_retry<T, F, Fut>(operation: &str, mut call: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, object_store::Error>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut last_error = StorageError::Timeout;

    for attempt in 1..=RETRY_ATTEMPTS {
        match tokio::time::timeout(ATTEMPT_TIMEOUT, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(object_store::Error::NotFound { path, .. })) => {
                // Missing objects are a caller problem, not a transient fault.
                return Err(StorageError::NotFound(path));
            }
            Ok(Err(err)) => {
                tracing::warn!(operation, attempt, error = %err, "object store call failed");
                last_error = StorageError::Backend(err.to_string());
            }
            Err(_) => {
                tracing::warn!(operation, attempt, "object store call timed out");
                last_error = StorageError::Timeout;
            }
        }
        if attempt < RETRY_ATTEMPTS {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
    Err(last_error)
}

impl ReportStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match config {
            StorageConfig::Local { root } => {
                std::fs::create_dir_all(root)
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                let store = LocalFileSystem::new_with_prefix(root)
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok(Self {
                    backend: Backend::Local {
                        store,
                        root: root.clone(),
                    },
                    prefix: String::new(),
                })
            }
            StorageConfig::S3 {
                bucket,
                region,
                access_key_id,
                secret_access_key,
                prefix,
            } => {
                let store = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_region(region)
                    .with_access_key_id(access_key_id)
                    .with_secret_access_key(secret_access_key)
                    .build()
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                Ok(Self {
                    backend: Backend::S3 { store },
                    prefix: prefix.clone(),
                })
            }
        }
    }

    /// Build the object key for a report file: prefix + report number +
    /// a random component, keeping the original extension.
    pub fn object_key(&self, report_number: &str, extension: &str) -> String {
        format!(
            "{}{}/{}{}",
            self.prefix,
            report_number,
            Uuid::new_v4().simple(),
            extension
        )
    }

    fn parse_key(&self, key: &str) -> Result<ObjectPath, StorageError> {
        ObjectPath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    fn store(&self) -> &dyn ObjectStore {
        match &self.backend {
            Backend::Local { store, .. } => store,
            Backend::S3 { store } => store,
        }
    }

    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.parse_key(key)?;
        let store = self.store();
        with_retry("put", || {
            let path = path.clone();
            let payload = PutPayload::from(bytes.clone());
            async move { store.put(&path, payload).await.map(|_| ()) }
        })
        .await
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.parse_key(key)?;
        let store = self.store();
        with_retry("get", || {
            let path = path.clone();
            async move { store.get(&path).await?.bytes().await }
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.parse_key(key)?;
        let store = self.store();
        with_retry("delete", || {
            let path = path.clone();
            async move { store.delete(&path).await }
        })
        .await
    }

    /// Time-limited read URL. S3 signs a real presigned URL; the local
    /// backend hands back a `file://` URL for development use.
    pub async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let path = self.parse_key(key)?;
        match &self.backend {
            Backend::Local { root, .. } => {
                Ok(format!("file://{}", root.join(key).display()))
            }
            Backend::S3 { store } => {
                let url = with_retry("presign", || {
                    let path = path.clone();
                    async move { store.signed_url(http::Method::GET, &path, expires_in).await }
                })
                .await?;
                Ok(url.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_store() -> (ReportStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::from_config(&StorageConfig::Local {
            root: dir.path().to_path_buf(),
        })
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let (store, _dir) = local_store();
        let key = store.object_key("RPT20260807ABCDEF01", ".pdf");

        store.put(&key, Bytes::from_static(b"%PDF-1.4 test")).await.unwrap();
        let bytes = store.get(&key).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 test");

        store.delete(&key).await.unwrap();
        let err = store.get(&key).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn object_keys_are_unique_per_upload() {
        let (store, _dir) = local_store();
        let first = store.object_key("RPT1", ".pdf");
        let second = store.object_key("RPT1", ".pdf");
        assert_ne!(first, second);
        assert!(first.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn local_presign_returns_file_url() {
        let (store, _dir) = local_store();
        let key = store.object_key("RPT2", ".png");
        store.put(&key, Bytes::from_static(b"png")).await.unwrap();

        let url = store
            .presign_get(&key, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".png"));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (store, _dir) = local_store();
        let err = store.get("nope/missing.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
