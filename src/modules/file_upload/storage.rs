/// Blob Storage
///
/// Object store for attachment bytes. Reads go through time-limited signed URLs.
use actix_web::web::Bytes;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::{api::error, utils::StorageClaims};

#[async_trait::async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), error::SystemError>;

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, error::SystemError>;

    async fn remove(&self, path: &str) -> Result<(), error::SystemError>;
}

/// Object paths are relative, `/`-separated and never climb out of the storage root.
pub fn validate_object_path(path: &str) -> Result<&Path, error::SystemError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(error::SystemError::bad_request("Invalid storage path"));
    }
    Ok(candidate)
}

/// Disk-backed storage. Signed URLs carry a JWT over the object path.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    base_url: String,
    secret: String,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, error::SystemError> {
        Ok(self.root.join(validate_object_path(path)?))
    }

    /// Check a signed-URL token against the requested path and read the object.
    pub async fn read_signed(&self, path: &str, token: &str) -> Result<Bytes, error::SystemError> {
        let claims = StorageClaims::decode(token, self.secret.as_bytes())
            .map_err(|_| error::SystemError::unauthorized("Invalid or expired link"))?;
        if claims.sub != path {
            return Err(error::SystemError::forbidden("Link does not grant this object"));
        }

        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(error::SystemError::not_found("File not found"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), error::SystemError> {
        let file = self.resolve(path)?;
        if tokio::fs::try_exists(&file).await? {
            return Err(error::SystemError::Conflict(None));
        }
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&file, &bytes).await?;

        tracing::debug!("Stored {} ({} bytes, {})", path, bytes.len(), content_type);
        Ok(())
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, error::SystemError> {
        let file = self.resolve(path)?;
        if !tokio::fs::try_exists(&file).await? {
            return Err(error::SystemError::not_found("Object not found"));
        }

        let token = StorageClaims::new(path, ttl.as_secs()).encode(self.secret.as_bytes())?;
        Ok(format!("{}/{}?token={}", self.base_url, path, token))
    }

    async fn remove(&self, path: &str) -> Result<(), error::SystemError> {
        let file = self.resolve(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
