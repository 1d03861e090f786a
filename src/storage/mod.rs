// qdrant-backup/src/storage/mod.rs
pub(crate) mod oss;
pub(crate) mod s3;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

use crate::config::{StorageConfig, StorageService};
use crate::errors::Result;

/// One object returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

/// Uniform interface over the supported object stores.
///
/// Implementations are built once at startup; callers never branch on the
/// concrete backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in progress output ("S3", "OSS").
    fn name(&self) -> &str;

    /// Uploads the file at `local_path` under `key`.
    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()>;

    /// Downloads `key` into `local_path`, overwriting it.
    async fn get_object_to_file(&self, key: &str, local_path: &Path) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Every object whose key starts with `prefix`, across all result pages.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// A cheap authenticated call proving the credentials work.
    async fn check_credentials(&self) -> Result<()>;
}

/// Builds the backend selected by `config.service`.
pub async fn build_storage_backend(config: &StorageConfig) -> Result<Box<dyn StorageBackend>> {
    match config.service {
        StorageService::S3 => {
            info!("Using S3 in region {}", config.region);
            Ok(Box::new(s3::S3Backend::new(config).await?))
        }
        StorageService::Oss => {
            let backend = oss::OssBackend::new(config)?;
            info!("Using OSS with endpoint: {}", backend.endpoint());
            Ok(Box::new(backend))
        }
    }
}
