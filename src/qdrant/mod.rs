// qdrant-backup/src/qdrant/mod.rs
pub(crate) mod client;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use crate::errors::Result;

pub use client::QdrantClient;

/// Snapshot metadata as returned by the create-snapshot call.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SnapshotDescription {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub creation_time: Option<String>,
}

/// The parts of the vector database's HTTP API the backup tool relies on.
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Creates a snapshot synchronously and returns its description.
    async fn create_snapshot(&self, collection: &str) -> Result<SnapshotDescription>;

    fn snapshot_url(&self, collection: &str, snapshot_name: &str) -> String;

    /// Fetches the snapshot at `snapshot_url` into `local_path`. Returns the byte count.
    ///
    /// `local_path` only ever appears once the whole body has been written.
    async fn download_snapshot(&self, snapshot_url: &str, local_path: &Path) -> Result<u64>;

    /// Pushes a snapshot file into `collection`, recovering it from that snapshot.
    async fn upload_snapshot_file(&self, local_path: &Path, collection: &str) -> Result<()>;
}
