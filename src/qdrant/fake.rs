// Scripted SnapshotApi used by the orchestration tests.
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use super::{SnapshotApi, SnapshotDescription};
use crate::errors::{BackupError, Result};

#[derive(Default)]
pub struct FakeSnapshotApi {
    pub collections: Vec<String>,
    pub failing_downloads: HashSet<String>,
    pub failing_snapshots: HashSet<String>,
    /// HTTP status the restore endpoint answers with; 200 when unset.
    pub upload_status: Option<u16>,
    pub uploads: Mutex<Vec<UploadRecord>>,
}

#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub collection: String,
    pub contents: Vec<u8>,
    pub file_existed: bool,
}

impl FakeSnapshotApi {
    pub fn with_collections(names: &[&str]) -> Self {
        FakeSnapshotApi {
            collections: names.iter().map(|n| n.to_string()).collect(),
            ..FakeSnapshotApi::default()
        }
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotApi for FakeSnapshotApi {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.clone())
    }

    async fn create_snapshot(&self, collection: &str) -> Result<SnapshotDescription> {
        if self.failing_snapshots.contains(collection) {
            return Err(BackupError::http_status(
                format!("Snapshot creation for collection {collection} failed"),
                500,
                "internal".to_string(),
            ));
        }
        Ok(SnapshotDescription {
            name: format!("{collection}-snap-1"),
            size: None,
            creation_time: None,
        })
    }

    fn snapshot_url(&self, collection: &str, snapshot_name: &str) -> String {
        format!("http://fake/collections/{collection}/snapshots/{snapshot_name}")
    }

    async fn download_snapshot(&self, snapshot_url: &str, local_path: &Path) -> Result<u64> {
        let collection = snapshot_url
            .split('/')
            .nth(4)
            .unwrap_or_default()
            .to_string();
        if self.failing_downloads.contains(&collection) {
            return Err(BackupError::http_status(
                format!("Download of {snapshot_url} failed"),
                404,
                "not found".to_string(),
            ));
        }
        let body = format!("snapshot of {collection}");
        std::fs::write(local_path, &body).map_err(|e| BackupError::LocalIo(e.to_string()))?;
        Ok(body.len() as u64)
    }

    async fn upload_snapshot_file(&self, local_path: &Path, collection: &str) -> Result<()> {
        let file_existed = local_path.exists();
        let contents = std::fs::read(local_path).unwrap_or_default();
        self.uploads.lock().unwrap().push(UploadRecord {
            collection: collection.to_string(),
            contents,
            file_existed,
        });

        match self.upload_status.unwrap_or(200) {
            200 => Ok(()),
            status => Err(BackupError::http_status(
                format!("Failed to restore collection {collection} from uploaded snapshot"),
                status,
                "{\"status\":{\"error\":\"Wrong input\"}}".to_string(),
            )),
        }
    }
}
