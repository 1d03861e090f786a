// qdrant-backup/src/catalog/delete.rs
use tracing::error;

use crate::errors::BackupError;
use crate::storage::StorageBackend;
use crate::utils::output::Reporter;

/// What happened to a delete request. Backend failures are captured here
/// instead of being propagated so the caller decides how to report them.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub key: String,
    pub error: Option<BackupError>,
}

impl DeleteOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

pub async fn delete_backup(
    storage: &dyn StorageBackend,
    key: &str,
    reporter: &Reporter,
) -> DeleteOutcome {
    match storage.delete_object(key).await {
        Ok(()) => {
            reporter.outcome(&format!("Backup {key} deleted."));
            DeleteOutcome {
                key: key.to_string(),
                error: None,
            }
        }
        Err(e) => {
            error!("Failed to delete {} from {}: {}", key, storage.name(), e);
            DeleteOutcome {
                key: key.to_string(),
                error: Some(e),
            }
        }
    }
}
