// qdrant-backup/src/restore/mod.rs
use std::path::Path;
use tracing::{debug, error, info};

use crate::errors::{BackupError, Result};
use crate::qdrant::SnapshotApi;
use crate::storage::StorageBackend;
use crate::utils::output::Reporter;

/// Restores `collection` from the backup stored under `backup_key`.
///
/// The object is downloaded into a scoped temporary file in `scratch_dir`,
/// which lives until this function returns on every path, and is then
/// uploaded to the database's snapshot-upload endpoint. A non-200 answer from
/// the database is returned as an error.
pub async fn run_restore(
    storage: &dyn StorageBackend,
    api: &dyn SnapshotApi,
    backup_key: &str,
    collection: &str,
    scratch_dir: &Path,
    reporter: &Reporter,
) -> Result<()> {
    reporter.step(&format!(
        "Restoring collection {collection} from backup {backup_key}..."
    ));

    std::fs::create_dir_all(scratch_dir).map_err(|e| {
        BackupError::LocalIo(format!(
            "Failed to create scratch directory {}: {}",
            scratch_dir.display(),
            e
        ))
    })?;
    let snapshot_name = backup_key.rsplit('/').next().unwrap_or(backup_key);
    let staging = tempfile::Builder::new()
        .prefix("restore-")
        .suffix(&format!("-{snapshot_name}"))
        .tempfile_in(scratch_dir)
        .map_err(|e| {
            BackupError::LocalIo(format!(
                "Failed to create temporary file in {}: {}",
                scratch_dir.display(),
                e
            ))
        })?;

    storage
        .get_object_to_file(backup_key, staging.path())
        .await?;
    info!(
        "Downloaded {} from {}. Ready for restoration.",
        backup_key,
        storage.name()
    );

    if let Err(e) = api.upload_snapshot_file(staging.path(), collection).await {
        error!(
            "Failed to restore collection {} from uploaded snapshot: {}",
            collection, e
        );
        if let BackupError::Transport {
            status: Some(status),
            body: Some(body),
            ..
        } = &e
        {
            debug!("Database answered HTTP {} with body: {}", status, body);
        }
        return Err(e);
    }

    reporter.outcome(&format!(
        "Collection {collection} restored from backup {backup_key}."
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qdrant::fake::FakeSnapshotApi;
    use crate::storage::memory::MemoryBackend;

    const KEY: &str = "qdrant_backups/2024-03-05/docs-snap-1";

    #[tokio::test]
    async fn test_restore_uploads_downloaded_bytes() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let storage = MemoryBackend::default();
        storage.insert(KEY, b"snapshot bytes");
        let api = FakeSnapshotApi::default();

        run_restore(&storage, &api, KEY, "docs_restored", scratch.path(), &Reporter::default())
            .await?;

        let uploads = api.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].collection, "docs_restored");
        assert_eq!(uploads[0].contents, b"snapshot bytes".to_vec());
        assert_eq!(std::fs::read_dir(scratch.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_upload_is_reported() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let storage = MemoryBackend::default();
        storage.insert(KEY, b"snapshot bytes");
        let api = FakeSnapshotApi {
            upload_status: Some(400),
            ..FakeSnapshotApi::default()
        };

        let result =
            run_restore(&storage, &api, KEY, "docs", scratch.path(), &Reporter::default()).await;

        match result {
            Err(BackupError::Transport { status, body, .. }) => {
                assert_eq!(status, Some(400));
                assert!(body.unwrap_or_default().contains("Wrong input"));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
        // The staging file was still present while the database read it...
        let uploads = api.uploads();
        assert!(uploads[0].file_existed);
        assert_eq!(uploads[0].contents, b"snapshot bytes".to_vec());
        // ...and is gone once the restore has returned.
        assert_eq!(std::fs::read_dir(scratch.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_backup_never_reaches_database() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        let storage = MemoryBackend::default();
        let api = FakeSnapshotApi::default();

        let result = run_restore(
            &storage,
            &api,
            "qdrant_backups/2024-03-05/nope",
            "docs",
            scratch.path(),
            &Reporter::default(),
        )
        .await;

        assert!(matches!(result, Err(BackupError::StorageRead(_))));
        assert!(api.uploads().is_empty());
        Ok(())
    }
}
