// qdrant-backup/src/backup/mod.rs
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::errors::{BackupError, Result};
use crate::qdrant::SnapshotApi;
use crate::storage::StorageBackend;
use crate::utils::output::Reporter;
use crate::utils::staging::StagingFile;

/// Prefix shared by every backup taken on `date`: `{uri_prefix}/{YYYY-MM-DD}/`.
///
/// Listing relies on this exact layout to find backups again.
pub fn date_prefix(uri_prefix: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}/",
        uri_prefix.trim_end_matches('/'),
        date.format("%Y-%m-%d")
    )
}

/// Storage key of a snapshot taken on `date`: `{uri_prefix}/{YYYY-MM-DD}/{snapshot_name}`.
pub fn backup_key(uri_prefix: &str, date: NaiveDate, snapshot_name: &str) -> String {
    format!("{}{}", date_prefix(uri_prefix, date), snapshot_name)
}

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub uri_prefix: String,
    pub scratch_dir: PathBuf,
    /// Restrict the sweep to these collections. Empty means all.
    pub collections: Vec<String>,
}

#[derive(Debug)]
pub struct CollectionOutcome {
    pub collection: String,
    /// The storage key written, or why this collection was skipped.
    pub result: Result<String>,
}

#[derive(Debug, Default)]
pub struct BackupSummary {
    pub outcomes: Vec<CollectionOutcome>,
}

impl BackupSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &BackupError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(e) => Some((o.collection.as_str(), e)),
        })
    }
}

/// Snapshots every collection and copies each snapshot into object storage.
///
/// For each collection:
/// 1. Asks the database to create a snapshot.
/// 2. Downloads the snapshot into the scratch directory.
/// 3. Uploads it under `{uri_prefix}/{today}/{snapshot_name}`.
/// 4. Removes the staging file.
///
/// A failure in any step skips only that collection; the sweep always visits
/// every collection and reports the per-collection results.
pub async fn run_backup(
    storage: &dyn StorageBackend,
    api: &dyn SnapshotApi,
    options: &BackupOptions,
    today: NaiveDate,
    reporter: &Reporter,
) -> Result<BackupSummary> {
    let available = api.list_collections().await?;
    let targets = select_collections(available, &options.collections);
    info!("Collections selected for backup: {:?}", targets);

    let mut summary = BackupSummary::default();
    for (collection, exists) in targets {
        if !exists {
            warn!("Collection {} does not exist, skipping", collection);
            summary.outcomes.push(CollectionOutcome {
                result: Err(BackupError::Configuration(format!(
                    "Collection {collection} does not exist"
                ))),
                collection,
            });
            continue;
        }

        reporter.step(&format!("Backing up collection: {collection} ..."));
        let result = backup_collection(storage, api, options, today, &collection).await;
        match &result {
            Ok(key) => reporter.outcome(&format!(
                "Collection {} backed up to {} in path {}.",
                collection,
                storage.name(),
                key
            )),
            Err(e) => {
                error!("Backup of collection {} failed: {}", collection, e);
                reporter.step(&format!("❌ Collection {collection} was not backed up: {e}"));
            }
        }
        summary.outcomes.push(CollectionOutcome { collection, result });
    }

    reporter.step(&format!(
        "Backup finished: {} succeeded, {} failed.",
        summary.succeeded(),
        summary.failed()
    ));
    Ok(summary)
}

fn select_collections(available: Vec<String>, requested: &[String]) -> Vec<(String, bool)> {
    if requested.is_empty() {
        return available.into_iter().map(|c| (c, true)).collect();
    }
    requested
        .iter()
        .map(|name| (name.clone(), available.contains(name)))
        .collect()
}

async fn backup_collection(
    storage: &dyn StorageBackend,
    api: &dyn SnapshotApi,
    options: &BackupOptions,
    today: NaiveDate,
    collection: &str,
) -> Result<String> {
    let snapshot = api.create_snapshot(collection).await?;
    info!(
        "Snapshot {} created for {} (size: {:?}, created: {:?})",
        snapshot.name, collection, snapshot.size, snapshot.creation_time
    );
    let snapshot_url = api.snapshot_url(collection, &snapshot.name);
    let key = backup_key(&options.uri_prefix, today, &snapshot.name);
    let staging = StagingFile::reserve(&options.scratch_dir, &snapshot.name)?;

    if let Err(e) = api.download_snapshot(&snapshot_url, staging.path()).await {
        error!("Failed to download {} {}", snapshot_url, e);
        return Err(e);
    }

    let uploaded = storage.put_object(&key, staging.path()).await;

    // Staging cleanup never decides the outcome.
    if let Err(e) = staging.remove() {
        warn!("{}", e);
    }

    uploaded?;
    Ok(key)
}
