// qdrant-backup/src/catalog/list.rs
use chrono::{Days, NaiveDate};
use tracing::{error, info};

use crate::backup::date_prefix;
use crate::errors::BackupError;
use crate::storage::{ObjectInfo, StorageBackend};
use crate::utils::format::{format_size, format_timestamp};

const HEADERS: [&str; 3] = ["Backup Name", "Last Modified", "Size"];

#[derive(Debug, Default)]
pub struct Listing {
    /// Sorted oldest first.
    pub backups: Vec<ObjectInfo>,
    /// Day prefixes that could not be listed.
    pub failed_prefixes: Vec<(String, BackupError)>,
}

/// Collects the backups of `today` and the `days - 1` days before it.
///
/// Each day prefix is listed independently; a prefix that fails is recorded
/// and skipped. Results are ordered by last-modified time, ties keeping the
/// order in which they were discovered.
pub async fn list_backups(
    storage: &dyn StorageBackend,
    uri_prefix: &str,
    days: u32,
    today: NaiveDate,
) -> Listing {
    let mut listing = Listing::default();

    for day_offset in 0..days {
        let Some(day) = today.checked_sub_days(Days::new(u64::from(day_offset))) else {
            break;
        };
        let prefix = date_prefix(uri_prefix, day);
        match storage.list_objects(&prefix).await {
            Ok(objects) => {
                info!("Found {} objects under {}", objects.len(), prefix);
                listing.backups.extend(objects);
            }
            Err(e) => {
                error!("Failed to list backups under {}: {}", prefix, e);
                listing.failed_prefixes.push((prefix, e));
            }
        }
    }

    listing.backups.sort_by_key(|o| o.last_modified);
    listing
}

/// Plain aligned table, one row per backup, header row always present.
pub fn render_table(backups: &[ObjectInfo]) -> String {
    let rows: Vec<[String; 3]> = backups
        .iter()
        .map(|o| {
            [
                o.key.clone(),
                format_timestamp(&o.last_modified),
                format_size(o.size),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header = HEADERS.map(str::to_string);
    std::iter::once(&header)
        .chain(rows.iter())
        .map(|row| {
            let line = row
                .iter()
                .zip(widths.iter())
                .map(|(cell, &width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;
    use chrono::{TimeZone, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn object(key: &str, secs: i64, size: u64) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            last_modified: Utc.timestamp_opt(secs, 0).unwrap(),
            size,
        }
    }

    #[tokio::test]
    async fn test_empty_store_renders_header_only() {
        let storage = MemoryBackend::default();
        let listing = list_backups(&storage, "qdrant_backups", 3, today()).await;

        assert!(listing.backups.is_empty());
        assert!(listing.failed_prefixes.is_empty());
        assert_eq!(render_table(&listing.backups), "Backup Name  Last Modified  Size");
    }

    #[tokio::test]
    async fn test_merges_day_prefixes_sorted_by_time() {
        let storage = MemoryBackend::default();
        storage.set_listing(
            "qdrant_backups/2024-03-05/",
            vec![object("p/2024-03-05/late", 300, 1), object("p/2024-03-05/early", 100, 1)],
        );
        storage.set_listing(
            "qdrant_backups/2024-03-04/",
            vec![object("p/2024-03-04/mid", 200, 1)],
        );
        storage.set_listing(
            "qdrant_backups/2024-03-03/",
            vec![object("p/2024-03-03/tie", 300, 1)],
        );
        // Outside the three day window.
        storage.set_listing(
            "qdrant_backups/2024-03-02/",
            vec![object("p/2024-03-02/old", 50, 1)],
        );

        let listing = list_backups(&storage, "qdrant_backups", 3, today()).await;
        let keys: Vec<&str> = listing.backups.iter().map(|o| o.key.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "p/2024-03-05/early",
                "p/2024-03-04/mid",
                "p/2024-03-05/late",
                "p/2024-03-03/tie",
            ]
        );
        assert!(
            listing
                .backups
                .windows(2)
                .all(|w| w[0].last_modified <= w[1].last_modified)
        );
    }

    #[tokio::test]
    async fn test_finds_backups_written_with_backup_keys() {
        let storage = MemoryBackend::default();
        storage.insert(&crate::backup::backup_key("qdrant_backups", today(), "docs-snap-1"), b"x");
        storage.insert("qdrant_backups/unrelated", b"y");

        let listing = list_backups(&storage, "qdrant_backups", 1, today()).await;
        assert_eq!(listing.backups.len(), 1);
        assert_eq!(listing.backups[0].key, "qdrant_backups/2024-03-05/docs-snap-1");
    }

    #[tokio::test]
    async fn test_failed_day_is_skipped_others_still_listed() {
        let mut storage = MemoryBackend::default();
        storage
            .fail_list_prefixes
            .insert("qdrant_backups/2024-03-04/".to_string());
        storage.set_listing(
            "qdrant_backups/2024-03-05/",
            vec![object("p/2024-03-05/b", 200, 1)],
        );
        storage.set_listing(
            "qdrant_backups/2024-03-04/",
            vec![object("p/2024-03-04/hidden", 150, 1)],
        );
        storage.set_listing(
            "qdrant_backups/2024-03-03/",
            vec![object("p/2024-03-03/a", 100, 1)],
        );

        let listing = list_backups(&storage, "qdrant_backups", 3, today()).await;
        let keys: Vec<&str> = listing.backups.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["p/2024-03-03/a", "p/2024-03-05/b"]);

        let failed: Vec<&str> = listing
            .failed_prefixes
            .iter()
            .map(|(prefix, _)| prefix.as_str())
            .collect();
        assert_eq!(failed, vec!["qdrant_backups/2024-03-04/"]);
        assert!(matches!(
            listing.failed_prefixes[0].1,
            BackupError::StorageRead(_)
        ));

        let table = render_table(&listing.backups);
        assert!(table.starts_with("Backup Name"));
        assert_eq!(table.lines().count(), 3);
    }

    #[test]
    fn test_render_table_aligns_columns() {
        let rows = vec![
            object("qdrant_backups/2024-03-05/a", 0, 1536),
            object("qdrant_backups/2024-03-05/bb", 0, 0),
        ];
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Backup Name "));
        let size_column = lines[0].find("Size").unwrap();
        assert_eq!(&lines[1][size_column..], "1.5 KB");
        assert_eq!(&lines[2][size_column..], "0B");
    }
}
