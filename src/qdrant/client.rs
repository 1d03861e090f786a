// qdrant-backup/src/qdrant/client.rs
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{SnapshotApi, SnapshotDescription};
use crate::config::QdrantConfig;
use crate::errors::{BackupError, Result};

const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

/// HTTP client for the Qdrant REST API.
pub struct QdrantClient {
    http: reqwest::Client,
    base_url: String,
}

impl QdrantClient {
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(api_key).map_err(|e| {
                BackupError::Configuration(format!("QDRANT_KEY is not a valid header value: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BackupError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(QdrantClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/collections/{}",
            self.base_url,
            urlencoding::encode(collection)
        )
    }
}

async fn ensure_status(response: Response, what: &str, accept_any_success: bool) -> Result<Response> {
    let status = response.status();
    let ok = if accept_any_success {
        status.is_success()
    } else {
        status == StatusCode::OK
    };
    if ok {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackupError::http_status(what, status.as_u16(), body))
}

#[async_trait]
impl SnapshotApi for QdrantClient {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base_url);
        let response = self.http.get(&url).send().await?;
        let response = ensure_status(response, "Listing collections failed", true).await?;
        let parsed: ApiResponse<CollectionsResult> = response.json().await?;
        Ok(parsed
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn create_snapshot(&self, collection: &str) -> Result<SnapshotDescription> {
        let url = format!("{}/snapshots", self.collection_url(collection));
        debug!("Creating snapshot via POST {}", url);
        let response = self.http.post(&url).send().await?;
        let response = ensure_status(
            response,
            &format!("Snapshot creation for collection {collection} failed"),
            true,
        )
        .await?;
        let parsed: ApiResponse<SnapshotDescription> = response.json().await?;
        Ok(parsed.result)
    }

    fn snapshot_url(&self, collection: &str, snapshot_name: &str) -> String {
        format!(
            "{}/snapshots/{}",
            self.collection_url(collection),
            urlencoding::encode(snapshot_name)
        )
    }

    async fn download_snapshot(&self, snapshot_url: &str, local_path: &Path) -> Result<u64> {
        let response = self.http.get(snapshot_url).send().await?;
        let response = ensure_status(
            response,
            &format!("Download of {snapshot_url} failed"),
            true,
        )
        .await?;

        let parent = local_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(parent)
            .map_err(|e| {
                BackupError::LocalIo(format!(
                    "Failed to create staging file in {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        let (std_file, partial_path) = partial.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| {
                BackupError::LocalIo(format!(
                    "Failed to write to {}: {}",
                    partial_path.display(),
                    e
                ))
            })?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| {
            BackupError::LocalIo(format!("Failed to flush {}: {}", partial_path.display(), e))
        })?;
        drop(file);

        // Only a fully written body becomes visible under the final name.
        partial_path.persist(local_path).map_err(|e| {
            BackupError::LocalIo(format!(
                "Failed to move snapshot into {}: {}",
                local_path.display(),
                e
            ))
        })?;

        info!("Downloaded {} ({} bytes)", snapshot_url, written);
        Ok(written)
    }

    async fn upload_snapshot_file(&self, local_path: &Path, collection: &str) -> Result<()> {
        let url = format!(
            "{}/snapshots/upload?priority=snapshot",
            self.collection_url(collection)
        );

        let file = tokio::fs::File::open(local_path).await.map_err(|e| {
            BackupError::LocalIo(format!("Failed to open {}: {}", local_path.display(), e))
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| {
                BackupError::LocalIo(format!("Failed to stat {}: {}", local_path.display(), e))
            })?
            .len();
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());

        let part = Part::stream_with_length(
            reqwest::Body::wrap_stream(ReaderStream::new(file)),
            length,
        )
        .file_name(file_name);
        let form = Form::new().part("snapshot", part);

        let response = self.http.post(&url).multipart(form).send().await?;
        ensure_status(
            response,
            &format!("Failed to restore collection {collection} from uploaded snapshot"),
            false,
        )
        .await?;

        info!(
            "Collection {} restored successfully from uploaded snapshot.",
            collection
        );
        Ok(())
    }
}
