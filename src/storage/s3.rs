// qdrant-backup/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, TimeZone, Utc};
use s3::config::{BehaviorVersion, Credentials, Region};
use s3::error::DisplayErrorContext;
use s3::primitives::{ByteStream, Length};
use s3::types::{CompletedMultipartUpload, CompletedPart};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::{ObjectInfo, StorageBackend};
use crate::config::StorageConfig;
use crate::errors::{BackupError, Result};

// Files larger than this go through a multipart upload; single PUTs are capped by S3.
const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;
const PART_SIZE: u64 = 64 * 1024 * 1024;

/// S3-compatible object storage (AWS, or any endpoint given in `STORAGE_ENDPOINT`).
pub struct S3Backend {
    client: s3::Client,
    bucket: String,
}

impl S3Backend {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        // Custom endpoints (MinIO, Spaces, ...) are addressed path-style.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Ok(S3Backend {
            client: s3::Client::from_conf(s3_config),
            bucket: config.bucket_name.clone(),
        })
    }

    async fn put_single(&self, key: &str, local_path: &Path) -> Result<()> {
        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            BackupError::LocalIo(format!(
                "Failed to create ByteStream from file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageWrite(format!(
                    "Failed to upload {} to s3://{}/{}: {}",
                    local_path.display(),
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn put_multipart(&self, key: &str, local_path: &Path, size: u64) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageWrite(format!(
                    "Failed to start multipart upload for s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        let upload_id = created.upload_id().ok_or_else(|| {
            BackupError::StorageWrite(format!(
                "Multipart upload for s3://{}/{} returned no upload id",
                self.bucket, key
            ))
        })?;

        let result = self.upload_parts(key, local_path, size, upload_id).await;
        if result.is_err() {
            if let Err(e) = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .send()
                .await
            {
                warn!(
                    "Failed to abort multipart upload {} for s3://{}/{}: {}",
                    upload_id,
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                );
            }
        }
        result
    }

    async fn upload_parts(
        &self,
        key: &str,
        local_path: &Path,
        size: u64,
        upload_id: &str,
    ) -> Result<()> {
        let mut parts = Vec::new();
        let mut offset = 0u64;
        let mut part_number = 1i32;

        while offset < size {
            let length = PART_SIZE.min(size - offset);
            let body = ByteStream::read_from()
                .path(local_path)
                .offset(offset)
                .length(Length::Exact(length))
                .build()
                .await
                .map_err(|e| {
                    BackupError::LocalIo(format!(
                        "Failed to read part {} of {}: {}",
                        part_number,
                        local_path.display(),
                        e
                    ))
                })?;

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| {
                    BackupError::StorageWrite(format!(
                        "Failed to upload part {} of s3://{}/{}: {}",
                        part_number,
                        self.bucket,
                        key,
                        DisplayErrorContext(&e)
                    ))
                })?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            offset += length;
            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageWrite(format!(
                    "Failed to complete multipart upload for s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        "S3"
    }

    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()> {
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| {
                BackupError::LocalIo(format!("Failed to stat {}: {}", local_path.display(), e))
            })?
            .len();

        if size > MULTIPART_THRESHOLD {
            self.put_multipart(key, local_path, size).await?;
        } else {
            self.put_single(key, local_path).await?;
        }

        info!(
            "Uploaded {} ({} bytes) to s3://{}/{}",
            local_path.display(),
            size,
            self.bucket,
            key
        );
        Ok(())
    }

    async fn get_object_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageRead(format!(
                    "Failed to get object s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        let mut output_file = File::create(local_path).await.map_err(|e| {
            BackupError::LocalIo(format!(
                "Failed to create destination file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let mut total_bytes_downloaded = 0usize;
        while let Some(bytes_chunk) = object.body.try_next().await.map_err(|e| {
            BackupError::StorageRead(format!(
                "Failed while reading s3://{}/{}: {}",
                self.bucket, key, e
            ))
        })? {
            output_file.write_all(&bytes_chunk).await.map_err(|e| {
                BackupError::LocalIo(format!(
                    "Failed to write to destination file {}: {}",
                    local_path.display(),
                    e
                ))
            })?;
            total_bytes_downloaded += bytes_chunk.len();
        }
        output_file.flush().await.map_err(|e| {
            BackupError::LocalIo(format!("Failed to flush {}: {}", local_path.display(), e))
        })?;

        info!(
            "Downloaded {} bytes from s3://{}/{} to {}",
            total_bytes_downloaded,
            self.bucket,
            key,
            local_path.display()
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageWrite(format!(
                    "Failed to delete s3://{}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                BackupError::StorageRead(format!(
                    "Failed to list s3://{}/{}: {}",
                    self.bucket,
                    prefix,
                    DisplayErrorContext(&e)
                ))
            })?;
            objects.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object_info(&self.bucket, object)),
            );
        }
        Ok(objects)
    }

    async fn check_credentials(&self) -> Result<()> {
        self.client.list_buckets().send().await.map_err(|e| {
            BackupError::Credential(format!("S3 ListBuckets failed: {}", DisplayErrorContext(&e)))
        })?;
        Ok(())
    }
}

// Objects without a usable LastModified are left out rather than sorted as 1970.
fn object_info(bucket: &str, object: &s3::types::Object) -> Option<ObjectInfo> {
    let key = object.key()?;
    let Some(last_modified) = object.last_modified().and_then(to_chrono) else {
        warn!(
            "Skipping s3://{}/{}: missing or invalid LastModified",
            bucket, key
        );
        return None;
    };
    Some(ObjectInfo {
        key: key.to_string(),
        last_modified,
        size: object.size().unwrap_or(0).max(0) as u64,
    })
}

fn to_chrono(timestamp: &s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp.secs(), timestamp.subsec_nanos())
        .single()
}
