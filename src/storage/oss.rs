// qdrant-backup/src/storage/oss.rs
//! Aliyun OSS backend, spoken directly over its REST API.
//!
//! Requests are signed with the header-based scheme:
//! `Authorization: OSS <AccessKeyId>:<Signature>` where the signature is
//! `base64(hmac-sha1(secret, VERB \n Content-MD5 \n Content-Type \n Date \n CanonicalizedResource))`.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use sha1::Sha1;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::{Host, Url};

use super::{ObjectInfo, StorageBackend};
use crate::config::StorageConfig;
use crate::errors::{BackupError, Result};

type HmacSha1 = Hmac<Sha1>;

const OBJECT_CONTENT_TYPE: &str = "application/octet-stream";
const LIST_PAGE_SIZE: u32 = 1000;

pub struct OssBackend {
    http: reqwest::Client,
    endpoint: Url,
    bucket_url: String,
    bucket: String,
    access_key: String,
    secret_key: String,
}

impl OssBackend {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let endpoint_str = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://oss-{}.aliyuncs.com", config.region));
        let endpoint = Url::parse(&endpoint_str).map_err(|e| {
            BackupError::Configuration(format!("Invalid OSS endpoint {endpoint_str}: {e}"))
        })?;
        let host = endpoint.host_str().ok_or_else(|| {
            BackupError::Configuration(format!("OSS endpoint {endpoint_str} has no host"))
        })?;
        let authority = match endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        // IP endpoints cannot carry a bucket subdomain, so they are addressed path-style.
        let bucket_url = match endpoint.host() {
            Some(Host::Domain(_)) => {
                format!("{}://{}.{}", endpoint.scheme(), config.bucket_name, authority)
            }
            _ => format!("{}://{}/{}", endpoint.scheme(), authority, config.bucket_name),
        };

        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BackupError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(OssBackend {
            http,
            endpoint,
            bucket_url,
            bucket: config.bucket_name.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.bucket_url, encoded.join("/"))
    }

    /// Builds a request carrying `Date` and `Authorization` headers for `resource`.
    fn signed(
        &self,
        method: Method,
        url: &str,
        resource: &str,
        content_type: Option<&str>,
    ) -> Result<RequestBuilder> {
        let date = http_date(&Utc::now());
        let string_to_sign =
            string_to_sign(method.as_str(), "", content_type.unwrap_or(""), &date, resource);
        let signature = sign(&self.secret_key, &string_to_sign)?;
        debug!("OSS {} {} signed for resource {}", method, url, resource);

        let mut request = self
            .http
            .request(method, url)
            .header(DATE, date)
            .header(
                AUTHORIZATION,
                format!("OSS {}:{}", self.access_key, signature),
            );
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        Ok(request)
    }

    fn object_resource(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    fn bucket_resource(&self) -> String {
        format!("/{}/", self.bucket)
    }
}

#[async_trait]
impl StorageBackend for OssBackend {
    fn name(&self) -> &str {
        "OSS"
    }

    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()> {
        let file = File::open(local_path).await.map_err(|e| {
            BackupError::LocalIo(format!("Failed to open {}: {}", local_path.display(), e))
        })?;
        let size = file
            .metadata()
            .await
            .map_err(|e| {
                BackupError::LocalIo(format!("Failed to stat {}: {}", local_path.display(), e))
            })?
            .len();

        let response = self
            .signed(
                Method::PUT,
                &self.object_url(key),
                &self.object_resource(key),
                Some(OBJECT_CONTENT_TYPE),
            )?
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageWrite(format!("Failed to upload oss://{}/{}: {}", self.bucket, key, e))
            })?;
        ensure_success(response, |msg| {
            BackupError::StorageWrite(format!("Upload of oss://{}/{} failed: {}", self.bucket, key, msg))
        })
        .await?;

        info!(
            "Uploaded {} ({} bytes) to oss://{}/{}",
            local_path.display(),
            size,
            self.bucket,
            key
        );
        Ok(())
    }

    async fn get_object_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let response = self
            .signed(
                Method::GET,
                &self.object_url(key),
                &self.object_resource(key),
                None,
            )?
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageRead(format!("Failed to get oss://{}/{}: {}", self.bucket, key, e))
            })?;
        let response = ensure_success(response, |msg| {
            BackupError::StorageRead(format!("Download of oss://{}/{} failed: {}", self.bucket, key, msg))
        })
        .await?;

        let mut output_file = File::create(local_path).await.map_err(|e| {
            BackupError::LocalIo(format!(
                "Failed to create destination file {}: {}",
                local_path.display(),
                e
            ))
        })?;
        let mut total_bytes_downloaded = 0usize;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                BackupError::StorageRead(format!(
                    "Failed while reading oss://{}/{}: {}",
                    self.bucket, key, e
                ))
            })?;
            output_file.write_all(&chunk).await.map_err(|e| {
                BackupError::LocalIo(format!(
                    "Failed to write to destination file {}: {}",
                    local_path.display(),
                    e
                ))
            })?;
            total_bytes_downloaded += chunk.len();
        }
        output_file.flush().await.map_err(|e| {
            BackupError::LocalIo(format!("Failed to flush {}: {}", local_path.display(), e))
        })?;

        info!(
            "Downloaded {} bytes from oss://{}/{} to {}",
            total_bytes_downloaded,
            self.bucket,
            key,
            local_path.display()
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let response = self
            .signed(
                Method::DELETE,
                &self.object_url(key),
                &self.object_resource(key),
                None,
            )?
            .send()
            .await
            .map_err(|e| {
                BackupError::StorageWrite(format!("Failed to delete oss://{}/{}: {}", self.bucket, key, e))
            })?;
        ensure_success(response, |msg| {
            BackupError::StorageWrite(format!("Delete of oss://{}/{} failed: {}", self.bucket, key, msg))
        })
        .await?;
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut marker = String::new();

        loop {
            let url = format!(
                "{}/?max-keys={}&prefix={}&marker={}",
                self.bucket_url,
                LIST_PAGE_SIZE,
                urlencoding::encode(prefix),
                urlencoding::encode(&marker)
            );
            let response = self
                .signed(Method::GET, &url, &self.bucket_resource(), None)?
                .send()
                .await
                .map_err(|e| {
                    BackupError::StorageRead(format!(
                        "Failed to list oss://{}/{}: {}",
                        self.bucket, prefix, e
                    ))
                })?;
            let response = ensure_success(response, |msg| {
                BackupError::StorageRead(format!(
                    "Listing oss://{}/{} failed: {}",
                    self.bucket, prefix, msg
                ))
            })
            .await?;
            let body = response.text().await.map_err(|e| {
                BackupError::StorageRead(format!("Failed to read listing body: {e}"))
            })?;

            let page = parse_list_page(&body)?;
            objects.extend(page.objects);
            match page.next_marker {
                Some(next) => marker = next,
                None => break,
            }
        }
        Ok(objects)
    }

    async fn check_credentials(&self) -> Result<()> {
        let url = format!("{}/?bucketInfo", self.bucket_url);
        let resource = format!("{}?bucketInfo", self.bucket_resource());
        let response = self
            .signed(Method::GET, &url, &resource, None)?
            .send()
            .await
            .map_err(|e| BackupError::Credential(format!("OSS GetBucketInfo failed: {e}")))?;
        ensure_success(response, |msg| {
            BackupError::Credential(format!("OSS GetBucketInfo failed: {msg}"))
        })
        .await?;
        Ok(())
    }
}

async fn ensure_success<F>(response: Response, to_error: F) -> Result<Response>
where
    F: FnOnce(String) -> BackupError,
{
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(to_error(format!("HTTP {}: {}", status.as_u16(), body.trim())))
}

fn http_date(now: &DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn string_to_sign(
    verb: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    resource: &str,
) -> String {
    format!("{verb}\n{content_md5}\n{content_type}\n{date}\n{resource}")
}

fn sign(secret_key: &str, string_to_sign: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .map_err(|e| BackupError::Configuration(format!("Invalid OSS secret key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<OssObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OssObject {
    key: String,
    last_modified: String,
    size: u64,
}

struct ListPage {
    objects: Vec<ObjectInfo>,
    next_marker: Option<String>,
}

fn parse_list_page(xml: &str) -> Result<ListPage> {
    let result: ListBucketResult = quick_xml::de::from_str(xml)
        .map_err(|e| BackupError::StorageRead(format!("Malformed OSS listing: {e}")))?;

    let mut objects = Vec::with_capacity(result.contents.len());
    for object in result.contents {
        let last_modified = DateTime::parse_from_rfc3339(&object.last_modified)
            .map_err(|e| {
                BackupError::StorageRead(format!(
                    "Invalid LastModified {:?} for {}: {}",
                    object.last_modified, object.key, e
                ))
            })?
            .with_timezone(&Utc);
        objects.push(ObjectInfo {
            key: object.key,
            last_modified,
            size: object.size,
        });
    }

    let next_marker = if result.is_truncated {
        result
            .next_marker
            .filter(|m| !m.is_empty())
            .or_else(|| objects.last().map(|o| o.key.clone()))
    } else {
        None
    };
    Ok(ListPage {
        objects,
        next_marker,
    })
}
