// qdrant-backup/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::BackupError;

pub const DEFAULT_STORAGE_SERVICE: &str = "OSS";
pub const DEFAULT_STORAGE_REGION: &str = "us-east-1";
pub const DEFAULT_URI_PREFIX: &str = "qdrant_backups";

// Values as they come from the optional JSON file and the environment,
// before any validation. Every field is optional here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub storage_service: Option<String>,
    pub storage_region: Option<String>,
    pub storage_endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket_name: Option<String>,
    pub uri_prefix: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_key: Option<String>,
    pub scratch_dir: Option<PathBuf>,
}

impl RawConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }

    /// Environment variables take precedence over values read from the file.
    pub fn overlay_env(self) -> Self {
        self.overlay_with(|name| std::env::var(name).ok())
    }

    fn overlay_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |current: &mut Option<String>, name: &str| {
            if let Some(value) = lookup(name) {
                *current = Some(value);
            }
        };
        pick(&mut self.storage_service, "STORAGE_SERVICE");
        pick(&mut self.storage_region, "STORAGE_REGION");
        pick(&mut self.storage_endpoint, "STORAGE_ENDPOINT");
        pick(&mut self.access_key, "ACCESS_KEY");
        pick(&mut self.secret_key, "SECRET_KEY");
        pick(&mut self.bucket_name, "BUCKET_NAME");
        pick(&mut self.uri_prefix, "URI_PREFIX");
        pick(&mut self.qdrant_url, "QDRANT_URL");
        pick(&mut self.qdrant_key, "QDRANT_KEY");
        if let Some(dir) = lookup("SCRATCH_DIR") {
            self.scratch_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageService {
    S3,
    Oss,
}

impl FromStr for StorageService {
    type Err = BackupError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S3" => Ok(StorageService::S3),
            "OSS" => Ok(StorageService::Oss),
            other => Err(BackupError::Configuration(format!(
                "Unsupported storage service: {other}"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct StorageConfig {
    pub service: StorageService,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    pub uri_prefix: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("service", &self.service)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("uri_prefix", &self.uri_prefix)
            .finish()
    }
}

#[derive(Clone)]
pub struct QdrantConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl fmt::Debug for QdrantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QdrantConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Process-wide configuration, built once at startup and passed by reference afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    /// Only the backup and restore commands talk to the database.
    pub qdrant: Option<QdrantConfig>,
    pub scratch_dir: PathBuf,
}

impl AppConfig {
    /// Reads `.env`, the optional JSON file and the process environment, then validates.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let _ = dotenv::dotenv();

        let raw = match config_path {
            Some(path) => RawConfig::load_from_json(path)?,
            None => RawConfig::default(),
        };
        let config = AppConfig::from_raw(raw.overlay_env())?;
        Ok(config)
    }

    pub fn from_raw(raw: RawConfig) -> crate::errors::Result<Self> {
        let service: StorageService = non_empty(raw.storage_service)
            .unwrap_or_else(|| DEFAULT_STORAGE_SERVICE.to_string())
            .parse()?;
        let region = non_empty(raw.storage_region)
            .unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string());
        let access_key = required(raw.access_key, "ACCESS_KEY")?;
        let secret_key = required(raw.secret_key, "SECRET_KEY")?;
        let bucket_name = required(raw.bucket_name, "BUCKET_NAME")?;
        let uri_prefix = non_empty(raw.uri_prefix)
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_URI_PREFIX.to_string());

        let qdrant = match non_empty(raw.qdrant_url) {
            Some(qdrant_url) => Some(QdrantConfig {
                base_url: validate_qdrant_url(&qdrant_url)?,
                api_key: non_empty(raw.qdrant_key),
            }),
            None => None,
        };

        Ok(AppConfig {
            storage: StorageConfig {
                service,
                region,
                endpoint: non_empty(raw.storage_endpoint),
                access_key,
                secret_key,
                bucket_name,
                uri_prefix,
            },
            qdrant,
            scratch_dir: raw
                .scratch_dir
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(std::env::temp_dir),
        })
    }

    pub fn qdrant(&self) -> crate::errors::Result<&QdrantConfig> {
        self.qdrant
            .as_ref()
            .ok_or_else(|| BackupError::Configuration("QDRANT_URL must be set".to_string()))
    }
}

fn validate_qdrant_url(qdrant_url: &str) -> crate::errors::Result<String> {
    let parsed = url::Url::parse(qdrant_url).map_err(|e| {
        BackupError::Configuration(format!("QDRANT_URL is not a valid URL ({qdrant_url}): {e}"))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(BackupError::Configuration(format!(
            "QDRANT_URL must use http or https, got {}",
            parsed.scheme()
        )));
    }
    Ok(qdrant_url.trim_end_matches('/').to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &str) -> crate::errors::Result<String> {
    non_empty(value).ok_or_else(|| BackupError::Configuration(format!("{name} must be set")))
}
