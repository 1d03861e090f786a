// In-memory backend used by the orchestration tests.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use super::{ObjectInfo, StorageBackend};
use crate::errors::{BackupError, Result};

#[derive(Default)]
pub struct MemoryBackend {
    pub(crate) objects: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    // Per-prefix listing overrides, returned verbatim in the given order.
    pub(crate) listings: Mutex<BTreeMap<String, Vec<ObjectInfo>>>,
    pub reject_credentials: bool,
    pub fail_deletes: bool,
    /// Keys whose upload is refused.
    pub fail_puts: HashSet<String>,
    /// Prefixes whose listing is refused.
    pub fail_list_prefixes: HashSet<String>,
}

impl MemoryBackend {
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data.to_vec(), Utc::now()));
    }

    pub fn set_listing(&self, prefix: &str, objects: Vec<ObjectInfo>) {
        self.listings
            .lock()
            .unwrap()
            .insert(prefix.to_string(), objects);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(d, _)| d.clone())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "MEMORY"
    }

    async fn put_object(&self, key: &str, local_path: &Path) -> Result<()> {
        if self.fail_puts.contains(key) {
            return Err(BackupError::StorageWrite(format!("quota exceeded: {key}")));
        }
        let data = std::fs::read(local_path).map_err(|e| BackupError::LocalIo(e.to_string()))?;
        self.insert(key, &data);
        Ok(())
    }

    async fn get_object_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let data = self
            .get(key)
            .ok_or_else(|| BackupError::StorageRead(format!("no such key: {key}")))?;
        std::fs::write(local_path, data).map_err(|e| BackupError::LocalIo(e.to_string()))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        if self.fail_deletes {
            return Err(BackupError::StorageWrite(format!("access denied: {key}")));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        if self.fail_list_prefixes.contains(prefix) {
            return Err(BackupError::StorageRead(format!("access denied: {prefix}")));
        }
        if let Some(listing) = self.listings.lock().unwrap().get(prefix) {
            return Ok(listing.clone());
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, (data, modified))| ObjectInfo {
                key: key.clone(),
                last_modified: *modified,
                size: data.len() as u64,
            })
            .collect())
    }

    async fn check_credentials(&self) -> Result<()> {
        if self.reject_credentials {
            return Err(BackupError::Credential("InvalidAccessKeyId".to_string()));
        }
        Ok(())
    }
}
