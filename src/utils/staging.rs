// qdrant-backup/src/utils/staging.rs
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::{BackupError, Result};

/// A scratch file owned by a single backup step.
///
/// The file is removed either explicitly through [`StagingFile::remove`] or,
/// on any early exit, when the guard is dropped.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    armed: bool,
}

impl StagingFile {
    /// Reserves `scratch_dir/<file name>` for `name`. Directory components in
    /// `name` are discarded so a snapshot name can never escape the scratch dir.
    pub fn reserve(scratch_dir: &Path, name: &str) -> Result<Self> {
        let file_name = Path::new(name)
            .file_name()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BackupError::LocalIo(format!("Invalid staging file name: {name:?}")))?;

        std::fs::create_dir_all(scratch_dir).map_err(|e| {
            BackupError::LocalIo(format!(
                "Failed to create scratch directory {}: {}",
                scratch_dir.display(),
                e
            ))
        })?;

        Ok(StagingFile {
            path: scratch_dir.join(file_name),
            armed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(mut self) -> Result<()> {
        self.armed = false;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Temporary snapshot file {} deleted.", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackupError::LocalIo(format!(
                "Error deleting temporary snapshot file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Error deleting temporary snapshot file {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
