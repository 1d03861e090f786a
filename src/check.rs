// qdrant-backup/src/check.rs
use tracing::error;

use crate::errors::Result;
use crate::storage::StorageBackend;
use crate::utils::output::Reporter;

/// Verifies the configured storage credentials with one read-only call.
pub async fn check_credentials(storage: &dyn StorageBackend, reporter: &Reporter) -> Result<()> {
    if let Err(e) = storage.check_credentials().await {
        error!("Failed to verify storage credentials: {}", e);
        return Err(e);
    }
    reporter.outcome(&format!(
        "Storage credentials for {} are valid.",
        storage.name()
    ));
    Ok(())
}
