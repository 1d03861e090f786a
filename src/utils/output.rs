// qdrant-backup/src/utils/output.rs
use tracing::info;

/// Routes user-facing progress lines.
///
/// `step` lines are always printed. `outcome` lines go to the log when running
/// verbose and to stdout otherwise, so they are never shown twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    verbose: bool,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Reporter { verbose }
    }

    pub fn step(&self, message: &str) {
        println!("{message}");
        info!("{message}");
    }

    pub fn outcome(&self, message: &str) {
        if self.verbose {
            info!("{message}");
        } else {
            println!("{message}");
        }
    }
}
