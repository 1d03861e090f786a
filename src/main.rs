//! Qdrant Backup Tool
//!
//! Backs up Qdrant collections to S3 or OSS object storage, lists and deletes
//! those backups, and restores collections from them.

// qdrant-backup/src/main.rs
mod backup;
mod catalog;
mod check;
mod config;
mod errors;
mod qdrant;
mod restore;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use config::AppConfig;
use qdrant::QdrantClient;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use utils::output::Reporter;

/// Qdrant Backup CLI
#[derive(Parser, Debug)]
#[command(name = "qdrant-backup")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (info level logging).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Optional JSON configuration file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check storage credentials
    Check,

    /// Backup Qdrant collections to storage
    Backup {
        /// Only back up this collection (repeatable). Defaults to all collections.
        #[arg(long = "collection")]
        collections: Vec<String>,
    },

    /// List recent backups
    List {
        /// How many days to look back for backups
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,
    },

    /// Restore a Qdrant collection from a backup in storage
    Restore {
        /// Storage key of the backup, as shown by `list`
        backup_key: String,
        /// Collection to restore into
        collection: String,
    },

    /// Delete a backup from storage
    Delete {
        /// Storage key of the backup, as shown by `list`
        backup_key: String,
    },
}

/// Main entry point for the backup tool
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_app(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("⚠️ Operation finished with failures.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,qdrant_backup=info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one command. `Ok(false)` means the command completed but some of its
/// work failed (a skipped collection, an undeleted backup, ...).
async fn run_app(cli: Cli) -> Result<bool> {
    let reporter = Reporter::new(cli.verbose);
    let app_config = AppConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    tracing::info!(storage = ?app_config.storage, "Configuration loaded");

    let storage = storage::build_storage_backend(&app_config.storage)
        .await
        .context("Failed to initialize storage client. Please check your credentials.")?;
    let today = Local::now().date_naive();

    match cli.command {
        Command::Check => {
            check::check_credentials(storage.as_ref(), &reporter)
                .await
                .context("Storage credential check failed")?;
            Ok(true)
        }
        Command::Backup { collections } => {
            let api = QdrantClient::new(app_config.qdrant()?)?;
            let options = backup::BackupOptions {
                uri_prefix: app_config.storage.uri_prefix.clone(),
                scratch_dir: app_config.scratch_dir.clone(),
                collections,
            };
            let summary = backup::run_backup(storage.as_ref(), &api, &options, today, &reporter)
                .await
                .context("Backup process failed")?;
            for (collection, error) in summary.failures() {
                eprintln!("❌ {}: {}", collection, error);
            }
            Ok(summary.failed() == 0)
        }
        Command::List { days } => {
            let listing =
                catalog::list_backups(storage.as_ref(), &app_config.storage.uri_prefix, days, today)
                    .await;
            reporter.outcome(&catalog::render_table(&listing.backups));
            for (prefix, error) in &listing.failed_prefixes {
                eprintln!("❌ Could not list {}: {}", prefix, error);
            }
            Ok(listing.failed_prefixes.is_empty())
        }
        Command::Restore {
            backup_key,
            collection,
        } => {
            let api = QdrantClient::new(app_config.qdrant()?)?;
            restore::run_restore(
                storage.as_ref(),
                &api,
                &backup_key,
                &collection,
                &app_config.scratch_dir,
                &reporter,
            )
            .await
            .with_context(|| {
                format!("Restore of collection {collection} from {backup_key} failed")
            })?;
            Ok(true)
        }
        Command::Delete { backup_key } => {
            let outcome = catalog::delete_backup(storage.as_ref(), &backup_key, &reporter).await;
            if let Some(error) = &outcome.error {
                eprintln!("❌ Backup {} was not deleted: {}", outcome.key, error);
            }
            Ok(outcome.succeeded())
        }
    }
}
