// qdrant-backup/src/catalog/mod.rs
mod delete;
mod list;

pub use delete::delete_backup;
pub use list::{list_backups, render_table};
