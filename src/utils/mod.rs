pub mod format;
pub mod output;
pub mod staging;
