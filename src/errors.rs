use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential check failed: {0}")]
    Credential(String),

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Storage read failed: {0}")]
    StorageRead(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

impl BackupError {
    /// Non-success HTTP answer from the database, with the body kept for diagnostics.
    pub fn http_status(message: impl Into<String>, status: u16, body: String) -> Self {
        BackupError::Transport {
            message: format!("{} (HTTP {}): {}", message.into(), status, body),
            status: Some(status),
            body: Some(body),
        }
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(err: reqwest::Error) -> Self {
        BackupError::Transport {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
            body: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
