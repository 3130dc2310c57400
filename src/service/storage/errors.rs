use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum StorageServiceError {
    #[error("Invalid chart name: {0}")]
    InvalidName(String),

    #[error("Cannot write chart: {0}")]
    Io(String),

    #[error("Cannot upload chart: {0}")]
    Upload(String),
}

impl From<std::io::Error> for StorageServiceError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}
