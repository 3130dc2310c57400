use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize, Error)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum PrometheusServiceError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("HTTP request error: {0}")]
    Http(String),

    #[error("Prometheus responded with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}
