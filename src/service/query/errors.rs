use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum QueryError {
    #[error("Generator URL has no g0.expr parameter: {0}")]
    MissingExpression(String),

    #[error("Generator URL expression is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}
