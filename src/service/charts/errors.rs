use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use std::num::ParseFloatError;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum ChartHandlerError {
    #[error("Cannot read file: {0}")]
    FileError(String),

    #[error("Invalid chart name: {0}")]
    InvalidName(String),

    #[error("Entity not found")]
    NotFound,
}

impl From<std::io::Error> for ChartHandlerError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::FileError(error.to_string()),
        }
    }
}

impl IntoResponse for ChartHandlerError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            Self::FileError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidName(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
        };

        (status_code, Json(self)).into_response()
    }
}

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum ChartServiceError {
    #[error("Cannot generate chart")]
    Generation,

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Cannot render chart: {0}")]
    Render(String),
}

impl From<ParseFloatError> for ChartServiceError {
    fn from(error: ParseFloatError) -> Self {
        Self::InvalidSample(format!("Could not parse number: {error}"))
    }
}
