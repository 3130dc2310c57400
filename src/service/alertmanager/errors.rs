use crate::service::prometheus::PrometheusServiceError;
use crate::service::query::QueryError;
use crate::service::storage::StorageServiceError;
use crate::service::ChartServiceError;
use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum AlertmanagerWebhookHandlerError {
    #[error("Backend query failed: {0}")]
    BackendQueryFailed(PrometheusServiceError),

    #[error("Chart error: {0}")]
    Chart(ChartServiceError),

    #[error("Notification contains no alerts")]
    EmptyBatch,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Malformed generator URL: {0}")]
    MalformedGeneratorUrl(QueryError),

    #[error("No data for alert")]
    NoData,

    #[error("Storage error: {0}")]
    Storage(StorageServiceError),
}

impl From<ChartServiceError> for AlertmanagerWebhookHandlerError {
    fn from(error: ChartServiceError) -> Self {
        Self::Chart(error)
    }
}

impl From<PrometheusServiceError> for AlertmanagerWebhookHandlerError {
    fn from(error: PrometheusServiceError) -> Self {
        Self::BackendQueryFailed(error)
    }
}

impl From<QueryError> for AlertmanagerWebhookHandlerError {
    fn from(error: QueryError) -> Self {
        Self::MalformedGeneratorUrl(error)
    }
}

impl From<StorageServiceError> for AlertmanagerWebhookHandlerError {
    fn from(error: StorageServiceError) -> Self {
        Self::Storage(error)
    }
}

impl IntoResponse for AlertmanagerWebhookHandlerError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            Self::BackendQueryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Chart(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmptyBatch => StatusCode::BAD_REQUEST,
            Self::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::MalformedGeneratorUrl(_) => StatusCode::BAD_REQUEST,
            Self::NoData => StatusCode::NOT_FOUND,
            Self::Storage(StorageServiceError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, Json(self)).into_response()
    }
}
