use super::ChartHandlerError;
use crate::service::storage::StorageServiceError;
use crate::service::{Service, ALERT_SNAPSHOT_SLO};
use autometrics::autometrics;
use axum::body::StreamBody;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::instrument;

impl From<StorageServiceError> for ChartHandlerError {
    fn from(error: StorageServiceError) -> Self {
        match error {
            StorageServiceError::InvalidName(name) => Self::InvalidName(name),
            error => Self::FileError(error.to_string()),
        }
    }
}

/// Serves a chart that was previously rendered for an alert.
#[autometrics(objective = ALERT_SNAPSHOT_SLO)]
#[instrument(err, skip(service))]
pub async fn charts_get(
    State(service): State<Service>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ChartHandlerError> {
    let path = service.storage.chart_path(&name)?;

    let headers = HeaderMap::from_iter([(CONTENT_TYPE, HeaderValue::from_static("image/png"))]);

    let file: File = File::open(path).await?;
    let stream = ReaderStream::new(file);
    let body = StreamBody::new(stream);

    Ok((headers, body))
}
