use autometrics::prometheus_exporter;
use axum::response::IntoResponse;

/// Exposes the autometrics counters and histograms of the handlers and
/// services for Prometheus to scrape.
pub async fn metrics_get() -> impl IntoResponse {
    prometheus_exporter::encode_http_response()
}
