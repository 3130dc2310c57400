use super::alertmanager::handlers::{receive_alert_chart, receive_alert_query};
use super::charts::handlers::charts_get;
use super::metrics::metrics_get;
use crate::service::Service;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Alertmanager batches can get large when many instances fire at once.
const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

pub fn create_router(service: Service) -> Router<()> {
    Router::new()
        .route("/", get(|| async { "Alert snapshots" }))
        .route("/healthz", get(|| async { "healthy" }))
        .route("/metrics", get(metrics_get))
        .route("/alert", post(receive_alert_query))
        .route("/alert_svg", post(receive_alert_chart))
        .route("/api/chart/:name", get(charts_get))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::create_router;
    use crate::testutil::*;
    use axum::body::Body;
    use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn status_codes() {
        run_test(
            service_setup,
            service_cleanup,
            |ServiceContext {
                 service,
                 storage_dir,
                 ..
             }| async move {
                std::fs::write(storage_dir.join("fp-firing.png"), b"\x89PNG").unwrap();

                let cases = [
                    (get("/healthz"), StatusCode::OK),
                    (post_json("/alert_svg", r#"{"alerts": []}"#), StatusCode::BAD_REQUEST),
                    (post_json("/alert", r#"{"alerts": []}"#), StatusCode::BAD_REQUEST),
                    (
                        post_json("/alert", r#"{"alerts": "none"}"#),
                        StatusCode::UNPROCESSABLE_ENTITY,
                    ),
                    (
                        post_json("/alert_svg", r#"{"alerts": "none"}"#),
                        StatusCode::UNPROCESSABLE_ENTITY,
                    ),
                    (get("/api/chart/fp-firing.png"), StatusCode::OK),
                    (get("/api/chart/fp-resolved.png"), StatusCode::NOT_FOUND),
                    (get("/api/chart/.hidden"), StatusCode::BAD_REQUEST),
                ];

                for (request, expected) in cases {
                    let uri = request.uri().clone();
                    let response = create_router(service.clone())
                        .oneshot(request)
                        .await
                        .unwrap();

                    assert_eq!(response.status(), expected, "unexpected status for {uri}");
                }
            },
        )
        .await;
    }

    #[tokio::test]
    async fn reject_oversized_payload() {
        run_test(
            service_setup,
            service_cleanup,
            |ServiceContext { service, .. }| async move {
                let body = format!(
                    r#"{{"alerts": [], "receiver": "{}"}}"#,
                    "x".repeat(super::MAX_PAYLOAD_SIZE)
                );
                let request = Request::builder()
                    .method(Method::POST)
                    .uri("/alert_svg")
                    .header(CONTENT_TYPE, "application/json")
                    .header(CONTENT_LENGTH, body.len())
                    .body(Body::from(body))
                    .unwrap();

                let response = create_router(service).oneshot(request).await.unwrap();

                assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
            },
        )
        .await;
    }
}
