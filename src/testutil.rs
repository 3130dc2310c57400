use crate::service::{
    BusinessRoute, BusinessRoutes, BusinessType, ChartService, ChartServiceConfig,
    PrometheusService, PrometheusServiceConfig, Service, StorageService,
};
use futures::{Future, FutureExt};
use httpmock::prelude::HttpMockRequest;
use httpmock::MockServer;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use tempfile::TempDir;
use url::Url;

pub const QUANT_EXT_URL: &str = "https://prom-quant.monitor.example.com";
pub const POOL_EXT_URL: &str = "https://prom-pool.monitor.example.com";

/// Matches backend requests that carry no tenant header.
pub fn without_org_id(request: &HttpMockRequest) -> bool {
    request
        .headers
        .iter()
        .flatten()
        .all(|(name, _)| !name.eq_ignore_ascii_case("X-Scope-OrgID"))
}

#[macro_export]
macro_rules! assert_matches {
    ($expression:expr, $pattern:pat $( if $guard: expr )? $(,)?) => {
        match $expression {
            $pattern $( if $guard )? => (),
            o => ::core::panic!("match did not pass; got: {:?}", o)
        }
    }
}

pub async fn run_test<S, T, X, Y, Z>(
    setup: impl FnOnce() -> X,
    cleanup: impl FnOnce(T) -> Y,
    test: impl FnOnce(S) -> Z,
) where
    X: Future<Output = (S, T)>,
    Y: Future<Output = ()>,
    Z: Future<Output = ()>,
{
    // Setup
    let (test_ctx, teardown_ctx) = setup().await;

    // Test
    let fut = AssertUnwindSafe(test(test_ctx));
    let result = fut.catch_unwind().await;

    // Teardown
    cleanup(teardown_ctx).await;
    assert!(result.is_ok())
}

pub struct ServiceContext {
    pub service: Service,
    /// Stands in for Prometheus.
    pub prometheus: MockServer,
    pub storage_dir: PathBuf,
}

pub struct ServiceCleanup {
    storage_dir: TempDir,
}

pub async fn service_setup() -> (ServiceContext, ServiceCleanup) {
    let prometheus = MockServer::start_async().await;
    let storage_dir = tempfile::tempdir().expect("Could not create storage dir");

    let routes: BusinessRoutes = [
        (
            QUANT_EXT_URL.to_owned(),
            BusinessRoute {
                header: Some("Quant".to_owned()),
                business_type: BusinessType::Instance,
            },
        ),
        (
            POOL_EXT_URL.to_owned(),
            BusinessRoute {
                header: Some("Pool".to_owned()),
                business_type: BusinessType::Aggregate,
            },
        ),
    ]
    .into_iter()
    .collect();

    let prometheus_url = Url::parse(&prometheus.base_url()).unwrap();
    let service = Service::new(
        ChartService::new(ChartServiceConfig::new_test_config()),
        PrometheusService::new(PrometheusServiceConfig::new_test_config(prometheus_url)).unwrap(),
        routes,
        StorageService::new(storage_dir.path().to_owned(), None),
    );

    let service_context = ServiceContext {
        service,
        prometheus,
        storage_dir: storage_dir.path().to_owned(),
    };

    (service_context, ServiceCleanup { storage_dir })
}

pub async fn service_cleanup(cleanup: ServiceCleanup) {
    cleanup
        .storage_dir
        .close()
        .expect("Could not remove storage dir");
}
