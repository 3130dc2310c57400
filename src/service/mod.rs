mod alertmanager;
mod charts;
mod metrics;
mod prometheus;
mod query;
mod routes;
mod storage;

pub mod router;

use autometrics::objectives::{Objective, ObjectiveLatency, ObjectivePercentile};
use std::sync::Arc;

pub use charts::{ChartService, ChartServiceConfig, ChartServiceError};
pub use prometheus::{PrometheusService, PrometheusServiceConfig, PrometheusServiceError};
pub use routes::{BusinessRoute, BusinessRoutes, BusinessRoutesConfig, BusinessType};
pub use storage::{StorageService, StorageServiceConfig};

pub const ALERT_SNAPSHOT_SLO: Objective = Objective::new("alert_snapshot")
    .success_rate(ObjectivePercentile::P99)
    .latency(ObjectiveLatency::Ms5000, ObjectivePercentile::P95);

/// Everything needed to handle a webhook call. Built once at startup and
/// never mutated afterwards.
#[derive(Clone)]
pub struct Service {
    charts: Arc<ChartService>,
    prometheus: Arc<PrometheusService>,
    routes: Arc<BusinessRoutes>,
    storage: Arc<StorageService>,
}

impl Service {
    pub fn new(
        charts: ChartService,
        prometheus: PrometheusService,
        routes: BusinessRoutes,
        storage: StorageService,
    ) -> Self {
        Self {
            charts: Arc::new(charts),
            prometheus: Arc::new(prometheus),
            routes: Arc::new(routes),
            storage: Arc::new(storage),
        }
    }

    pub async fn from_config(
        chart_config: ChartServiceConfig,
        prometheus_config: PrometheusServiceConfig,
        routes_config: BusinessRoutesConfig,
        storage_config: StorageServiceConfig,
    ) -> anyhow::Result<Self> {
        let routes = BusinessRoutes::load(&routes_config)?;
        let prometheus = PrometheusService::new(prometheus_config)?;
        let storage = StorageService::from_config(storage_config).await;

        Ok(Self::new(
            ChartService::new(chart_config),
            prometheus,
            routes,
            storage,
        ))
    }
}
