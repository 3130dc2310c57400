mod errors;
mod timeseries;
mod types;

pub use errors::PrometheusServiceError;
pub use timeseries::StepSize;
pub use types::{RangeVector, Sample};

use crate::service::query::QueryWindow;
use autometrics::autometrics;
use reqwest::Client;
use std::time::Duration;
use timeseries::{query_series, TimeseriesQuery};
use tracing::instrument;
use url::Url;

#[derive(clap::Args, Debug)]
pub struct PrometheusServiceConfig {
    /// Base URL on which Prometheus (or Mimir) can be reached.
    #[clap(long, env, default_value = "http://localhost:9090/prometheus")]
    pub prometheus_url: Url,

    /// Resolution of the range queries used for charts, e.g. `15s` or `1m`.
    #[clap(long, env, default_value = "15s")]
    pub query_step: StepSize,

    /// How many minutes before the start of an alert are charted.
    #[clap(
        long,
        env,
        default_value = "30",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub graph_duration: u32,

    /// Timeout for queries to Prometheus, in seconds.
    #[clap(long, env, default_value = "15")]
    pub prometheus_timeout: u64,
}

#[cfg(test)]
impl PrometheusServiceConfig {
    pub fn new_test_config(prometheus_url: Url) -> Self {
        Self {
            prometheus_url,
            query_step: StepSize::seconds(15),
            graph_duration: 30,
            prometheus_timeout: 5,
        }
    }
}

pub struct PrometheusService {
    config: PrometheusServiceConfig,
    client: Client,
}

impl PrometheusService {
    pub fn new(config: PrometheusServiceConfig) -> Result<Self, PrometheusServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.prometheus_timeout))
            .build()
            .map_err(|err| {
                PrometheusServiceError::Config(format!("Error building reqwest client: {err}"))
            })?;

        Ok(Self { config, client })
    }

    /// Minutes of history to chart before an alert started.
    pub fn graph_duration(&self) -> u32 {
        self.config.graph_duration
    }

    /// Queries the range vectors for `query` over the given window.
    ///
    /// The `org_id` is sent as tenant header when present. Returns `None` if
    /// the query matched no series.
    #[autometrics]
    #[instrument(err, skip(self))]
    pub async fn query_range(
        &self,
        query: &str,
        window: QueryWindow,
        org_id: Option<&str>,
    ) -> Result<Option<Vec<RangeVector>>, PrometheusServiceError> {
        let timeseries_query = TimeseriesQuery {
            query,
            window,
            org_id,
        };

        query_series(timeseries_query, &self.client, &self.config).await
    }
}
