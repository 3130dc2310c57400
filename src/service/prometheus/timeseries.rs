use super::{types::*, PrometheusServiceConfig, PrometheusServiceError};
use crate::service::query::QueryWindow;
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Header used by Mimir and Cortex to select the tenant to query.
pub(crate) const ORG_ID_HEADER: &str = "X-Scope-OrgID";

pub(crate) struct TimeseriesQuery<'a> {
    pub query: &'a str,
    pub window: QueryWindow,
    pub org_id: Option<&'a str>,
}

/// Runs a range query and returns the series it yields, or `None` if no
/// series matched.
pub(crate) async fn query_series(
    query: TimeseriesQuery<'_>,
    client: &Client,
    config: &PrometheusServiceConfig,
) -> Result<Option<Vec<RangeVector>>, PrometheusServiceError> {
    let query_string = {
        let mut form_data = form_urlencoded::Serializer::new(String::new());
        form_data.append_pair("query", query.query);
        form_data.append_pair("start", &query.window.start.to_string());
        form_data.append_pair("end", &query.window.end.to_string());
        form_data.append_pair("step", &config.query_step.to_string());
        form_data.finish()
    };

    let mut url = config.prometheus_url.clone();
    url.path_segments_mut()
        .map_err(|_| {
            PrometheusServiceError::Config(format!(
                "Cannot append to prometheus base URL: {}",
                config.prometheus_url
            ))
        })?
        .pop_if_empty()
        .extend(&["api", "v1", "query_range"]);

    url.set_query(Some(&query_string));

    debug!(url = %url, org_id = ?query.org_id, "Querying prometheus query_range api");

    let mut request = client.get(url);
    if let Some(org_id) = query.org_id {
        request = request.header(ORG_ID_HEADER, org_id);
    }

    let response = request
        .send()
        .await
        .map_err(|err| PrometheusServiceError::Http(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PrometheusServiceError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    let response: PrometheusResponse = response.json().await.map_err(|err| {
        PrometheusServiceError::Deserialization(format!(
            "Could not deserialize Prometheus response: {err}"
        ))
    })?;

    let PrometheusData::Matrix(matrix) = response.data;

    debug!(series = matrix.len(), "Received range vectors");

    if matrix.is_empty() {
        Ok(None)
    } else {
        Ok(Some(matrix))
    }
}

/// Resolution of a range query, e.g. `15s` or `1m`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StepSize {
    amount: u32,
    unit: StepUnit,
}

impl StepSize {
    pub const fn seconds(amount: u32) -> Self {
        Self {
            amount,
            unit: StepUnit::Seconds,
        }
    }
}

impl fmt::Display for StepSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.to_str())
    }
}

impl FromStr for StepSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (amount, unit) = s.split_at(split);

        let amount: u32 = amount
            .parse()
            .map_err(|_| format!("step must start with a number: {s:?}"))?;
        if amount == 0 {
            return Err("step must be positive".to_owned());
        }

        let unit = match unit {
            "" | "s" => StepUnit::Seconds,
            "m" => StepUnit::Minutes,
            "h" => StepUnit::Hours,
            other => return Err(format!("unknown step unit: {other:?}")),
        };

        Ok(Self { amount, unit })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StepUnit {
    Hours,
    Minutes,
    Seconds,
}

impl StepUnit {
    fn to_str(self) -> &'static str {
        match self {
            Self::Hours => "h",
            Self::Minutes => "m",
            Self::Seconds => "s",
        }
    }
}
