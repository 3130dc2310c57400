use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct PrometheusResponse {
    pub data: PrometheusData,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "camelCase")]
pub enum PrometheusData {
    Matrix(Vec<RangeVector>),
}

/// A single series returned by a range query.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct RangeVector {
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<Sample>,
}

impl RangeVector {
    pub fn instance(&self) -> Option<&str> {
        self.metric.get("instance").map(String::as_str)
    }

    /// Formats the labels of the series the way Prometheus displays them,
    /// e.g. `up{job="api"}`.
    pub fn selector(&self) -> String {
        let name = self.metric.get("__name__").map(String::as_str).unwrap_or("");
        let labels: Vec<_> = self
            .metric
            .iter()
            .filter(|(key, _)| key.as_str() != "__name__")
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect();

        format!("{name}{{{}}}", labels.join(","))
    }
}

/// A sample as returned by Prometheus: the timestamp in (fractional) epoch
/// seconds and the value in its textual representation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sample(pub f64, pub String);
