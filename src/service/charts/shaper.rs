use crate::service::prometheus::RangeVector;
use percent_encoding::percent_decode_str;
use serde::Serialize;

/// Series ready to be drawn, one line each.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartInput {
    pub title: String,
    pub serials: Vec<Serial>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Serial {
    pub label: String,
    /// Sample timestamps, in epoch seconds.
    pub x: Vec<f64>,
    /// Sample values, as returned by Prometheus.
    pub y: Vec<String>,
}

impl ChartInput {
    /// Reshapes range vectors into parallel timestamp and value sequences.
    ///
    /// Lines are labeled by instance. Series without an instance label (as
    /// returned by aggregating queries) are labeled by their selector.
    pub fn from_series(query: &str, series: Vec<RangeVector>) -> Self {
        let title = percent_decode_str(query).decode_utf8_lossy().into_owned();

        let serials = series
            .into_iter()
            .map(|series| {
                let label = series
                    .instance()
                    .map(str::to_owned)
                    .unwrap_or_else(|| series.selector());
                let (x, y) = series
                    .values
                    .into_iter()
                    .map(|sample| (sample.0, sample.1))
                    .unzip();

                Serial { label, x, y }
            })
            .collect();

        Self { title, serials }
    }
}
