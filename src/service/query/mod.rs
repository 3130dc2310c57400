mod errors;
#[cfg(test)]
mod tests;

pub use errors::QueryError;

use crate::service::alertmanager::AlertStatus;
use fiberplane::models::timestamps::{TimeRange, Timestamp};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

/// Parameter under which Prometheus stores the expression of the first graph
/// panel in its generator URLs.
const EXPR_MARKER: &str = "g0.expr=";

static OPERATOR_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[<>]\s*\d+").expect("invalid comparison pattern"));

static NUMBER_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s*[<>]").expect("invalid comparison pattern"));

/// Recovers the expression embedded in an alert's generator URL.
///
/// The expression is captured between `g0.expr=` and the next `&`, then
/// percent-decoded. Any `+` left after decoding is read as a space, the way
/// form-encoded values are.
pub fn extract_expression(generator_url: &str) -> Result<String, QueryError> {
    let encoded = generator_url
        .split_once(EXPR_MARKER)
        .and_then(|(_, rest)| rest.split_once('&'))
        .map(|(expr, _)| expr)
        .ok_or_else(|| QueryError::MissingExpression(generator_url.to_owned()))?;

    let decoded = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|err| QueryError::InvalidEncoding(err.to_string()))?;

    Ok(decoded.replace('+', " "))
}

/// Removes threshold clauses such as `> 90` or `5 <` from an expression, so
/// that querying it returns the underlying signal for every series instead
/// of only those that currently match the alerting condition.
///
/// This is a textual rewrite, not a PromQL parser: any integer compared with
/// `<` or `>` is dropped, including comparisons inside the selector itself.
/// Operator-first clauses are removed before number-first ones, so that
/// `x * 100 > 90` keeps its `* 100`.
pub fn strip_comparisons(expr: &str) -> String {
    let mut stripped = expr.to_owned();
    loop {
        let next = NUMBER_FIRST
            .replace_all(&OPERATOR_FIRST.replace_all(&stripped, ""), "")
            .into_owned();
        if next == stripped {
            return next;
        }
        stripped = next;
    }
}

/// Returns the expression to query for the alert with the given generator
/// URL: the embedded expression without its threshold.
pub fn working_query(generator_url: &str) -> Result<String, QueryError> {
    extract_expression(generator_url).map(|expr| strip_comparisons(&expr))
}

/// The time window a chart is drawn for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct QueryWindow {
    /// Inclusive start, in epoch seconds.
    pub start: i64,
    /// Exclusive end, in epoch seconds.
    pub end: i64,
}

impl QueryWindow {
    /// Window of `lookback_minutes` ending when the alert started.
    ///
    /// Resolved alerts currently get the same window as firing ones.
    pub fn resolve(status: &AlertStatus, starts_at: OffsetDateTime, lookback_minutes: u32) -> Self {
        let end = match status {
            AlertStatus::Firing | AlertStatus::Resolved => starts_at,
        };
        let start = end - Duration::minutes(i64::from(lookback_minutes));

        Self {
            start: start.unix_timestamp(),
            end: end.unix_timestamp(),
        }
    }

    pub fn time_range(&self) -> Result<TimeRange, time::error::ComponentRange> {
        Ok(TimeRange {
            from: Timestamp::from(OffsetDateTime::from_unix_timestamp(self.start)?),
            to: Timestamp::from(OffsetDateTime::from_unix_timestamp(self.end)?),
        })
    }
}
