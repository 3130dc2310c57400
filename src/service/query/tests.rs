use super::*;
use time::macros::datetime;

const GENERATOR_URL: &str = "http://prometheus:9090/graph?g0.expr=rate%28errors_total%5B5m%5D%29+%3E+10&g0.tab=1";

#[test]
fn extract_expression_from_generator_url() {
    let expr = extract_expression(GENERATOR_URL).unwrap();

    assert_eq!(expr, "rate(errors_total[5m]) > 10");
}

#[test]
fn extract_expression_maps_encoded_plus_to_space() {
    // `+` is replaced after percent-decoding, so an encoded plus becomes a
    // space as well.
    let url = "http://prometheus/graph?g0.expr=a%2Bb+c&g0.tab=1";

    assert_eq!(extract_expression(url).unwrap(), "a b c");
}

#[test]
fn extract_expression_without_marker() {
    let result = extract_expression("http://prometheus:9090/graph?g0.tab=1");

    assert_matches!(result, Err(QueryError::MissingExpression(_)));
}

#[test]
fn extract_expression_without_terminator() {
    let result = extract_expression("http://prometheus:9090/graph?g0.expr=up");

    assert_matches!(result, Err(QueryError::MissingExpression(_)));
}

#[test]
fn extract_expression_with_invalid_utf8() {
    let result = extract_expression("http://prometheus/graph?g0.expr=up%FF&g0.tab=1");

    assert_matches!(result, Err(QueryError::InvalidEncoding(_)));
}

#[test]
fn strip_greater_than_threshold() {
    assert_eq!(
        strip_comparisons("rate(errors_total[5m]) > 10"),
        "rate(errors_total[5m]) "
    );
}

#[test]
fn strip_less_than_threshold() {
    assert_eq!(strip_comparisons(r#"up{job="x"} < 1"#), r#"up{job="x"} "#);
}

#[test]
fn strip_number_before_operator() {
    assert_eq!(strip_comparisons("90 < cpu_usage"), " cpu_usage");
}

#[test]
fn strip_keeps_scaling_factor() {
    assert_eq!(
        strip_comparisons("sum(rate(errors[5m])) / sum(rate(requests[5m])) * 100 > 5"),
        "sum(rate(errors[5m])) / sum(rate(requests[5m])) * 100 "
    );
}

#[test]
fn strip_without_comparison() {
    let expr = r#"node_load1{instance="db-1"}"#;

    assert_eq!(strip_comparisons(expr), expr);
}

#[test]
fn strip_is_idempotent() {
    let exprs = [
        "rate(errors_total[5m]) > 10",
        "5 < x < 10",
        "a >> 3",
        "x * 100 > 90 and y < 2",
        "1<2>3",
        r#"disk_free{mount="/"} <5"#,
    ];

    for expr in exprs {
        let once = strip_comparisons(expr);
        assert_eq!(strip_comparisons(&once), once, "not idempotent for {expr:?}");
    }
}

#[test]
fn working_query_strips_extracted_expression() {
    let url = "http://prometheus/graph?g0.expr=up%7Bjob%3D%22x%22%7D+%3C+1&g0.tab=1";

    assert_eq!(working_query(url).unwrap(), r#"up{job="x"} "#);
}

#[test]
fn window_ends_when_alert_started() {
    let starts_at = datetime!(2024-01-01 12:00:00 UTC);

    let window = QueryWindow::resolve(&AlertStatus::Firing, starts_at, 30);

    assert_eq!(
        window,
        QueryWindow {
            start: datetime!(2024-01-01 11:30:00 UTC).unix_timestamp(),
            end: datetime!(2024-01-01 12:00:00 UTC).unix_timestamp(),
        }
    );
    assert_eq!(window.end, 1_704_110_400);
}

#[test]
fn window_is_the_same_for_resolved_alerts() {
    let starts_at = datetime!(2024-01-01 12:00:00 UTC) + Duration::milliseconds(250);

    let firing = QueryWindow::resolve(&AlertStatus::Firing, starts_at, 10);
    let resolved = QueryWindow::resolve(&AlertStatus::Resolved, starts_at, 10);

    assert_eq!(firing, resolved);
    assert_eq!(resolved.end - resolved.start, 600);
}

#[test]
fn window_converts_to_time_range() {
    let window = QueryWindow {
        start: 1_704_108_600,
        end: 1_704_110_400,
    };

    let time_range = window.time_range().unwrap();

    assert_eq!(time_range.from.unix_timestamp(), window.start);
    assert_eq!(time_range.to.unix_timestamp(), window.end);
}
