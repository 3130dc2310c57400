use super::{retain_alert_instances, AlertmanagerWebhookHandlerError, AlertmanagerWebhookPayload};
use crate::service::charts::ChartInput;
use crate::service::query::{working_query, QueryWindow};
use crate::service::{Service, ALERT_SNAPSHOT_SLO};
use autometrics::autometrics;
use axum::extract::{Json, State};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

/// Webhook payload, exactly as received, with the result of its query.
#[derive(Debug, Serialize)]
pub struct AlertQueryResult {
    #[serde(flatten)]
    pub received: Map<String, Value>,
    pub graph_data: Option<ChartInput>,
}

/// Everything needed to render and store the chart of an alert batch.
#[derive(Debug)]
pub struct PreparedChart {
    pub name: String,
    pub chart: ChartInput,
    pub window: QueryWindow,
}

/// Charts the expression behind an alert batch and stores the chart.
///
/// Returns the name of the stored chart.
#[autometrics(objective = ALERT_SNAPSHOT_SLO)]
#[instrument(err, skip_all, fields(alerts = payload.alerts.len()))]
pub async fn receive_alert_chart(
    State(service): State<Service>,
    Json(payload): Json<AlertmanagerWebhookPayload>,
) -> Result<String, AlertmanagerWebhookHandlerError> {
    let PreparedChart {
        name,
        chart,
        window,
    } = prepare_chart(&service, &payload).await?;

    let image = service.charts.render(chart, window).await?;
    service.storage.store(&name, image).await?;

    Ok(name)
}

/// Queries the series of the primary alert and narrows them down to the ones
/// the batch is about.
pub async fn prepare_chart(
    service: &Service,
    payload: &AlertmanagerWebhookPayload,
) -> Result<PreparedChart, AlertmanagerWebhookHandlerError> {
    let alert = payload.primary_alert()?;
    let query = working_query(&alert.generator_url)?;
    let window = QueryWindow::resolve(
        &alert.status,
        alert.starts_at,
        service.prometheus.graph_duration(),
    );
    let route = service.routes.resolve(alert.label("ext_url"));

    debug!(
        fingerprint = %alert.fingerprint,
        query,
        ?window,
        ?route,
        "Received alertmanager webhook"
    );

    let Some(series) = service
        .prometheus
        .query_range(&query, window, route.header.as_deref())
        .await?
    else {
        warn!(query, "Query returned no series");
        return Err(AlertmanagerWebhookHandlerError::NoData);
    };

    let series = retain_alert_instances(series, &payload.alerts, route.business_type);
    if series.is_empty() {
        warn!(query, "No series left for the alerted instances");
        return Err(AlertmanagerWebhookHandlerError::NoData);
    }

    Ok(PreparedChart {
        name: alert.artifact_name(),
        chart: ChartInput::from_series(&query, series),
        window,
    })
}

/// Runs the query behind an alert batch and returns the payload with the
/// unfiltered result attached, to debug alerts that yield no chart.
#[autometrics(objective = ALERT_SNAPSHOT_SLO)]
#[instrument(err, skip_all)]
pub async fn receive_alert_query(
    State(service): State<Service>,
    Json(received): Json<Map<String, Value>>,
) -> Result<Json<AlertQueryResult>, AlertmanagerWebhookHandlerError> {
    let payload: AlertmanagerWebhookPayload =
        serde_json::from_value(Value::Object(received.clone()))
            .map_err(|err| AlertmanagerWebhookHandlerError::InvalidPayload(err.to_string()))?;

    let alert = payload.primary_alert()?;
    let query = working_query(&alert.generator_url)?;
    let window = QueryWindow::resolve(
        &alert.status,
        alert.starts_at,
        service.prometheus.graph_duration(),
    );
    let route = service.routes.resolve(alert.label("ext_url"));

    debug!(alerts = payload.alerts.len(), query, ?window, "Querying alert");

    let graph_data = service
        .prometheus
        .query_range(&query, window, route.header.as_deref())
        .await?
        .map(|series| ChartInput::from_series(&query, series));

    Ok(Json(AlertQueryResult {
        received,
        graph_data,
    }))
}
