use super::AlertmanagerAlert;
use crate::service::prometheus::RangeVector;
use crate::service::routes::BusinessType;
use std::collections::BTreeSet;
use tracing::debug;

/// Instances named by the `instance` label of any alert in the batch.
pub fn alert_instances(alerts: &[AlertmanagerAlert]) -> BTreeSet<&str> {
    alerts
        .iter()
        .filter_map(|alert| alert.label("instance"))
        .collect()
}

/// Narrows the queried series down to the ones the alert batch is about.
///
/// Series keep their relative order. Aggregate businesses query series that
/// carry no instance label, so nothing is filtered for them.
pub fn retain_alert_instances(
    series: Vec<RangeVector>,
    alerts: &[AlertmanagerAlert],
    business_type: BusinessType,
) -> Vec<RangeVector> {
    match business_type {
        BusinessType::Aggregate => series,
        BusinessType::Instance => {
            let instances = alert_instances(alerts);
            let total = series.len();

            let retained: Vec<_> = series
                .into_iter()
                .filter(|series| {
                    series
                        .instance()
                        .map_or(false, |instance| instances.contains(instance))
                })
                .collect();

            debug!(?instances, total, retained = retained.len(), "Filtered series by instance");
            retained
        }
    }
}
