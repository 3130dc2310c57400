mod errors;
mod filter;

pub mod handlers;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::IntoStaticStr;
use time::OffsetDateTime;

pub use errors::AlertmanagerWebhookHandlerError;
pub use filter::{alert_instances, retain_alert_instances};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerAlert {
    /// Fingerprint to identify the alert.
    pub fingerprint: String,

    /// Link back to the expression that produced the alert.
    #[serde(rename = "generatorURL")]
    pub generator_url: String,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    pub status: AlertStatus,

    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
}

impl AlertmanagerAlert {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Name under which the chart for this alert is stored.
    pub fn artifact_name(&self) -> String {
        let status: &'static str = (&self.status).into();
        format!("{}-{status}.png", self.fingerprint)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerWebhookPayload {
    pub alerts: Vec<AlertmanagerAlert>,

    #[serde(default)]
    pub common_annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub common_labels: BTreeMap<String, String>,

    /// Backlink to the Alertmanager.
    #[serde(default, rename = "externalURL")]
    pub external_url: String,

    /// Key identifying the group of alerts (e.g. to deduplicate).
    #[serde(default)]
    pub group_key: String,

    #[serde(default)]
    pub group_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub receiver: String,

    #[serde(default)]
    pub status: AlertStatus,

    /// The amount of alerts that have been truncated due to the "max_alerts"
    /// setting.
    #[serde(default)]
    pub truncated_alerts: u32,

    /// Webhook protocol version.
    #[serde(default)]
    pub version: String,
}

impl AlertmanagerWebhookPayload {
    /// The alert whose generator URL, timestamps and labels drive the chart.
    pub fn primary_alert(&self) -> Result<&AlertmanagerAlert, AlertmanagerWebhookHandlerError> {
        self.alerts
            .first()
            .ok_or(AlertmanagerWebhookHandlerError::EmptyBatch)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, IntoStaticStr, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
    #[default]
    Firing,
    Resolved,
}
