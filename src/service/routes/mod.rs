
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

static DEFAULT_ROUTE: BusinessRoute = BusinessRoute {
    header: None,
    business_type: BusinessType::Instance,
};

#[derive(clap::Args, Debug)]
pub struct BusinessRoutesConfig {
    /// JSON file mapping the `ext_url` label of alerts to the tenant header
    /// that is sent to the metrics backend.
    ///
    /// Values are either the header itself, or an object of the form
    /// `{ "header": "...", "type": "instance" | "aggregate" }`.
    #[clap(long, env, help_heading = "Business routes")]
    pub business_routes: Option<PathBuf>,
}

#[derive(Debug, Error, Serialize)]
#[serde(tag = "error", content = "details", rename_all = "snake_case")]
pub enum BusinessRoutesError {
    #[error("Cannot read business routes: {0}")]
    Read(String),

    #[error("Invalid business routes: {0}")]
    Parse(String),
}

/// Decides how series returned for a business are narrowed down.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    /// Only series for instances named in the alert batch are charted.
    #[default]
    Instance,

    /// All returned series are charted.
    Aggregate,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(from = "RouteEntry")]
pub struct BusinessRoute {
    /// Value for the `X-Scope-OrgID` header.
    pub header: Option<String>,
    pub business_type: BusinessType,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteEntry {
    Header(String),
    Detailed {
        header: Option<String>,
        #[serde(default, rename = "type")]
        business_type: BusinessType,
    },
}

impl From<RouteEntry> for BusinessRoute {
    fn from(entry: RouteEntry) -> Self {
        match entry {
            RouteEntry::Header(header) => Self {
                header: Some(header),
                business_type: BusinessType::default(),
            },
            RouteEntry::Detailed {
                header,
                business_type,
            } => Self {
                header,
                business_type,
            },
        }
    }
}

/// Routes keyed by the external URL of the Prometheus that raised the alert.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct BusinessRoutes(HashMap<String, BusinessRoute>);

impl BusinessRoutes {
    pub fn load(config: &BusinessRoutesConfig) -> Result<Self, BusinessRoutesError> {
        match config.business_routes.as_deref() {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, BusinessRoutesError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| BusinessRoutesError::Read(format!("{}: {err}", path.display())))?;

        let routes = Self::from_json(&contents)?;
        info!(path = %path.display(), routes = routes.0.len(), "Loaded business routes");

        Ok(routes)
    }

    pub fn from_json(json: &str) -> Result<Self, BusinessRoutesError> {
        serde_json::from_str(json).map_err(|err| BusinessRoutesError::Parse(err.to_string()))
    }

    /// Returns the route for the given `ext_url` label, or a route without
    /// header that filters by instance if the URL is unknown.
    pub fn resolve(&self, ext_url: Option<&str>) -> &BusinessRoute {
        ext_url
            .and_then(|ext_url| self.0.get(ext_url))
            .unwrap_or(&DEFAULT_ROUTE)
    }
}

impl FromIterator<(String, BusinessRoute)> for BusinessRoutes {
    fn from_iter<T: IntoIterator<Item = (String, BusinessRoute)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
