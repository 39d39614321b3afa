//! Descriptor parts which integrate the application with its surroundings: metrics scraping,
//! service bindings and configuration objects.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::probe::Scheme;

pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_PROMETHEUS_PREFIX: &str = "prometheus.io";

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSpec {
    /// Adds the scrape annotations to the Service and the pod template.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Name of the port serving metrics, defaults to the first application port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<Scheme>,

    /// Prefix of the scrape annotations, defaults to [`DEFAULT_PROMETHEUS_PREFIX`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_prefix: Option<String>,

    /// Generate a prometheus-operator ServiceMonitor.
    #[serde(default)]
    pub service_monitor: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<String>,
}

impl MetricsSpec {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_METRICS_PATH)
    }

    pub fn annotation_prefix(&self) -> &str {
        self.annotation_prefix
            .as_deref()
            .unwrap_or(DEFAULT_PROMETHEUS_PREFIX)
    }
}

/// A backing service the application binds to through the Service Binding Operator.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    pub name: String,
    pub api_version: String,
    pub kind: String,

    /// Name of the service object, defaults to [`ServiceBindingSpec::name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapSpec {
    pub name: String,

    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub type_: Option<String>,

    #[serde(default)]
    pub string_data: BTreeMap<String, String>,
}

/// Existing objects holding application configuration, mounted into the container and listed
/// in the `APP_CONFIG_LOCATIONS` environment variable.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Build metadata recorded as annotations on every generated object.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs_uri: Option<String>,

    /// RFC 3339 timestamp. Never read from the clock during synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_timestamp: Option<String>,
}
