use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The OpenShift predecessor of Deployments.
#[derive(Clone, CustomResource, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "apps.openshift.io",
    version = "v1",
    kind = "DeploymentConfig",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    pub replicas: i32,

    /// Unlike Deployments, DeploymentConfigs select pods with plain labels.
    pub selector: BTreeMap<String, String>,

    pub template: PodTemplateSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<DeploymentTrigger>,
}

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTrigger {
    #[serde(rename = "type")]
    pub type_: String,
}

impl DeploymentTrigger {
    /// Rolls out a new deployment whenever the pod template changes.
    pub fn config_change() -> Self {
        Self {
            type_: "ConfigChange".to_owned(),
        }
    }
}
