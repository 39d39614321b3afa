use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::descriptor::env::EnvSource;

/// Image used by init containers which block until an init task Job has completed.
pub const DEFAULT_WAIT_FOR_IMAGE: &str = "groundnuty/k8s-wait-for:no-root-v1.7";

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    Job,
    CronJob,
    /// OpenShift `apps.openshift.io/v1` DeploymentConfig.
    DeploymentConfig,
    /// Knative `serving.knative.dev/v1` Service.
    KnativeService,
}

impl WorkloadKind {
    /// Whether the workload keeps running and can therefore be scaled and exposed.
    pub fn is_long_running(&self) -> bool {
        !matches!(self, Self::Job | Self::CronJob)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum RestartPolicy {
    OnFailure,
    Never,
}

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum ConcurrencyPolicy {
    Allow,
    Forbid,
    Replace,
}

/// Settings for the `Job` and `CronJob` workload kinds.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// Required for CronJobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_policy: Option<ConcurrencyPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum InitTaskMode {
    /// Run the task as a separate Job and make the application wait for it.
    #[default]
    Job,
    /// Run the task as an init container of the application pod.
    InitContainer,
}

/// A task which has to finish before the application starts, e.g. a database migration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitTaskSpec {
    pub name: String,

    #[serde(default)]
    pub mode: InitTaskMode,

    /// Image running the task, defaults to the application image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Image of the init container waiting for the task Job.
    #[serde(default = "default_wait_for_image")]
    pub wait_for_image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvSource>,
}

fn default_wait_for_image() -> String {
    DEFAULT_WAIT_FOR_IMAGE.to_owned()
}

impl InitTaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: InitTaskMode::default(),
            image: None,
            wait_for_image: default_wait_for_image(),
            command: Vec::new(),
            arguments: Vec::new(),
            env: Vec::new(),
        }
    }

    /// The name of the container the task adds to the application pods.
    pub fn container_name(&self) -> String {
        match self.mode {
            InitTaskMode::Job => format!("wait-for-{}", self.name),
            InitTaskMode::InitContainer => self.name.clone(),
        }
    }

    pub fn with_mode(mut self, mode: InitTaskMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_command(mut self, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Variables of the task replace application variables with the same name.
    pub fn with_env(mut self, source: EnvSource) -> Self {
        self.env.push(source);
        self
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingSpec {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,

    pub max_replicas: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cpu_utilization: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_memory_utilization: Option<u32>,
}

/// CPU and memory requests and limits, as Kubernetes quantities.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

impl ResourcesSpec {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
