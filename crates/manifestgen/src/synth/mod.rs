//! Turns an [`ApplicationDescriptor`] into the resources of one [`DeploymentTarget`].
//!
//! Every resource family has its own module with plain functions returning typed objects.
//! [`synthesize`] calls them in a fixed order and converts the results into
//! [`ResourceObject`]s. Nothing in here reads the clock, the environment or the filesystem.
use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::Serialize;
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, instrument, warn};

use crate::{
    builder::{meta::ObjectMetaBuilder, pod},
    descriptor::{ApplicationDescriptor, PullPolicy, WorkloadKind},
    kvp,
    resource::{self, ResourceObject},
    target::DeploymentTarget,
};

pub mod autoscaling;
pub mod binding;
pub mod config;
pub mod exposure;
pub mod init_tasks;
pub mod monitoring;
pub mod rbac;
pub mod service;
pub mod workload;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("workload {workload} is not supported by the {target} target"))]
    UnsupportedWorkload {
        workload: WorkloadKind,
        target: DeploymentTarget,
    },

    #[snafu(display("failed to build the pod template"))]
    BuildPodTemplate { source: pod::Error },

    #[snafu(display("failed to convert a synthesized object"))]
    ConvertResource { source: resource::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything the synthesis functions derive from the descriptor and the target up front.
#[derive(Debug)]
pub struct Context<'a> {
    pub descriptor: &'a ApplicationDescriptor,
    pub target: DeploymentTarget,

    /// The workload which is actually generated, after applying target defaults.
    pub workload: WorkloadKind,
    pub service_account: rbac::EffectiveServiceAccount,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl<'a> Context<'a> {
    pub fn new(descriptor: &'a ApplicationDescriptor, target: DeploymentTarget) -> Result<Self> {
        Ok(Self {
            descriptor,
            target,
            workload: resolve_workload(descriptor, target)?,
            service_account: rbac::EffectiveServiceAccount::resolve(descriptor),
            labels: kvp::recommended_labels(descriptor),
            selector: kvp::selector_labels(descriptor),
            annotations: kvp::common_annotations(descriptor),
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn namespace(&self) -> Option<String> {
        self.descriptor.namespace.clone()
    }

    /// Metadata of a namespaced object, carrying the common labels and annotations.
    pub fn metadata(&self, name: impl Into<String>) -> ObjectMeta {
        self.metadata_builder(name)
            .namespace_opt(self.namespace())
            .build()
    }

    /// Metadata of a cluster scoped object.
    pub fn cluster_metadata(&self, name: impl Into<String>) -> ObjectMeta {
        self.metadata_builder(name).build()
    }

    fn metadata_builder(&self, name: impl Into<String>) -> ObjectMetaBuilder {
        let mut builder = ObjectMetaBuilder::new();
        builder
            .name(name)
            .with_labels(self.labels.clone())
            .with_annotations(self.annotations.clone());
        builder
    }

    pub fn pull_policy(&self) -> PullPolicy {
        self.descriptor
            .image
            .pull_policy
            .unwrap_or_else(|| self.target.default_pull_policy())
    }

    pub fn is_knative(&self) -> bool {
        self.target == DeploymentTarget::Knative
    }
}

fn resolve_workload(
    descriptor: &ApplicationDescriptor,
    target: DeploymentTarget,
) -> Result<WorkloadKind> {
    let requested = descriptor
        .workload
        .unwrap_or_else(|| target.default_workload());

    if target == DeploymentTarget::Knative && requested != WorkloadKind::KnativeService {
        warn!(
            %requested,
            "The knative target always generates a Knative Service, ignoring the requested workload"
        );
        return Ok(WorkloadKind::KnativeService);
    }

    ensure!(
        target.supports_workload(requested),
        UnsupportedWorkloadSnafu {
            workload: requested,
            target,
        }
    );
    Ok(requested)
}

/// Collects converted resources in insertion order.
#[derive(Debug, Default)]
struct Resources(Vec<ResourceObject>);

impl Resources {
    fn push<K>(&mut self, resource: &K) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let resource = ResourceObject::from_resource(resource).context(ConvertResourceSnafu)?;
        debug!(resource = %resource.key(), "Synthesized resource");
        self.0.push(resource);
        Ok(())
    }

    fn extend<'a, K>(&mut self, resources: impl IntoIterator<Item = &'a K>) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Serialize + 'a,
    {
        for resource in resources {
            self.push(resource)?;
        }
        Ok(())
    }
}

/// Synthesizes all resources of `descriptor` for `target`, in a fixed insertion order.
#[instrument(skip(descriptor), fields(application = descriptor.name()))]
pub fn synthesize(
    descriptor: &ApplicationDescriptor,
    target: DeploymentTarget,
) -> Result<Vec<ResourceObject>> {
    let ctx = Context::new(descriptor, target)?;
    let mut resources = Resources::default();

    let init_task_rbac = init_tasks::job_rbac(&ctx);

    resources.extend(&rbac::service_accounts(&ctx))?;
    resources.extend(&rbac::roles(&ctx))?;
    resources.extend(init_task_rbac.as_ref().map(|(role, _)| role))?;
    resources.extend(&rbac::cluster_roles(&ctx))?;
    resources.extend(&rbac::role_bindings(&ctx))?;
    resources.extend(init_task_rbac.as_ref().map(|(_, binding)| binding))?;
    resources.extend(&rbac::cluster_role_bindings(&ctx))?;

    resources.extend(&config::config_maps(&ctx))?;
    resources.extend(&config::secrets(&ctx))?;
    resources.extend(&config::pull_secret(&ctx))?;

    resources.extend(&service::service(&ctx))?;

    match workload::workload(&ctx)? {
        workload::Workload::Deployment(deployment) => resources.push(&*deployment)?,
        workload::Workload::StatefulSet(stateful_set) => resources.push(&*stateful_set)?,
        workload::Workload::Job(job) => resources.push(&*job)?,
        workload::Workload::CronJob(cron_job) => resources.push(&*cron_job)?,
        workload::Workload::DeploymentConfig(deployment_config) => {
            resources.push(&*deployment_config)?;
        }
        workload::Workload::KnativeService(service) => resources.push(&*service)?,
    }

    resources.extend(&init_tasks::jobs(&ctx))?;

    resources.extend(&exposure::ingress(&ctx))?;
    resources.extend(&exposure::route(&ctx))?;

    resources.extend(&autoscaling::horizontal_pod_autoscaler(&ctx))?;
    resources.extend(&monitoring::service_monitor(&ctx))?;
    resources.extend(&binding::service_bindings(&ctx))?;

    Ok(resources.0)
}
