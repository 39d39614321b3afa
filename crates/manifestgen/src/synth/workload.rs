use std::collections::BTreeMap;

use indexmap::IndexSet;
use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec},
        batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec},
        core::v1::{Container, PodTemplateSpec},
    },
    apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta},
};
use snafu::ResultExt;
use tracing::warn;

use crate::{
    builder::{
        pod::{
            PodBuilder,
            container::ContainerBuilder,
            probe::ProbeBuilder,
            security::build_pod_security_context,
            volume::{build_volume, build_volume_mount},
        },
        saturating_i32,
    },
    crd::{
        deployment_config::{DeploymentConfig, DeploymentConfigSpec, DeploymentTrigger},
        knative::{
            KnativeService, KnativeServiceSpec, MAX_SCALE_ANNOTATION, MIN_SCALE_ANNOTATION,
            TARGET_UTILIZATION_ANNOTATION,
        },
    },
    descriptor::{
        ContainerSpec, EnvSource, PortSpec, RestartPolicy, VolumeMountSpec, VolumeSpec, WorkloadKind,
        port::DEFAULT_HTTP_PORT_NAME,
        volume::{
            APP_CONFIG_MAP_MOUNT_PATH, APP_CONFIG_MAP_VOLUME_NAME, APP_SECRET_MOUNT_PATH,
            APP_SECRET_VOLUME_NAME,
        },
    },
    synth::{BuildPodTemplateSnafu, Context, Result, config, init_tasks, monitoring},
};

/// Lists the mounted application configuration directories.
pub const APP_CONFIG_LOCATIONS_ENV: &str = "APP_CONFIG_LOCATIONS";

/// The workload object, one variant per [`WorkloadKind`].
#[derive(Clone, Debug)]
pub enum Workload {
    Deployment(Box<Deployment>),
    StatefulSet(Box<StatefulSet>),
    Job(Box<Job>),
    CronJob(Box<CronJob>),
    DeploymentConfig(Box<DeploymentConfig>),
    KnativeService(Box<KnativeService>),
}

pub fn workload(ctx: &Context) -> Result<Workload> {
    let template = pod_template(ctx)?;
    let descriptor = ctx.descriptor;
    let replicas = Some(saturating_i32(descriptor.replicas));
    let selector = LabelSelector {
        match_labels: Some(ctx.selector.clone()),
        ..LabelSelector::default()
    };

    let workload = match ctx.workload {
        WorkloadKind::Deployment => Workload::Deployment(Box::new(Deployment {
            metadata: ctx.metadata(ctx.name()),
            spec: Some(DeploymentSpec {
                replicas,
                selector,
                template,
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        })),
        WorkloadKind::StatefulSet => Workload::StatefulSet(Box::new(StatefulSet {
            metadata: ctx.metadata(ctx.name()),
            spec: Some(StatefulSetSpec {
                replicas,
                selector,
                service_name: Some(ctx.name().to_owned()),
                template,
                ..StatefulSetSpec::default()
            }),
            ..StatefulSet::default()
        })),
        WorkloadKind::Job => Workload::Job(Box::new(Job {
            metadata: ctx.metadata(ctx.name()),
            spec: Some(job_spec(ctx, template)),
            ..Job::default()
        })),
        WorkloadKind::CronJob => {
            let job = &descriptor.job;
            Workload::CronJob(Box::new(CronJob {
                metadata: ctx.metadata(ctx.name()),
                spec: Some(CronJobSpec {
                    // A missing schedule is reported by the validation pass
                    schedule: job.schedule.clone().unwrap_or_default(),
                    time_zone: job.time_zone.clone(),
                    concurrency_policy: job.concurrency_policy.map(|policy| policy.to_string()),
                    job_template: JobTemplateSpec {
                        metadata: None,
                        spec: Some(job_spec(ctx, template)),
                    },
                    ..CronJobSpec::default()
                }),
                ..CronJob::default()
            }))
        }
        WorkloadKind::DeploymentConfig => {
            let mut deployment_config = DeploymentConfig::new(
                ctx.name(),
                DeploymentConfigSpec {
                    replicas: saturating_i32(descriptor.replicas),
                    selector: ctx.selector.clone(),
                    template,
                    triggers: vec![DeploymentTrigger::config_change()],
                },
            );
            deployment_config.metadata = ctx.metadata(ctx.name());
            Workload::DeploymentConfig(Box::new(deployment_config))
        }
        WorkloadKind::KnativeService => {
            let mut service = KnativeService::new(ctx.name(), KnativeServiceSpec { template });
            service.metadata = ctx.metadata(ctx.name());
            Workload::KnativeService(Box::new(service))
        }
    };

    Ok(workload)
}

fn job_spec(ctx: &Context, template: PodTemplateSpec) -> JobSpec {
    let job = &ctx.descriptor.job;
    JobSpec {
        template,
        parallelism: job.parallelism.map(saturating_i32),
        completions: job.completions.map(saturating_i32),
        backoff_limit: job.backoff_limit.map(saturating_i32),
        active_deadline_seconds: job.active_deadline_seconds.map(i64::from),
        ttl_seconds_after_finished: job.ttl_seconds_after_finished.map(saturating_i32),
        ..JobSpec::default()
    }
}

/// The pod template shared by all workload kinds.
pub fn pod_template(ctx: &Context) -> Result<PodTemplateSpec> {
    let descriptor = ctx.descriptor;

    let mut pod_builder = PodBuilder::new();
    pod_builder
        .metadata(template_metadata(ctx))
        .add_container(main_container(ctx))
        .service_account_name(&ctx.service_account.name);

    for sidecar in &descriptor.sidecars {
        pod_builder.add_container(extra_container(ctx, sidecar));
    }
    for init_container in &descriptor.init_containers {
        pod_builder.add_init_container(extra_container(ctx, init_container));
    }
    for init_container in init_tasks::init_containers(ctx) {
        pod_builder.add_init_container(init_container);
    }
    pod_builder
        .add_volumes(volumes(ctx).iter().map(build_volume))
        .context(BuildPodTemplateSnafu)?;

    for pull_secret in config::image_pull_secrets(ctx) {
        pod_builder.add_image_pull_secret(pull_secret);
    }
    for host_alias in &descriptor.host_aliases {
        pod_builder.add_host_alias(&host_alias.ip, &host_alias.hostnames);
    }
    if let Some(security_context) = &descriptor.security_context {
        pod_builder.security_context(build_pod_security_context(security_context));
    }

    if !ctx.workload.is_long_running() {
        let restart_policy = descriptor
            .job
            .restart_policy
            .unwrap_or(RestartPolicy::OnFailure);
        pod_builder.restart_policy(restart_policy.to_string());
    }

    Ok(pod_builder.build_template())
}

fn template_metadata(ctx: &Context) -> ObjectMeta {
    let mut annotations = monitoring::prometheus_annotations(ctx);
    if ctx.is_knative() {
        annotations.extend(knative_autoscaling_annotations(ctx));
    }

    ObjectMeta {
        labels: Some(ctx.labels.clone()),
        annotations: (!annotations.is_empty()).then_some(annotations),
        ..ObjectMeta::default()
    }
}

/// Knative scales revisions on its own, configured through annotations of the revision
/// template.
fn knative_autoscaling_annotations(ctx: &Context) -> BTreeMap<String, String> {
    let Some(autoscaling) = ctx
        .descriptor
        .autoscaling
        .as_ref()
        .filter(|autoscaling| autoscaling.enabled)
    else {
        return BTreeMap::new();
    };

    let mut annotations = BTreeMap::from([(
        MAX_SCALE_ANNOTATION.to_owned(),
        autoscaling.max_replicas.to_string(),
    )]);
    if let Some(min_replicas) = autoscaling.min_replicas {
        annotations.insert(MIN_SCALE_ANNOTATION.to_owned(), min_replicas.to_string());
    }
    if let Some(target) = autoscaling.target_cpu_utilization {
        annotations.insert(TARGET_UTILIZATION_ANNOTATION.to_owned(), target.to_string());
    }
    annotations
}

/// The ports of the application container. Knative routes traffic to a single port.
pub fn container_ports<'a>(ctx: &Context<'a>) -> &'a [PortSpec] {
    let ports = ctx.descriptor.ports();
    if !ctx.is_knative() || ports.len() <= 1 {
        return ports;
    }

    let index = ports
        .iter()
        .position(|port| port.name == DEFAULT_HTTP_PORT_NAME)
        .unwrap_or_default();
    warn!(
        kept = %ports[index].name,
        ignored = ports.len() - 1,
        "Knative services expose a single port, ignoring the other ports"
    );
    &ports[index..=index]
}

/// Declared volumes, followed by the volumes of the application configuration.
fn volumes(ctx: &Context) -> Vec<VolumeSpec> {
    let app_config = &ctx.descriptor.app_config;
    let mut volumes = ctx.descriptor.volumes.clone();

    if let Some(config_map) = &app_config.config_map {
        volumes.push(VolumeSpec::config_map(APP_CONFIG_MAP_VOLUME_NAME, config_map));
    }
    if let Some(secret) = &app_config.secret {
        volumes.push(VolumeSpec::secret(APP_SECRET_VOLUME_NAME, secret));
    }
    volumes
}

fn mounts(ctx: &Context) -> Vec<VolumeMountSpec> {
    let app_config = &ctx.descriptor.app_config;
    let mut mounts = ctx.descriptor.mounts.clone();

    if app_config.config_map.is_some() {
        mounts.push(
            VolumeMountSpec::new(APP_CONFIG_MAP_VOLUME_NAME, APP_CONFIG_MAP_MOUNT_PATH).read_only(),
        );
    }
    if app_config.secret.is_some() {
        mounts.push(VolumeMountSpec::new(APP_SECRET_VOLUME_NAME, APP_SECRET_MOUNT_PATH).read_only());
    }
    mounts
}

/// Environment sources of the application container. Identical entries are collapsed, keeping
/// the first occurrence.
pub fn env_sources(ctx: &Context) -> Vec<EnvSource> {
    let app_config = &ctx.descriptor.app_config;
    let locations = [
        app_config.config_map.as_ref().map(|_| APP_CONFIG_MAP_MOUNT_PATH),
        app_config.secret.as_ref().map(|_| APP_SECRET_MOUNT_PATH),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    let mut sources = deduplicate_env(&ctx.descriptor.env);
    if !locations.is_empty() {
        sources.push(EnvSource::value(APP_CONFIG_LOCATIONS_ENV, locations.join(",")));
    }
    sources
}

pub(crate) fn deduplicate_env(sources: &[EnvSource]) -> Vec<EnvSource> {
    sources
        .iter()
        .cloned()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

pub fn main_container(ctx: &Context) -> Container {
    let descriptor = ctx.descriptor;
    let ports = container_ports(ctx);

    let mut container = ContainerBuilder::new(ctx.name());
    container
        .image(descriptor.image().to_string())
        .image_pull_policy(ctx.pull_policy().to_string())
        .command(&descriptor.command)
        .args(&descriptor.arguments)
        .working_dir(descriptor.working_dir.clone())
        .add_container_ports(ports)
        .add_env_sources(&env_sources(ctx))
        .sort_env(descriptor.idempotent)
        .add_volume_mounts(mounts(ctx).iter().map(build_volume_mount))
        .resources(&descriptor.resources);

    let probes = &descriptor.probes;
    if let Some(probe) = &probes.liveness {
        container.liveness_probe(ProbeBuilder::new(probe, ports).build());
    }
    if let Some(probe) = &probes.readiness {
        container.readiness_probe(ProbeBuilder::new(probe, ports).build());
    }
    match &probes.startup {
        Some(_) if ctx.is_knative() => {
            warn!("Knative services don't support startup probes, ignoring it");
        }
        Some(probe) => {
            container.startup_probe(ProbeBuilder::new(probe, ports).build());
        }
        None => {}
    }

    container.build()
}

/// A sidecar or declared init container. The pull policy defaults to the one of the application
/// image.
fn extra_container(ctx: &Context, spec: &ContainerSpec) -> Container {
    let pull_policy = spec.image_pull_policy.unwrap_or_else(|| ctx.pull_policy());

    let mut container = ContainerBuilder::new(&spec.name);
    container
        .image(&spec.image)
        .image_pull_policy(pull_policy.to_string())
        .command(&spec.command)
        .args(&spec.arguments)
        .working_dir(spec.working_dir.clone())
        .add_container_ports(&spec.ports)
        .add_env_sources(&deduplicate_env(&spec.env))
        .sort_env(ctx.descriptor.idempotent)
        .add_volume_mounts(spec.mounts.iter().map(build_volume_mount))
        .resources(&spec.resources);
    container.build()
}
