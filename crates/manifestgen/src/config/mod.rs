//! Loads an [`ApplicationDescriptor`] from a YAML descriptor file.
//!
//! A descriptor file has the fields of the descriptor in camelCase at its top level and may
//! carry one section per deployment target below `targets`. A target section is merged over the
//! top level with [`Merge`], so it only needs to name what differs:
//!
//! ```yaml
//! name: shop
//! version: 1.4.0
//! replicas: 3
//! targets:
//!   kind:
//!     replicas: 1
//! ```
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::{
    config::merge::Merge,
    descriptor::{
        AppConfig, ApplicationDescriptor, AutoscalingSpec, BuildInfo, ConfigMapSpec,
        ContainerSpec, DescriptorError, EnvSource, HostAliasSpec, ImageSpec, InitTaskSpec,
        IngressSpec, JobSpec, MetricsSpec, PodSecurityContextSpec, PortSpec, Probes, RbacRequest,
        ResourcesSpec, RouteSpec, SecretSpec, ServiceBindingSpec, ServiceType, VolumeMountSpec,
        VolumeSpec, WorkloadKind,
    },
    target::DeploymentTarget,
};

pub mod merge;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read the descriptor file {}", path.display()))]
    ReadDescriptorFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse the descriptor file {}", path.display()))]
    ParseDescriptorFile {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse the descriptor configuration"))]
    ParseDescriptor { source: serde_yaml::Error },

    #[snafu(display("the descriptor configuration doesn't name the application"))]
    MissingName,

    #[snafu(display("the descriptor configuration is invalid"))]
    InvalidDescriptor { source: DescriptorError },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// The serialized form of an [`ApplicationDescriptor`]. Every field is optional so that
/// per-target sections can be partial.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DescriptorConfig {
    pub name: Option<String>,
    pub version: Option<String>,
    pub namespace: Option<String>,
    pub part_of: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    pub replicas: Option<u32>,

    #[serde(default)]
    pub image: ImageSpec,

    pub ports: Option<Vec<PortSpec>>,
    pub env: Option<Vec<EnvSource>>,

    #[serde(default)]
    pub probes: Probes,

    pub volumes: Option<Vec<VolumeSpec>>,
    pub mounts: Option<Vec<VolumeMountSpec>>,

    #[serde(default)]
    pub resources: ResourcesSpec,

    pub command: Option<Vec<String>>,
    pub arguments: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub rbac: Option<RbacRequest>,
    pub service_type: Option<ServiceType>,
    pub ingress: Option<IngressSpec>,
    pub route: Option<RouteSpec>,
    pub init_tasks: Option<Vec<InitTaskSpec>>,
    pub sidecars: Option<Vec<ContainerSpec>>,
    pub init_containers: Option<Vec<ContainerSpec>>,
    pub host_aliases: Option<Vec<HostAliasSpec>>,
    pub security_context: Option<PodSecurityContextSpec>,
    pub workload: Option<WorkloadKind>,

    #[serde(default)]
    pub job: JobSpec,

    pub autoscaling: Option<AutoscalingSpec>,
    pub metrics: Option<MetricsSpec>,
    pub service_bindings: Option<Vec<ServiceBindingSpec>>,
    pub config_maps: Option<Vec<ConfigMapSpec>>,
    pub secrets: Option<Vec<SecretSpec>>,

    #[serde(default)]
    pub app_config: AppConfig,

    #[serde(default)]
    pub build: BuildInfo,

    pub idempotent: Option<bool>,
    pub add_version_to_label_selectors: Option<bool>,
    pub add_name_to_label_selectors: Option<bool>,

    /// Overrides for single deployment targets. Not merged recursively.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<DeploymentTarget, DescriptorConfig>,
}

impl Merge for DescriptorConfig {
    fn merge(&mut self, defaults: &Self) {
        self.name.merge(&defaults.name);
        self.version.merge(&defaults.version);
        self.namespace.merge(&defaults.namespace);
        self.part_of.merge(&defaults.part_of);
        self.labels.merge(&defaults.labels);
        self.annotations.merge(&defaults.annotations);
        self.replicas.merge(&defaults.replicas);
        self.image.merge(&defaults.image);
        self.ports.merge(&defaults.ports);
        self.env.merge(&defaults.env);
        self.probes.merge(&defaults.probes);
        self.volumes.merge(&defaults.volumes);
        self.mounts.merge(&defaults.mounts);
        self.resources.merge(&defaults.resources);
        self.command.merge(&defaults.command);
        self.arguments.merge(&defaults.arguments);
        self.working_dir.merge(&defaults.working_dir);
        self.rbac.merge(&defaults.rbac);
        self.service_type.merge(&defaults.service_type);
        self.ingress.merge(&defaults.ingress);
        self.route.merge(&defaults.route);
        self.init_tasks.merge(&defaults.init_tasks);
        self.sidecars.merge(&defaults.sidecars);
        self.init_containers.merge(&defaults.init_containers);
        self.host_aliases.merge(&defaults.host_aliases);
        self.security_context.merge(&defaults.security_context);
        self.workload.merge(&defaults.workload);
        self.job.merge(&defaults.job);
        self.autoscaling.merge(&defaults.autoscaling);
        self.metrics.merge(&defaults.metrics);
        self.service_bindings.merge(&defaults.service_bindings);
        self.config_maps.merge(&defaults.config_maps);
        self.secrets.merge(&defaults.secrets);
        self.app_config.merge(&defaults.app_config);
        self.build.merge(&defaults.build);
        self.idempotent.merge(&defaults.idempotent);
        self.add_version_to_label_selectors
            .merge(&defaults.add_version_to_label_selectors);
        self.add_name_to_label_selectors
            .merge(&defaults.add_name_to_label_selectors);
    }
}

impl DescriptorConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context(ParseDescriptorSnafu)
    }

    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).context(ReadDescriptorFileSnafu { path })?;
        serde_yaml::from_str(&contents).context(ParseDescriptorFileSnafu { path })
    }

    /// The configuration as seen by `target`: its `targets` section merged over the rest.
    pub fn for_target(&self, target: DeploymentTarget) -> Self {
        let mut base = self.clone();
        let overrides = base.targets.remove(&target);
        base.targets.clear();

        match overrides {
            Some(mut overrides) => {
                debug!(%target, "applying target overrides");
                overrides.targets.clear();
                merge::merge(overrides, &base)
            }
            None => base,
        }
    }

    /// Builds and validates the descriptor. Target sections are ignored, see
    /// [`DescriptorConfig::for_target`].
    pub fn to_descriptor(&self) -> Result<ApplicationDescriptor> {
        let name = self.name.as_deref().context(MissingNameSnafu)?;
        let mut builder = ApplicationDescriptor::builder(name);

        builder
            .version_opt(self.version.clone())
            .namespace_opt(self.namespace.clone())
            .with_labels(self.labels.clone())
            .with_annotations(self.annotations.clone())
            .image(self.image.clone())
            .probes(self.probes.clone())
            .resources(self.resources.clone())
            .job(self.job.clone())
            .app_config(self.app_config.clone())
            .build_info(self.build.clone());

        if let Some(part_of) = &self.part_of {
            builder.part_of(part_of);
        }
        if let Some(replicas) = self.replicas {
            builder.replicas(replicas);
        }
        for port in self.ports.iter().flatten() {
            builder.add_port(port.clone());
        }
        for source in self.env.iter().flatten() {
            builder.add_env(source.clone());
        }
        for volume in self.volumes.iter().flatten() {
            builder.add_volume(volume.clone());
        }
        for mount in self.mounts.iter().flatten() {
            builder.add_mount(mount.clone());
        }
        if let Some(command) = &self.command {
            builder.command(command);
        }
        if let Some(arguments) = &self.arguments {
            builder.arguments(arguments);
        }
        if let Some(working_dir) = &self.working_dir {
            builder.working_dir(working_dir);
        }
        if let Some(rbac) = &self.rbac {
            builder.rbac(rbac.clone());
        }
        if let Some(service_type) = self.service_type {
            builder.service_type(service_type);
        }
        if let Some(ingress) = &self.ingress {
            builder.ingress(ingress.clone());
        }
        if let Some(route) = &self.route {
            builder.route(route.clone());
        }
        for task in self.init_tasks.iter().flatten() {
            builder.add_init_task(task.clone());
        }
        for sidecar in self.sidecars.iter().flatten() {
            builder.add_sidecar(sidecar.clone());
        }
        for init_container in self.init_containers.iter().flatten() {
            builder.add_init_container(init_container.clone());
        }
        for host_alias in self.host_aliases.iter().flatten() {
            builder.add_host_alias(host_alias.clone());
        }
        if let Some(security_context) = &self.security_context {
            builder.security_context(security_context.clone());
        }
        if let Some(workload) = self.workload {
            builder.workload(workload);
        }
        if let Some(autoscaling) = &self.autoscaling {
            builder.autoscaling(autoscaling.clone());
        }
        if let Some(metrics) = &self.metrics {
            builder.metrics(metrics.clone());
        }
        for binding in self.service_bindings.iter().flatten() {
            builder.add_service_binding(binding.clone());
        }
        for config_map in self.config_maps.iter().flatten() {
            builder.add_config_map(config_map.clone());
        }
        for secret in self.secrets.iter().flatten() {
            builder.add_secret(secret.clone());
        }
        if let Some(idempotent) = self.idempotent {
            builder.idempotent(idempotent);
        }
        if let Some(enabled) = self.add_version_to_label_selectors {
            builder.add_version_to_label_selectors(enabled);
        }
        if let Some(enabled) = self.add_name_to_label_selectors {
            builder.add_name_to_label_selectors(enabled);
        }

        builder.build().context(InvalidDescriptorSnafu)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::descriptor::PullPolicy;

    #[fixture]
    fn config() -> DescriptorConfig {
        DescriptorConfig::from_yaml_str(indoc! {"
            name: shop
            version: 1.4.0
            replicas: 3
            labels:
              team: payments
            image:
              registry: quay.io
              group: acme
            env:
              - type: value
                name: LOG_LEVEL
                value: info
            targets:
              kind:
                replicas: 1
                labels:
                  cluster: local
                image:
                  pullPolicy: Never
              openshift:
                workload: DeploymentConfig
        "})
        .expect("valid configuration")
    }

    #[rstest]
    fn base_configuration(config: DescriptorConfig) {
        let descriptor = config.to_descriptor().expect("valid descriptor");

        assert_eq!(descriptor.name(), "shop");
        assert_eq!(descriptor.version(), Some("1.4.0"));
        assert_eq!(descriptor.replicas(), 3);
        assert_eq!(descriptor.image().to_string(), "quay.io/acme/shop:1.4.0");
        assert_eq!(descriptor.env(), [EnvSource::value("LOG_LEVEL", "info")]);
    }

    #[rstest]
    fn target_overrides_win(config: DescriptorConfig) {
        let kind = config.for_target(DeploymentTarget::Kind);

        assert!(kind.targets.is_empty());
        assert_eq!(kind.replicas, Some(1));
        assert_eq!(kind.image.pull_policy, Some(PullPolicy::Never));
        assert_eq!(kind.image.registry.as_deref(), Some("quay.io"));
        assert_eq!(
            kind.labels,
            BTreeMap::from([
                ("cluster".to_owned(), "local".to_owned()),
                ("team".to_owned(), "payments".to_owned()),
            ])
        );
        assert_eq!(kind.env, config.env);
    }

    #[rstest]
    #[case(DeploymentTarget::Openshift, Some(WorkloadKind::DeploymentConfig), Some(3))]
    #[case(DeploymentTarget::Kubernetes, None, Some(3))]
    fn targets_without_overrides_see_the_base(
        config: DescriptorConfig,
        #[case] target: DeploymentTarget,
        #[case] workload: Option<WorkloadKind>,
        #[case] replicas: Option<u32>,
    ) {
        let config = config.for_target(target);
        assert_eq!(config.workload, workload);
        assert_eq!(config.replicas, replicas);
    }

    #[test]
    fn missing_name() {
        let error = DescriptorConfig::default()
            .to_descriptor()
            .expect_err("name is missing");
        assert_eq!(
            error.to_string(),
            "the descriptor configuration doesn't name the application"
        );
    }

    #[test]
    fn descriptor_validation_applies() {
        let config = DescriptorConfig::from_yaml_str("name: Not_A_Label").expect("valid YAML");
        let error = config.to_descriptor().expect_err("name is invalid");
        assert!(matches!(error, Error::InvalidDescriptor { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = DescriptorConfig::from_yaml_str("name: shop\nreplica: 2\n")
            .expect_err("replica is a typo");
        assert!(matches!(error, Error::ParseDescriptor { .. }));
    }

    #[test]
    fn reads_files() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let path = directory.path().join("shop.yml");
        std::fs::write(&path, "name: shop\n").expect("writable");

        let config = DescriptorConfig::from_file(&path).expect("readable");
        assert_eq!(config.name.as_deref(), Some("shop"));

        let error = DescriptorConfig::from_file(&directory.path().join("missing.yml"))
            .expect_err("file is missing");
        assert!(error.to_string().starts_with("failed to read the descriptor file "));
    }

    #[test]
    fn pod_settings_are_read() {
        let config = DescriptorConfig::from_yaml_str(indoc! {"
            name: shop
            sidecars:
              - name: proxy
                image: envoyproxy/envoy:v1.31
            initContainers:
              - name: fetch-config
                image: busybox:1.36
                command: [sh, -c, cp /seed/* /config]
            hostAliases:
              - ip: 10.0.0.10
                hostnames: [db.internal]
            securityContext:
              runAsNonRoot: true
            targets:
              kind:
                securityContext:
                  runAsUser: 1000
        "})
        .expect("valid configuration");

        let descriptor = config.to_descriptor().expect("valid descriptor");
        assert_eq!(descriptor.sidecars[0].name, "proxy");
        assert_eq!(descriptor.init_containers[0].command[2], "cp /seed/* /config");
        assert_eq!(descriptor.host_aliases[0].hostnames, ["db.internal"]);

        let kind = config
            .for_target(DeploymentTarget::Kind)
            .to_descriptor()
            .expect("valid descriptor");
        assert_eq!(
            kind.security_context,
            Some(PodSecurityContextSpec {
                run_as_user: Some(1000),
                ..PodSecurityContextSpec::default()
            })
        );
    }
}
