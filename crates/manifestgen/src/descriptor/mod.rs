//! The in-memory description of what should be deployed.
//!
//! An [`ApplicationDescriptor`] is created once, through [`ApplicationDescriptorBuilder`], and
//! is immutable afterwards. Construction validates every identifier which ends up in a
//! generated object, so synthesis never has to deal with malformed names.
use std::collections::{BTreeMap, BTreeSet};

use snafu::{ResultExt, Snafu, ensure};

use crate::validation;

pub mod env;
pub mod exposure;
pub mod image;
pub mod integration;
pub mod pod;
pub mod port;
pub mod probe;
pub mod rbac;
pub mod volume;
pub mod workload;

pub use self::{
    env::EnvSource,
    exposure::{IngressRule, IngressSpec, IngressTls, PathType, RouteSpec, ServiceType, TlsTermination},
    image::{ImageReference, ImageSpec, PullPolicy, RegistryCredentials},
    integration::{
        AppConfig, BuildInfo, ConfigMapSpec, MetricsSpec, SecretSpec, ServiceBindingSpec,
    },
    pod::{ContainerSpec, HostAliasSpec, PodSecurityContextSpec},
    port::{PortSpec, Protocol},
    probe::{ProbeAction, ProbeSpec, Probes, Scheme},
    rbac::{
        ClusterRoleBindingSpec, PolicyRuleSpec, RbacRequest, RoleBindingSpec, RoleSpec,
        ServiceAccountSpec, SubjectKind, SubjectSpec,
    },
    volume::{VolumeMountSpec, VolumeSource, VolumeSpec},
    workload::{
        AutoscalingSpec, ConcurrencyPolicy, InitTaskMode, InitTaskSpec, JobSpec, ResourcesSpec,
        RestartPolicy, WorkloadKind,
    },
};

const NODE_PORT_RANGE: std::ops::RangeInclusive<u16> = 30000..=32767;

#[derive(Debug, Snafu)]
pub enum DescriptorError {
    #[snafu(display("invalid {field} {value:?}"))]
    InvalidName {
        source: validation::Errors,
        field: &'static str,
        value: String,
    },

    #[snafu(display("invalid application version {version:?}, it must be usable as label value"))]
    InvalidVersion {
        source: validation::Errors,
        version: String,
    },

    #[snafu(display("invalid label {key:?}={value:?}"))]
    InvalidLabel {
        source: validation::Errors,
        key: String,
        value: String,
    },

    #[snafu(display("invalid annotation key {key:?}"))]
    InvalidAnnotationKey {
        source: validation::Errors,
        key: String,
    },

    #[snafu(display("port {name:?} must have a non-zero container port"))]
    ZeroContainerPort { name: String },

    #[snafu(display("All Kubernetes ports must have unique names - {name} has been used multiple times"))]
    DuplicatePortName { name: String },

    #[snafu(display("container port {port}/{protocol} is declared by both {first:?} and {second:?}"))]
    DuplicatePortNumber {
        port: u16,
        protocol: Protocol,
        first: String,
        second: String,
    },

    #[snafu(display("node port {node_port} of port {name:?} is outside of the range 30000-32767"))]
    NodePortOutOfRange { name: String, node_port: u16 },

    #[snafu(display("node port {node_port} is used by both {first:?} and {second:?}"))]
    DuplicateNodePort {
        node_port: u16,
        first: String,
        second: String,
    },

    #[snafu(display("container name {name:?} is used more than once in the pod"))]
    DuplicateContainerName { name: String },

    #[snafu(display("invalid IP address {ip:?} in host alias"))]
    InvalidHostAliasIp {
        source: std::net::AddrParseError,
        ip: String,
    },

    #[snafu(display("volume {name:?} is declared more than once"))]
    DuplicateVolume { name: String },

    #[snafu(display("No role has been set in the RoleBinding resource!"))]
    MissingBindingRole,

    #[snafu(display("No subjects have been set in the ClusterRoleBinding resource!"))]
    MissingBindingSubjects,

    #[snafu(display("service account {name:?} is marked as default, but {previous:?} already is"))]
    MultipleDefaultServiceAccounts { name: String, previous: String },

    #[snafu(display(
        "autoscaling requires 1 <= minReplicas <= maxReplicas, got {min_replicas} and {max_replicas}"
    ))]
    InvalidAutoscalingBounds { min_replicas: u32, max_replicas: u32 },

    #[snafu(display(
        "the label selector would be empty, enable the name or version label in selectors"
    ))]
    EmptyLabelSelector,
}

type Result<T, E = DescriptorError> = std::result::Result<T, E>;

/// Validated deployment intent of a single application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    pub(crate) name: String,
    pub(crate) version: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) part_of: Option<String>,
    pub(crate) labels: BTreeMap<String, String>,
    pub(crate) annotations: BTreeMap<String, String>,
    pub(crate) replicas: u32,
    pub(crate) image: ImageSpec,
    pub(crate) ports: Vec<PortSpec>,
    pub(crate) env: Vec<EnvSource>,
    pub(crate) probes: Probes,
    pub(crate) volumes: Vec<VolumeSpec>,
    pub(crate) mounts: Vec<VolumeMountSpec>,
    pub(crate) resources: ResourcesSpec,
    pub(crate) command: Vec<String>,
    pub(crate) arguments: Vec<String>,
    pub(crate) working_dir: Option<String>,
    pub(crate) rbac: RbacRequest,
    pub(crate) service_type: Option<ServiceType>,
    pub(crate) ingress: IngressSpec,
    pub(crate) route: RouteSpec,
    pub(crate) init_tasks: Vec<InitTaskSpec>,
    pub(crate) sidecars: Vec<ContainerSpec>,
    pub(crate) init_containers: Vec<ContainerSpec>,
    pub(crate) host_aliases: Vec<HostAliasSpec>,
    pub(crate) security_context: Option<PodSecurityContextSpec>,
    pub(crate) workload: Option<WorkloadKind>,
    pub(crate) job: JobSpec,
    pub(crate) autoscaling: Option<AutoscalingSpec>,
    pub(crate) metrics: MetricsSpec,
    pub(crate) service_bindings: Vec<ServiceBindingSpec>,
    pub(crate) config_maps: Vec<ConfigMapSpec>,
    pub(crate) secrets: Vec<SecretSpec>,
    pub(crate) app_config: AppConfig,
    pub(crate) build: BuildInfo,
    pub(crate) idempotent: bool,
    pub(crate) add_version_to_label_selectors: bool,
    pub(crate) add_name_to_label_selectors: bool,
}

impl ApplicationDescriptor {
    pub fn builder(name: impl Into<String>) -> ApplicationDescriptorBuilder {
        ApplicationDescriptorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// [`None`] when the version is unset.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    pub fn image(&self) -> ImageReference {
        self.image.resolve(&self.name, self.version())
    }

    /// The declared ports, or the single default `http` port if none were declared.
    pub fn ports(&self) -> &[PortSpec] {
        &self.ports
    }

    /// Environment sources with normalized variable names, in declaration order.
    pub fn env(&self) -> &[EnvSource] {
        &self.env
    }

    pub fn volumes(&self) -> &[VolumeSpec] {
        &self.volumes
    }

    pub fn mounts(&self) -> &[VolumeMountSpec] {
        &self.mounts
    }

    pub fn rbac(&self) -> &RbacRequest {
        &self.rbac
    }

    pub fn init_tasks(&self) -> &[InitTaskSpec] {
        &self.init_tasks
    }

    pub fn job(&self) -> &JobSpec {
        &self.job
    }

    pub fn build_info(&self) -> &BuildInfo {
        &self.build
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Looks up a declared port by name.
    pub fn port(&self, name: &str) -> Option<&PortSpec> {
        self.ports.iter().find(|port| port.name == name)
    }
}

/// Builder for [`ApplicationDescriptor`]. Nothing is validated before [`Self::build`].
#[derive(Clone, Debug)]
pub struct ApplicationDescriptorBuilder {
    name: String,
    version: Option<String>,
    namespace: Option<String>,
    part_of: Option<String>,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    replicas: u32,
    image: ImageSpec,
    ports: Vec<PortSpec>,
    env: Vec<EnvSource>,
    probes: Probes,
    volumes: Vec<VolumeSpec>,
    mounts: Vec<VolumeMountSpec>,
    resources: ResourcesSpec,
    command: Vec<String>,
    arguments: Vec<String>,
    working_dir: Option<String>,
    rbac: RbacRequest,
    service_type: Option<ServiceType>,
    ingress: IngressSpec,
    route: RouteSpec,
    init_tasks: Vec<InitTaskSpec>,
    sidecars: Vec<ContainerSpec>,
    init_containers: Vec<ContainerSpec>,
    host_aliases: Vec<HostAliasSpec>,
    security_context: Option<PodSecurityContextSpec>,
    workload: Option<WorkloadKind>,
    job: JobSpec,
    autoscaling: Option<AutoscalingSpec>,
    metrics: MetricsSpec,
    service_bindings: Vec<ServiceBindingSpec>,
    config_maps: Vec<ConfigMapSpec>,
    secrets: Vec<SecretSpec>,
    app_config: AppConfig,
    build: BuildInfo,
    idempotent: bool,
    add_version_to_label_selectors: bool,
    add_name_to_label_selectors: bool,
}

impl ApplicationDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            namespace: None,
            part_of: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            replicas: 1,
            image: ImageSpec::default(),
            ports: Vec::new(),
            env: Vec::new(),
            probes: Probes::default(),
            volumes: Vec::new(),
            mounts: Vec::new(),
            resources: ResourcesSpec::default(),
            command: Vec::new(),
            arguments: Vec::new(),
            working_dir: None,
            rbac: RbacRequest::default(),
            service_type: None,
            ingress: IngressSpec::default(),
            route: RouteSpec::default(),
            init_tasks: Vec::new(),
            sidecars: Vec::new(),
            init_containers: Vec::new(),
            host_aliases: Vec::new(),
            security_context: None,
            workload: None,
            job: JobSpec::default(),
            autoscaling: None,
            metrics: MetricsSpec::default(),
            service_bindings: Vec::new(),
            config_maps: Vec::new(),
            secrets: Vec::new(),
            app_config: AppConfig::default(),
            build: BuildInfo::default(),
            idempotent: false,
            add_version_to_label_selectors: false,
            add_name_to_label_selectors: true,
        }
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    pub fn version_opt(&mut self, version: impl Into<Option<String>>) -> &mut Self {
        self.version = version.into();
        self
    }

    pub fn namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace_opt(&mut self, namespace: impl Into<Option<String>>) -> &mut Self {
        self.namespace = namespace.into();
        self
    }

    pub fn part_of(&mut self, part_of: impl Into<String>) -> &mut Self {
        self.part_of = Some(part_of.into());
        self
    }

    /// This adds a single label to the existing labels.
    /// It'll override a label with the same key.
    pub fn with_label(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(&mut self, labels: BTreeMap<String, String>) -> &mut Self {
        self.labels.extend(labels);
        self
    }

    /// This adds a single annotation to the existing annotations.
    /// It'll override an annotation with the same key.
    pub fn with_annotation(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_annotations(&mut self, annotations: BTreeMap<String, String>) -> &mut Self {
        self.annotations.extend(annotations);
        self
    }

    pub fn replicas(&mut self, replicas: u32) -> &mut Self {
        self.replicas = replicas;
        self
    }

    pub fn image(&mut self, image: ImageSpec) -> &mut Self {
        self.image = image;
        self
    }

    pub fn pull_policy(&mut self, pull_policy: PullPolicy) -> &mut Self {
        self.image.pull_policy = Some(pull_policy);
        self
    }

    pub fn add_port(&mut self, port: PortSpec) -> &mut Self {
        self.ports.push(port);
        self
    }

    pub fn add_env(&mut self, source: EnvSource) -> &mut Self {
        self.env.push(source);
        self
    }

    pub fn add_env_var(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.add_env(EnvSource::value(name, value))
    }

    pub fn liveness_probe(&mut self, probe: ProbeSpec) -> &mut Self {
        self.probes.liveness = Some(probe);
        self
    }

    pub fn readiness_probe(&mut self, probe: ProbeSpec) -> &mut Self {
        self.probes.readiness = Some(probe);
        self
    }

    pub fn startup_probe(&mut self, probe: ProbeSpec) -> &mut Self {
        self.probes.startup = Some(probe);
        self
    }

    pub fn probes(&mut self, probes: Probes) -> &mut Self {
        self.probes = probes;
        self
    }

    pub fn add_volume(&mut self, volume: VolumeSpec) -> &mut Self {
        self.volumes.push(volume);
        self
    }

    pub fn add_mount(&mut self, mount: VolumeMountSpec) -> &mut Self {
        self.mounts.push(mount);
        self
    }

    pub fn resources(&mut self, resources: ResourcesSpec) -> &mut Self {
        self.resources = resources;
        self
    }

    pub fn command(&mut self, command: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn arguments(
        &mut self,
        arguments: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(&mut self, working_dir: impl Into<String>) -> &mut Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn rbac(&mut self, rbac: RbacRequest) -> &mut Self {
        self.rbac = rbac;
        self
    }

    pub fn add_role(&mut self, role: RoleSpec) -> &mut Self {
        self.rbac.roles.push(role);
        self
    }

    pub fn add_cluster_role(&mut self, role: RoleSpec) -> &mut Self {
        self.rbac.cluster_roles.push(role);
        self
    }

    pub fn add_service_account(&mut self, service_account: ServiceAccountSpec) -> &mut Self {
        self.rbac.service_accounts.push(service_account);
        self
    }

    pub fn add_role_binding(&mut self, binding: RoleBindingSpec) -> &mut Self {
        self.rbac.role_bindings.push(binding);
        self
    }

    pub fn add_cluster_role_binding(&mut self, binding: ClusterRoleBindingSpec) -> &mut Self {
        self.rbac.cluster_role_bindings.push(binding);
        self
    }

    pub fn service_account(&mut self, name: impl Into<String>) -> &mut Self {
        self.rbac.service_account = Some(name.into());
        self
    }

    pub fn service_type(&mut self, service_type: ServiceType) -> &mut Self {
        self.service_type = Some(service_type);
        self
    }

    pub fn ingress(&mut self, ingress: IngressSpec) -> &mut Self {
        self.ingress = ingress;
        self
    }

    pub fn route(&mut self, route: RouteSpec) -> &mut Self {
        self.route = route;
        self
    }

    pub fn add_init_task(&mut self, task: InitTaskSpec) -> &mut Self {
        self.init_tasks.push(task);
        self
    }

    /// Adds a container which runs next to the application container.
    pub fn add_sidecar(&mut self, container: ContainerSpec) -> &mut Self {
        self.sidecars.push(container);
        self
    }

    /// Adds an init container, which runs before the init tasks.
    pub fn add_init_container(&mut self, container: ContainerSpec) -> &mut Self {
        self.init_containers.push(container);
        self
    }

    pub fn add_host_alias(&mut self, host_alias: HostAliasSpec) -> &mut Self {
        self.host_aliases.push(host_alias);
        self
    }

    pub fn security_context(&mut self, security_context: PodSecurityContextSpec) -> &mut Self {
        self.security_context = Some(security_context);
        self
    }

    pub fn workload(&mut self, workload: WorkloadKind) -> &mut Self {
        self.workload = Some(workload);
        self
    }

    pub fn job(&mut self, job: JobSpec) -> &mut Self {
        self.job = job;
        self
    }

    pub fn autoscaling(&mut self, autoscaling: AutoscalingSpec) -> &mut Self {
        self.autoscaling = Some(autoscaling);
        self
    }

    pub fn metrics(&mut self, metrics: MetricsSpec) -> &mut Self {
        self.metrics = metrics;
        self
    }

    pub fn add_service_binding(&mut self, binding: ServiceBindingSpec) -> &mut Self {
        self.service_bindings.push(binding);
        self
    }

    pub fn add_config_map(&mut self, config_map: ConfigMapSpec) -> &mut Self {
        self.config_maps.push(config_map);
        self
    }

    pub fn add_secret(&mut self, secret: SecretSpec) -> &mut Self {
        self.secrets.push(secret);
        self
    }

    pub fn app_config(&mut self, app_config: AppConfig) -> &mut Self {
        self.app_config = app_config;
        self
    }

    pub fn build_info(&mut self, build: BuildInfo) -> &mut Self {
        self.build = build;
        self
    }

    /// Idempotent builds leave out everything which changes between two builds of the same
    /// sources, like the version label, the commit id and the build timestamp.
    pub fn idempotent(&mut self, idempotent: bool) -> &mut Self {
        self.idempotent = idempotent;
        self
    }

    pub fn add_version_to_label_selectors(&mut self, enabled: bool) -> &mut Self {
        self.add_version_to_label_selectors = enabled;
        self
    }

    pub fn add_name_to_label_selectors(&mut self, enabled: bool) -> &mut Self {
        self.add_name_to_label_selectors = enabled;
        self
    }

    /// Validates the collected intent and consumes a snapshot of it into an
    /// [`ApplicationDescriptor`].
    pub fn build(&self) -> Result<ApplicationDescriptor> {
        check_name("application name", &self.name)?;
        if let Some(namespace) = &self.namespace {
            check_name("namespace", namespace)?;
        }
        if let Some(version) = &self.version {
            validation::is_label_value(version).map_err(|source| {
                DescriptorError::InvalidVersion {
                    source,
                    version: version.clone(),
                }
            })?;
        }
        if let Some(part_of) = &self.part_of {
            check_label("app.kubernetes.io/part-of", part_of)?;
        }
        for (key, value) in &self.labels {
            check_label(key, value)?;
        }
        for key in self.annotations.keys() {
            check_annotation_key(key)?;
        }

        let ports = if self.ports.is_empty() {
            vec![PortSpec::default_http()]
        } else {
            self.ports.clone()
        };
        check_ports(&ports)?;

        let env = normalize_env(&self.env)?;

        let mut volume_names = BTreeSet::new();
        for volume in &self.volumes {
            check_name("volume name", &volume.name)?;
            ensure!(
                volume_names.insert(volume.name.as_str()),
                DuplicateVolumeSnafu {
                    name: volume.name.clone()
                }
            );
        }

        check_rbac(&self.rbac)?;

        let init_tasks = self
            .init_tasks
            .iter()
            .map(|task| -> Result<InitTaskSpec> {
                check_name("init task name", &task.name)?;
                check_name("init task job name", &format!("{}-{}", self.name, task.name))?;
                Ok(InitTaskSpec {
                    env: normalize_env(&task.env)?,
                    ..task.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sidecars = self
            .sidecars
            .iter()
            .map(check_container)
            .collect::<Result<Vec<_>>>()?;
        let init_containers = self
            .init_containers
            .iter()
            .map(check_container)
            .collect::<Result<Vec<_>>>()?;
        check_container_names(&self.name, &sidecars, &init_containers, &init_tasks)?;

        for host_alias in &self.host_aliases {
            host_alias
                .ip
                .parse::<std::net::IpAddr>()
                .context(InvalidHostAliasIpSnafu {
                    ip: host_alias.ip.clone(),
                })?;
            for hostname in &host_alias.hostnames {
                check_with("host alias hostname", hostname, validation::is_rfc_1123_subdomain)?;
            }
        }

        for config_map in &self.config_maps {
            check_with("config map name", &config_map.name, validation::is_rfc_1123_subdomain)?;
        }
        for secret in &self.secrets {
            check_with("secret name", &secret.name, validation::is_rfc_1123_subdomain)?;
        }
        for binding in &self.service_bindings {
            check_name("service binding name", &binding.name)?;
        }

        for host in self
            .ingress
            .host
            .iter()
            .chain(self.ingress.rules.iter().filter_map(|rule| rule.host.as_ref()))
            .chain(self.route.host.iter())
        {
            check_with("host", host, validation::is_rfc_1123_subdomain)?;
        }

        if let Some(autoscaling) = &self.autoscaling {
            let min_replicas = autoscaling.min_replicas.unwrap_or(1);
            ensure!(
                min_replicas >= 1 && min_replicas <= autoscaling.max_replicas,
                InvalidAutoscalingBoundsSnafu {
                    min_replicas,
                    max_replicas: autoscaling.max_replicas,
                }
            );
        }

        // The version never ends up in selectors of idempotent builds
        let version_in_selectors = self.add_version_to_label_selectors && !self.idempotent;
        ensure!(
            self.add_name_to_label_selectors || version_in_selectors,
            EmptyLabelSelectorSnafu
        );

        Ok(ApplicationDescriptor {
            name: self.name.clone(),
            version: self.version.clone(),
            namespace: self.namespace.clone(),
            part_of: self.part_of.clone(),
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
            replicas: self.replicas,
            image: self.image.clone(),
            ports,
            env,
            probes: self.probes.clone(),
            volumes: self.volumes.clone(),
            mounts: self.mounts.clone(),
            resources: self.resources.clone(),
            command: self.command.clone(),
            arguments: self.arguments.clone(),
            working_dir: self.working_dir.clone(),
            rbac: self.rbac.clone(),
            service_type: self.service_type,
            ingress: self.ingress.clone(),
            route: self.route.clone(),
            init_tasks,
            sidecars,
            init_containers,
            host_aliases: self.host_aliases.clone(),
            security_context: self
                .security_context
                .clone()
                .filter(|security_context| !security_context.is_empty()),
            workload: self.workload,
            job: self.job.clone(),
            autoscaling: self.autoscaling.clone(),
            metrics: self.metrics.clone(),
            service_bindings: self.service_bindings.clone(),
            config_maps: self.config_maps.clone(),
            secrets: self.secrets.clone(),
            app_config: self.app_config.clone(),
            build: self.build.clone(),
            idempotent: self.idempotent,
            add_version_to_label_selectors: self.add_version_to_label_selectors,
            add_name_to_label_selectors: self.add_name_to_label_selectors,
        })
    }
}

/// Normalizes the variable names and rejects names which still aren't valid afterwards.
fn normalize_env(sources: &[EnvSource]) -> Result<Vec<EnvSource>> {
    sources
        .iter()
        .map(|source| {
            let source = source.normalized();
            if let Some(name) = source.name() {
                check_with("environment variable name", name, validation::is_env_var_name)?;
            }
            Ok(source)
        })
        .collect()
}

/// Validates an additional container and normalizes its variable names.
fn check_container(container: &ContainerSpec) -> Result<ContainerSpec> {
    check_name("container name", &container.name)?;
    check_ports(&container.ports)?;
    Ok(ContainerSpec {
        env: normalize_env(&container.env)?,
        ..container.clone()
    })
}

/// Container names have to be unique across all containers and init containers of the pod,
/// including the ones generated for init tasks.
fn check_container_names(
    application: &str,
    sidecars: &[ContainerSpec],
    init_containers: &[ContainerSpec],
    init_tasks: &[InitTaskSpec],
) -> Result<()> {
    let names = std::iter::once(application.to_owned())
        .chain(sidecars.iter().map(|container| container.name.clone()))
        .chain(init_containers.iter().map(|container| container.name.clone()))
        .chain(init_tasks.iter().map(InitTaskSpec::container_name));

    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return DuplicateContainerNameSnafu { name }.fail();
        }
    }
    Ok(())
}

fn check_with(
    field: &'static str,
    value: &str,
    check: fn(&str) -> Result<(), validation::Errors>,
) -> Result<()> {
    check(value).map_err(|source| DescriptorError::InvalidName {
        source,
        field,
        value: value.to_owned(),
    })
}

fn check_name(field: &'static str, value: &str) -> Result<()> {
    check_with(field, value, validation::is_resource_name)
}

fn check_label(key: &str, value: &str) -> Result<()> {
    validation::is_qualified_key(key)
        .and_then(|()| validation::is_label_value(value))
        .map_err(|source| DescriptorError::InvalidLabel {
            source,
            key: key.to_owned(),
            value: value.to_owned(),
        })
}

fn check_annotation_key(key: &str) -> Result<()> {
    validation::is_qualified_key(key).map_err(|source| DescriptorError::InvalidAnnotationKey {
        source,
        key: key.to_owned(),
    })
}

fn check_ports(ports: &[PortSpec]) -> Result<()> {
    let mut names = BTreeSet::new();
    let mut numbers: BTreeMap<(u16, String), &str> = BTreeMap::new();
    let mut node_ports: BTreeMap<u16, &str> = BTreeMap::new();

    for port in ports {
        check_with("port name", &port.name, validation::is_port_name)?;
        ensure!(
            port.container_port != 0,
            ZeroContainerPortSnafu {
                name: port.name.clone()
            }
        );
        ensure!(
            names.insert(port.name.as_str()),
            DuplicatePortNameSnafu {
                name: port.name.clone()
            }
        );

        if let Some(first) =
            numbers.insert((port.container_port, port.protocol.to_string()), &port.name)
        {
            return DuplicatePortNumberSnafu {
                port: port.container_port,
                protocol: port.protocol,
                first,
                second: port.name.clone(),
            }
            .fail();
        }

        if let Some(node_port) = port.node_port {
            ensure!(
                NODE_PORT_RANGE.contains(&node_port),
                NodePortOutOfRangeSnafu {
                    name: port.name.clone(),
                    node_port,
                }
            );
            if let Some(first) = node_ports.insert(node_port, &port.name) {
                return DuplicateNodePortSnafu {
                    node_port,
                    first,
                    second: port.name.clone(),
                }
                .fail();
            }
        }
    }

    Ok(())
}

fn check_rbac(rbac: &RbacRequest) -> Result<()> {
    for role in rbac.roles.iter().chain(&rbac.cluster_roles) {
        check_with("role name", &role.name, validation::is_rfc_1123_subdomain)?;
        for (key, value) in &role.labels {
            check_label(key, value)?;
        }
    }

    let mut default_account: Option<&str> = None;
    for account in &rbac.service_accounts {
        check_with(
            "service account name",
            &account.name,
            validation::is_rfc_1123_subdomain,
        )?;
        if account.use_as_default {
            if let Some(previous) = default_account {
                return MultipleDefaultServiceAccountsSnafu {
                    name: account.name.clone(),
                    previous,
                }
                .fail();
            }
            default_account = Some(&account.name);
        }
    }

    if let Some(service_account) = &rbac.service_account {
        check_with(
            "service account name",
            service_account,
            validation::is_rfc_1123_subdomain,
        )?;
    }

    for binding in &rbac.role_bindings {
        ensure!(
            binding.role_name.is_some() || rbac.default_role().is_some(),
            MissingBindingRoleSnafu
        );
        if let Some(name) = &binding.name {
            check_with("role binding name", name, validation::is_rfc_1123_subdomain)?;
        }
    }

    for binding in &rbac.cluster_role_bindings {
        ensure!(!binding.subjects.is_empty(), MissingBindingSubjectsSnafu);
        if let Some(name) = &binding.name {
            check_with(
                "cluster role binding name",
                name,
                validation::is_rfc_1123_subdomain,
            )?;
        }
    }

    Ok(())
}
