use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{
        ConfigMapEnvSource, ConfigMapKeySelector, Container, ContainerPort, EnvFromSource, EnvVar,
        EnvVarSource, ObjectFieldSelector, Probe, ResourceRequirements, SecretEnvSource,
        SecretKeySelector, VolumeMount,
    },
    apimachinery::pkg::api::resource::Quantity,
};

use crate::descriptor::{EnvSource, PortSpec, ResourcesSpec};

/// A builder to build [`Container`] objects.
///
/// Environment variables keep the order in which they were added, unless
/// [`ContainerBuilder::sort_env`] is set.
#[derive(Clone, Debug, Default)]
pub struct ContainerBuilder {
    name: String,
    image: Option<String>,
    image_pull_policy: Option<String>,
    command: Option<Vec<String>>,
    args: Option<Vec<String>>,
    working_dir: Option<String>,
    env: Vec<EnvVar>,
    env_from: Vec<EnvFromSource>,
    sort_env: bool,
    container_ports: Vec<ContainerPort>,
    volume_mounts: Vec<VolumeMount>,
    resources: Option<ResourceRequirements>,
    liveness_probe: Option<Probe>,
    readiness_probe: Option<Probe>,
    startup_probe: Option<Probe>,
}

impl ContainerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn image(&mut self, image: impl Into<String>) -> &mut Self {
        self.image = Some(image.into());
        self
    }

    pub fn image_pull_policy(&mut self, image_pull_policy: impl Into<String>) -> &mut Self {
        self.image_pull_policy = Some(image_pull_policy.into());
        self
    }

    /// An empty command keeps the image entrypoint.
    pub fn command(&mut self, command: &[String]) -> &mut Self {
        self.command = (!command.is_empty()).then(|| command.to_vec());
        self
    }

    pub fn args(&mut self, args: &[String]) -> &mut Self {
        self.args = (!args.is_empty()).then(|| args.to_vec());
        self
    }

    pub fn working_dir(&mut self, working_dir: impl Into<Option<String>>) -> &mut Self {
        self.working_dir = working_dir.into();
        self
    }

    pub fn add_env_var(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.add_env_source(&EnvSource::value(name, value))
    }

    /// Adds the variable, or the bulk import, described by `source`.
    pub fn add_env_source(&mut self, source: &EnvSource) -> &mut Self {
        let value_from = |source: EnvVarSource| Some(source);

        match source {
            EnvSource::Value { name, value } => self.env.push(EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..EnvVar::default()
            }),
            EnvSource::Field { name, field_path } => self.env.push(EnvVar {
                name: name.clone(),
                value_from: value_from(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: field_path.clone(),
                        ..ObjectFieldSelector::default()
                    }),
                    ..EnvVarSource::default()
                }),
                ..EnvVar::default()
            }),
            EnvSource::ConfigMapKey {
                name,
                config_map,
                key,
            } => self.env.push(EnvVar {
                name: name.clone(),
                value_from: value_from(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: config_map.clone(),
                        key: key.clone(),
                        ..ConfigMapKeySelector::default()
                    }),
                    ..EnvVarSource::default()
                }),
                ..EnvVar::default()
            }),
            EnvSource::SecretKey { name, secret, key } => self.env.push(EnvVar {
                name: name.clone(),
                value_from: value_from(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: secret.clone(),
                        key: key.clone(),
                        ..SecretKeySelector::default()
                    }),
                    ..EnvVarSource::default()
                }),
                ..EnvVar::default()
            }),
            EnvSource::FromConfigMap { config_map, prefix } => {
                self.env_from.push(EnvFromSource {
                    config_map_ref: Some(ConfigMapEnvSource {
                        name: config_map.clone(),
                        ..ConfigMapEnvSource::default()
                    }),
                    prefix: prefix.clone(),
                    ..EnvFromSource::default()
                });
            }
            EnvSource::FromSecret { secret, prefix } => {
                self.env_from.push(EnvFromSource {
                    secret_ref: Some(SecretEnvSource {
                        name: secret.clone(),
                        ..SecretEnvSource::default()
                    }),
                    prefix: prefix.clone(),
                    ..EnvFromSource::default()
                });
            }
        }
        self
    }

    pub fn add_env_sources<'a>(
        &mut self,
        sources: impl IntoIterator<Item = &'a EnvSource>,
    ) -> &mut Self {
        for source in sources {
            self.add_env_source(source);
        }
        self
    }

    /// Sort variables by name instead of keeping the insertion order.
    pub fn sort_env(&mut self, sort_env: bool) -> &mut Self {
        self.sort_env = sort_env;
        self
    }

    pub fn add_container_port(&mut self, port: &PortSpec) -> &mut Self {
        self.container_ports.push(ContainerPort {
            name: Some(port.name.clone()),
            container_port: port.container_port.into(),
            protocol: Some(port.protocol.to_string()),
            ..ContainerPort::default()
        });
        self
    }

    pub fn add_container_ports<'a>(
        &mut self,
        ports: impl IntoIterator<Item = &'a PortSpec>,
    ) -> &mut Self {
        for port in ports {
            self.add_container_port(port);
        }
        self
    }

    pub fn add_volume_mount(&mut self, volume_mount: VolumeMount) -> &mut Self {
        self.volume_mounts.push(volume_mount);
        self
    }

    pub fn add_volume_mounts(
        &mut self,
        volume_mounts: impl IntoIterator<Item = VolumeMount>,
    ) -> &mut Self {
        self.volume_mounts.extend(volume_mounts);
        self
    }

    /// Nothing is set if neither requests nor limits are configured.
    pub fn resources(&mut self, resources: &ResourcesSpec) -> &mut Self {
        let quantities = |cpu: &Option<String>, memory: &Option<String>| {
            let map = [("cpu", cpu), ("memory", memory)]
                .into_iter()
                .filter_map(|(resource, quantity)| {
                    quantity
                        .clone()
                        .map(|quantity| (resource.to_owned(), Quantity(quantity)))
                })
                .collect::<BTreeMap<_, _>>();
            (!map.is_empty()).then_some(map)
        };

        self.resources = (!resources.is_empty()).then(|| ResourceRequirements {
            requests: quantities(&resources.cpu_request, &resources.memory_request),
            limits: quantities(&resources.cpu_limit, &resources.memory_limit),
            ..ResourceRequirements::default()
        });
        self
    }

    pub fn liveness_probe(&mut self, probe: Probe) -> &mut Self {
        self.liveness_probe = Some(probe);
        self
    }

    pub fn readiness_probe(&mut self, probe: Probe) -> &mut Self {
        self.readiness_probe = Some(probe);
        self
    }

    pub fn startup_probe(&mut self, probe: Probe) -> &mut Self {
        self.startup_probe = Some(probe);
        self
    }

    pub fn build(&self) -> Container {
        let mut env = self.env.clone();
        if self.sort_env {
            env.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Container {
            name: self.name.clone(),
            image: self.image.clone(),
            image_pull_policy: self.image_pull_policy.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
            env: (!env.is_empty()).then_some(env),
            env_from: (!self.env_from.is_empty()).then(|| self.env_from.clone()),
            ports: (!self.container_ports.is_empty()).then(|| self.container_ports.clone()),
            volume_mounts: (!self.volume_mounts.is_empty()).then(|| self.volume_mounts.clone()),
            resources: self.resources.clone(),
            liveness_probe: self.liveness_probe.clone(),
            readiness_probe: self.readiness_probe.clone(),
            startup_probe: self.startup_probe.clone(),
            ..Container::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_container_with_env_sources() {
        let container = ContainerBuilder::new("demo")
            .image("demo:latest")
            .image_pull_policy("Always")
            .add_env_var("B_VALUE", "b")
            .add_env_source(&EnvSource::secret_key("A_SECRET", "creds", "password"))
            .add_env_source(&EnvSource::from_config_map("settings", None))
            .build();

        let env = container.env.expect("env is set");
        assert_eq!(env[0].name, "B_VALUE");
        assert_eq!(
            env[1]
                .value_from
                .as_ref()
                .and_then(|source| source.secret_key_ref.as_ref())
                .map(|selector| selector.name.as_str()),
            Some("creds")
        );

        let env_from = container.env_from.expect("env from is set");
        assert_eq!(
            env_from[0].config_map_ref.as_ref().map(|source| source.name.as_str()),
            Some("settings")
        );
    }

    #[test]
    fn sorted_env() {
        let container = ContainerBuilder::new("demo")
            .add_env_var("ZED", "1")
            .add_env_var("ALPHA", "2")
            .sort_env(true)
            .build();

        let names = container
            .env
            .expect("env is set")
            .into_iter()
            .map(|var| var.name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["ALPHA", "ZED"]);
    }

    #[test]
    fn container_ports_carry_protocol() {
        let container = ContainerBuilder::new("demo")
            .add_container_port(&PortSpec::new("http", 8080))
            .build();

        assert_eq!(
            container.ports,
            Some(vec![ContainerPort {
                name: Some("http".to_owned()),
                container_port: 8080,
                protocol: Some("TCP".to_owned()),
                ..ContainerPort::default()
            }])
        );
    }

    #[test]
    fn resources_only_set_when_configured() {
        let container = ContainerBuilder::new("demo")
            .resources(&ResourcesSpec::default())
            .build();
        assert_eq!(container.resources, None);

        let container = ContainerBuilder::new("demo")
            .resources(&ResourcesSpec {
                cpu_limit: Some("500m".to_owned()),
                memory_request: Some("128Mi".to_owned()),
                ..ResourcesSpec::default()
            })
            .build();
        let resources = container.resources.expect("resources are set");

        assert_eq!(
            resources.limits,
            Some(BTreeMap::from([(
                "cpu".to_owned(),
                Quantity("500m".to_owned())
            )]))
        );
        assert_eq!(
            resources.requests,
            Some(BTreeMap::from([(
                "memory".to_owned(),
                Quantity("128Mi".to_owned())
            )]))
        );
    }
}
