use indexmap::IndexMap;
use k8s_openapi::{
    api::core::v1::{
        Container, HostAlias, LocalObjectReference, PodSecurityContext, PodSpec, PodTemplateSpec,
        Volume,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use snafu::Snafu;

pub mod container;
pub mod probe;
pub mod security;
pub mod volume;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "Colliding volume name {colliding_volume_name:?} in volumes with different content"
    ))]
    VolumeNameCollision { colliding_volume_name: String },
}

/// A builder to build [`PodTemplateSpec`] and [`PodSpec`] objects.
///
/// Volumes are kept in an [`IndexMap`], so they show up in the order they were added.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodBuilder {
    metadata: Option<ObjectMeta>,
    containers: Vec<Container>,
    init_containers: Vec<Container>,

    /// The key is the volume name.
    volumes: IndexMap<String, Volume>,
    service_account_name: Option<String>,
    image_pull_secrets: Vec<String>,
    host_aliases: Vec<HostAlias>,
    security_context: Option<PodSecurityContext>,
    restart_policy: Option<String>,
}

impl PodBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&mut self, metadata: impl Into<ObjectMeta>) -> &mut Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn add_container(&mut self, container: Container) -> &mut Self {
        self.containers.push(container);
        self
    }

    pub fn add_init_container(&mut self, container: Container) -> &mut Self {
        self.init_containers.push(container);
        self
    }

    pub fn service_account_name(&mut self, value: impl Into<String>) -> &mut Self {
        self.service_account_name = Some(value.into());
        self
    }

    /// Adds a pull secret reference, unless one with the same name was already added.
    pub fn add_image_pull_secret(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.image_pull_secrets.contains(&name) {
            self.image_pull_secrets.push(name);
        }
        self
    }

    /// Adds the hostnames to the `/etc/hosts` entry of `ip`, creating the entry if needed.
    pub fn add_host_alias(
        &mut self,
        ip: impl Into<String>,
        hostnames: impl IntoIterator<Item = impl Into<String>>,
    ) -> &mut Self {
        let ip = ip.into();
        let hostnames = hostnames.into_iter().map(Into::into);
        if let Some(alias) = self.host_aliases.iter_mut().find(|alias| alias.ip == ip) {
            alias.hostnames.get_or_insert_with(Vec::new).extend(hostnames);
        } else {
            self.host_aliases.push(HostAlias {
                ip,
                hostnames: Some(hostnames.collect()),
            });
        }
        self
    }

    pub fn security_context(
        &mut self,
        security_context: impl Into<PodSecurityContext>,
    ) -> &mut Self {
        self.security_context = Some(security_context.into());
        self
    }

    pub fn restart_policy(&mut self, restart_policy: impl Into<String>) -> &mut Self {
        self.restart_policy = Some(restart_policy.into());
        self
    }

    /// Adding the same volume twice is a no-op, adding a different volume under an existing
    /// name fails.
    pub fn add_volume(&mut self, volume: Volume) -> Result<&mut Self> {
        if let Some(existing_volume) = self.volumes.get(&volume.name) {
            if existing_volume != &volume {
                let colliding_volume_name = &volume.name;
                // We don't want to include the details in the error message, but instead trace them
                tracing::error!(
                    colliding_volume_name,
                    ?existing_volume,
                    "Colliding volume name in volumes with different content"
                );

                VolumeNameCollisionSnafu {
                    colliding_volume_name,
                }
                .fail()?;
            }
        } else {
            self.volumes.insert(volume.name.clone(), volume);
        }

        Ok(self)
    }

    /// See [`Self::add_volume`] for details
    pub fn add_volumes(&mut self, volumes: impl IntoIterator<Item = Volume>) -> Result<&mut Self> {
        for volume in volumes {
            self.add_volume(volume)?;
        }

        Ok(self)
    }

    /// Returns a [`PodTemplateSpec`], usable for Deployments, StatefulSets, Jobs and the
    /// workloads of other platforms.
    pub fn build_template(&self) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: self.metadata.clone(),
            spec: Some(self.build_spec()),
        }
    }

    pub fn build_spec(&self) -> PodSpec {
        let volumes = if self.volumes.is_empty() {
            None
        } else {
            Some(self.volumes.values().cloned().collect())
        };

        let image_pull_secrets = if self.image_pull_secrets.is_empty() {
            None
        } else {
            Some(
                self.image_pull_secrets
                    .iter()
                    .map(|name| LocalObjectReference { name: name.clone() })
                    .collect(),
            )
        };

        PodSpec {
            containers: self.containers.clone(),
            init_containers: (!self.init_containers.is_empty())
                .then(|| self.init_containers.clone()),
            volumes,
            service_account_name: self.service_account_name.clone(),
            image_pull_secrets,
            host_aliases: (!self.host_aliases.is_empty()).then(|| self.host_aliases.clone()),
            security_context: self.security_context.clone(),
            restart_policy: self.restart_policy.clone(),
            ..PodSpec::default()
        }
    }
}
