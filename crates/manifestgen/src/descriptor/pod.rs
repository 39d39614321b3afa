//! Pod level settings besides the application container.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::descriptor::{EnvSource, PortSpec, PullPolicy, ResourcesSpec, VolumeMountSpec};

/// An additional container of the application pod, either a sidecar or an init container.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,

    /// Defaults to the pull policy of the application image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<PullPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvSource>,

    /// Only the name, number and protocol are used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    /// Mounts of volumes declared for the application.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<VolumeMountSpec>,

    #[serde(default, skip_serializing_if = "ResourcesSpec::is_empty")]
    pub resources: ResourcesSpec,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            image_pull_policy: None,
            command: Vec::new(),
            arguments: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            ports: Vec::new(),
            mounts: Vec::new(),
            resources: ResourcesSpec::default(),
        }
    }

    pub fn with_command(mut self, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, source: EnvSource) -> Self {
        self.env.push(source);
        self
    }

    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_mount(mut self, mount: VolumeMountSpec) -> Self {
        self.mounts.push(mount);
        self
    }
}

/// An `/etc/hosts` entry of the application pod.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostAliasSpec {
    pub ip: String,

    #[serde(default)]
    pub hostnames: Vec<String>,
}

impl HostAliasSpec {
    pub fn new(
        ip: impl Into<String>,
        hostnames: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            ip: ip.into(),
            hostnames: hostnames.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum FsGroupChangePolicy {
    OnRootMismatch,
    Always,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeLinuxOptionsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Security settings applied to every container of the application pod.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContextSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_non_root: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group_change_policy: Option<FsGroupChangePolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplemental_groups: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SeLinuxOptionsSpec>,

    /// Kernel parameters by name, e.g. `net.core.somaxconn`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sysctls: BTreeMap<String, String>,
}

impl PodSecurityContextSpec {
    /// Whether no setting is configured at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn security_context_from_yaml() {
        let context: PodSecurityContextSpec = serde_yaml::from_str(indoc! {"
            runAsUser: 1000
            runAsNonRoot: true
            fsGroupChangePolicy: OnRootMismatch
            seLinuxOptions:
              level: s0:c123,c456
        "})
        .expect("valid security context");

        assert!(!context.is_empty());
        assert_eq!(context.run_as_user, Some(1000));
        assert_eq!(
            context.fs_group_change_policy,
            Some(FsGroupChangePolicy::OnRootMismatch)
        );
        assert_eq!(
            context.se_linux_options.and_then(|options| options.level),
            Some("s0:c123,c456".to_owned())
        );
        assert!(PodSecurityContextSpec::default().is_empty());
    }

    #[test]
    fn containers_from_yaml() {
        let container: ContainerSpec = serde_yaml::from_str(indoc! {"
            name: proxy
            image: envoyproxy/envoy:v1.31
            ports:
              - name: admin
                containerPort: 9901
            env:
              - type: value
                name: log.level
                value: debug
        "})
        .expect("valid container");

        assert_eq!(container.ports, [PortSpec::new("admin", 9901)]);
        assert_eq!(container.image_pull_policy, None);
        assert!(container.resources.is_empty());
    }
}
