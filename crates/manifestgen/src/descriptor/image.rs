use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The tag used when neither an explicit tag nor an application version is known.
pub const LATEST_TAG: &str = "latest";

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum PullPolicy {
    Always,
    IfNotPresent,
    Never,
}

/// Credentials for the generated `<application>-pull-secret`.
#[derive(Clone, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Defaults to the application name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Defaults to the application version, then to [`LATEST_TAG`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Defaults depend on the deployment target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<PullPolicy>,

    /// Existing secrets referenced from the pod.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pull_secrets: Vec<String>,

    /// Generate a docker config secret for [`ImageSpec::registry`] with these credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_credentials: Option<RegistryCredentials>,
}

/// A fully resolved container image reference, `[registry/][group/]name:tag`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub group: Option<String>,
    pub name: String,
    pub tag: String,
}

impl Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in [&self.registry, &self.group].into_iter().flatten() {
            write!(f, "{part}/")?;
        }
        write!(f, "{name}:{tag}", name = self.name, tag = self.tag)
    }
}

impl ImageSpec {
    pub fn resolve(&self, application_name: &str, version: Option<&str>) -> ImageReference {
        ImageReference {
            registry: self.registry.clone(),
            group: self.group.clone(),
            name: self
                .name
                .clone()
                .unwrap_or_else(|| application_name.to_owned()),
            tag: self
                .tag
                .as_deref()
                .or(version)
                .unwrap_or(LATEST_TAG)
                .to_owned(),
        }
    }
}
