use serde::{Deserialize, Serialize};

/// Volume holding the application config map, see [`crate::descriptor::AppConfig`].
pub const APP_CONFIG_MAP_VOLUME_NAME: &str = "app-config-map";
pub const APP_CONFIG_MAP_MOUNT_PATH: &str = "/mnt/app-config-map";

/// Volume holding the application secret, see [`crate::descriptor::AppConfig`].
pub const APP_SECRET_VOLUME_NAME: &str = "app-secret";
pub const APP_SECRET_MOUNT_PATH: &str = "/mnt/app-secret";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum VolumeSource {
    EmptyDir {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        medium: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_limit: Option<String>,
    },
    ConfigMap {
        config_map: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_mode: Option<i32>,
        #[serde(default)]
        optional: bool,
    },
    Secret {
        secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_mode: Option<i32>,
        #[serde(default)]
        optional: bool,
    },
    PersistentVolumeClaim {
        claim_name: String,
        #[serde(default)]
        read_only: bool,
    },
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    pub name: String,
    pub source: VolumeSource,
}

impl VolumeSpec {
    pub fn empty_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VolumeSource::EmptyDir {
                medium: None,
                size_limit: None,
            },
        }
    }

    pub fn config_map(name: impl Into<String>, config_map: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VolumeSource::ConfigMap {
                config_map: config_map.into(),
                default_mode: None,
                optional: false,
            },
        }
    }

    pub fn secret(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VolumeSource::Secret {
                secret: secret.into(),
                default_mode: None,
                optional: false,
            },
        }
    }

    pub fn persistent_volume_claim(name: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: VolumeSource::PersistentVolumeClaim {
                claim_name: claim_name.into(),
                read_only: false,
            },
        }
    }
}

/// Mounts a volume, referenced by name, into the application container.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMountSpec {
    pub name: String,
    pub mount_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    #[serde(default)]
    pub read_only: bool,
}

impl VolumeMountSpec {
    pub fn new(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            sub_path: None,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}
