use k8s_openapi::{
    api::core::v1::{
        ConfigMapVolumeSource, EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource,
        SecretVolumeSource, Volume, VolumeMount,
    },
    apimachinery::pkg::api::resource::Quantity,
};

use crate::descriptor::{VolumeMountSpec, VolumeSource, VolumeSpec};

/// Converts a descriptor volume into a pod [`Volume`].
pub fn build_volume(spec: &VolumeSpec) -> Volume {
    let mut volume = Volume {
        name: spec.name.clone(),
        ..Volume::default()
    };

    match &spec.source {
        VolumeSource::EmptyDir { medium, size_limit } => {
            volume.empty_dir = Some(EmptyDirVolumeSource {
                medium: medium.clone(),
                size_limit: size_limit.clone().map(Quantity),
            });
        }
        VolumeSource::ConfigMap {
            config_map,
            default_mode,
            optional,
        } => {
            volume.config_map = Some(ConfigMapVolumeSource {
                name: config_map.clone(),
                default_mode: *default_mode,
                optional: optional.then_some(true),
                ..ConfigMapVolumeSource::default()
            });
        }
        VolumeSource::Secret {
            secret,
            default_mode,
            optional,
        } => {
            volume.secret = Some(SecretVolumeSource {
                secret_name: Some(secret.clone()),
                default_mode: *default_mode,
                optional: optional.then_some(true),
                ..SecretVolumeSource::default()
            });
        }
        VolumeSource::PersistentVolumeClaim {
            claim_name,
            read_only,
        } => {
            volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name.clone(),
                read_only: read_only.then_some(true),
            });
        }
    }

    volume
}

pub fn build_volume_mount(spec: &VolumeMountSpec) -> VolumeMount {
    VolumeMount {
        name: spec.name.clone(),
        mount_path: spec.mount_path.clone(),
        sub_path: spec.sub_path.clone(),
        read_only: spec.read_only.then_some(true),
        ..VolumeMount::default()
    }
}
