//! Rejects manifest sets which Kubernetes would accept object by object, but which can't work
//! as a whole.
//!
//! The checks run on the merged resources rather than on the descriptor, so problems introduced
//! by fragments are caught as well.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec};
use snafu::{ResultExt, Snafu, ensure};
use tracing::instrument;

use crate::resource::{ResourceKey, ResourceObject};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("conflicting environment variables: {conflicts}"))]
    ConflictingEnvSource { conflicts: EnvConflicts },

    #[snafu(display("missing {field} for {key}"))]
    MissingRequiredField { key: ResourceKey, field: &'static str },

    #[snafu(display(
        "container {container:?} of {key} mounts the volume {volume:?}, which is not declared"
    ))]
    ReferentialIntegrity {
        key: ResourceKey,
        container: String,
        volume: String,
    },

    #[snafu(display("resource #{index} has no kind"))]
    MissingKind { index: usize },

    #[snafu(display("resource #{index} ({kind}) has no name"))]
    MissingName { index: usize, kind: String },

    #[snafu(display("{key} is defined more than once"))]
    DuplicateResource { key: ResourceKey },

    #[snafu(display("the pod spec of {key} is malformed"))]
    ParsePodSpec {
        source: serde_json::Error,
        key: ResourceKey,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// A single environment variable which is defined in incompatible ways.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EnvConflict {
    /// The variable is read from a config map and from a secret.
    ConfigMapAndSecret {
        container: String,
        name: String,
        config_map: String,
        secret: String,
    },

    /// The variable is defined twice with different values.
    Redefinition {
        container: String,
        name: String,
        old: String,
        new: String,
    },
}

impl Display for EnvConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigMapAndSecret {
                container,
                name,
                config_map,
                secret,
            } => write!(
                f,
                "{name} of container {container:?} is defined from both config map {config_map:?} and secret {secret:?}"
            ),
            Self::Redefinition {
                container,
                name,
                old,
                new,
            } => write!(
                f,
                "{name} of container {container:?} is redefined from {old} to {new}"
            ),
        }
    }
}

/// All environment conflicts of a manifest set, reported together.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvConflicts(pub Vec<EnvConflict>);

impl Display for EnvConflicts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, conflict) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            conflict.fmt(f)?;
        }
        Ok(())
    }
}

/// Describes the origin of a variable value for error messages.
fn describe(var: &EnvVar) -> String {
    if let Some(value) = &var.value {
        return format!("value {value:?}");
    }
    let Some(value_from) = &var.value_from else {
        return "an empty value".to_owned();
    };

    if let Some(selector) = &value_from.config_map_key_ref {
        format!("config map {:?} key {:?}", selector.name, selector.key)
    } else if let Some(selector) = &value_from.secret_key_ref {
        format!("secret {:?} key {:?}", selector.name, selector.key)
    } else if let Some(selector) = &value_from.field_ref {
        format!("field {:?}", selector.field_path)
    } else if let Some(selector) = &value_from.resource_field_ref {
        format!("resource {:?}", selector.resource)
    } else {
        "an empty reference".to_owned()
    }
}

fn config_map_name(var: &EnvVar) -> Option<&str> {
    var.value_from
        .as_ref()?
        .config_map_key_ref
        .as_ref()
        .map(|selector| selector.name.as_str())
}

fn secret_name(var: &EnvVar) -> Option<&str> {
    var.value_from
        .as_ref()?
        .secret_key_ref
        .as_ref()
        .map(|selector| selector.name.as_str())
}

fn env_conflict(container: &str, first: &EnvVar, second: &EnvVar) -> Option<EnvConflict> {
    if first == second {
        return None;
    }

    let config_map_and_secret = config_map_name(first)
        .zip(secret_name(second))
        .or_else(|| config_map_name(second).zip(secret_name(first)));
    Some(match config_map_and_secret {
        Some((config_map, secret)) => EnvConflict::ConfigMapAndSecret {
            container: container.to_owned(),
            name: first.name.clone(),
            config_map: config_map.to_owned(),
            secret: secret.to_owned(),
        },
        None => EnvConflict::Redefinition {
            container: container.to_owned(),
            name: first.name.clone(),
            old: describe(first),
            new: describe(second),
        },
    })
}

fn container_env_conflicts(container: &Container) -> Vec<EnvConflict> {
    let mut seen = BTreeMap::<&str, &EnvVar>::new();
    let mut conflicts = Vec::new();

    for var in container.env.iter().flatten() {
        match seen.get(var.name.as_str()) {
            Some(first) => conflicts.extend(env_conflict(&container.name, first, var)),
            None => {
                seen.insert(&var.name, var);
            }
        }
    }
    conflicts
}

fn all_containers(pod_spec: &PodSpec) -> impl Iterator<Item = &Container> {
    pod_spec
        .init_containers
        .iter()
        .flatten()
        .chain(&pod_spec.containers)
}

fn check_identity(index: usize, resource: &ResourceObject) -> Result<()> {
    ensure!(!resource.kind().is_empty(), MissingKindSnafu { index });
    ensure!(
        !resource.name().is_empty(),
        MissingNameSnafu {
            index,
            kind: resource.kind()
        }
    );
    Ok(())
}

fn check_schedule(resource: &ResourceObject) -> Result<()> {
    if resource.kind() != "CronJob" {
        return Ok(());
    }

    let schedule = resource
        .data()
        .pointer("/spec/schedule")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    ensure!(
        !schedule.trim().is_empty(),
        MissingRequiredFieldSnafu {
            key: resource.key(),
            field: "schedule",
        }
    );
    Ok(())
}

fn check_mounts(resource: &ResourceObject, pod_spec: &PodSpec) -> Result<()> {
    let volumes = pod_spec
        .volumes
        .iter()
        .flatten()
        .map(|volume| volume.name.as_str())
        .collect::<BTreeSet<_>>();

    for container in all_containers(pod_spec) {
        for mount in container.volume_mounts.iter().flatten() {
            ensure!(
                volumes.contains(mount.name.as_str()),
                ReferentialIntegritySnafu {
                    key: resource.key(),
                    container: &container.name,
                    volume: &mount.name,
                }
            );
        }
    }
    Ok(())
}

fn pod_spec(resource: &ResourceObject) -> Result<Option<PodSpec>> {
    let Some(value) = resource
        .pod_spec_pointer()
        .and_then(|pointer| resource.data().pointer(pointer))
    else {
        return Ok(None);
    };

    serde_json::from_value(value.clone())
        .map(Some)
        .with_context(|_| ParsePodSpecSnafu {
            key: resource.key(),
        })
}

/// Validates a complete manifest set. Any error aborts generation.
#[instrument(skip_all, fields(resources = resources.len()))]
pub fn validate(resources: &[ResourceObject]) -> Result<()> {
    let mut pod_specs = Vec::new();
    for resource in resources {
        if let Some(pod_spec) = pod_spec(resource)? {
            pod_specs.push((resource, pod_spec));
        }
    }

    let conflicts = pod_specs
        .iter()
        .flat_map(|(_, pod_spec)| all_containers(pod_spec))
        .flat_map(container_env_conflicts)
        .collect::<Vec<_>>();
    ensure!(
        conflicts.is_empty(),
        ConflictingEnvSourceSnafu {
            conflicts: EnvConflicts(conflicts)
        }
    );

    let mut keys = BTreeSet::new();
    for (index, resource) in resources.iter().enumerate() {
        check_identity(index, resource)?;
        check_schedule(resource)?;

        let key = resource.key();
        ensure!(!keys.contains(&key), DuplicateResourceSnafu { key });
        keys.insert(key);
    }

    for (resource, pod_spec) in &pod_specs {
        check_mounts(resource, pod_spec)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use manifestgen_shared::manifest::parse_documents;
    use rstest::rstest;

    use super::*;
    use crate::{
        descriptor::{
            ApplicationDescriptor, EnvSource, VolumeMountSpec, VolumeSpec, WorkloadKind,
        },
        synth,
        target::DeploymentTarget,
    };

    fn synthesize(descriptor: &ApplicationDescriptor) -> Vec<ResourceObject> {
        synth::synthesize(descriptor, DeploymentTarget::Kubernetes).expect("synthesis succeeds")
    }

    fn resources(manifest: &str) -> Vec<ResourceObject> {
        parse_documents(manifest)
            .expect("test YAML is valid")
            .into_iter()
            .map(ResourceObject::from_dynamic)
            .collect()
    }

    #[test]
    fn basic_application_is_valid() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .build()
            .expect("valid descriptor");
        validate(&synthesize(&descriptor)).expect("valid manifests");
    }

    #[test]
    fn all_env_conflicts_are_reported_together() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .add_env(EnvSource::config_map_key("DB_URL", "db-config", "url"))
            .add_env(EnvSource::secret_key("DB_URL", "db-secret", "url"))
            .add_env(EnvSource::value("LOG_LEVEL", "info"))
            .add_env(EnvSource::value("LOG_LEVEL", "info"))
            .add_env(EnvSource::value("LOG_LEVEL", "debug"))
            .build()
            .expect("valid descriptor");

        let error = validate(&synthesize(&descriptor)).expect_err("conflicting env");
        let Error::ConflictingEnvSource { conflicts } = &error else {
            unreachable!("unexpected error: {error:?}");
        };
        assert_eq!(conflicts.0.len(), 2);
        assert_eq!(
            error.to_string(),
            r#"conflicting environment variables: DB_URL of container "demo" is defined from both config map "db-config" and secret "db-secret"; LOG_LEVEL of container "demo" is redefined from value "info" to value "debug""#
        );
    }

    #[test]
    fn cron_jobs_need_a_schedule() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .workload(WorkloadKind::CronJob)
            .build()
            .expect("valid descriptor");

        let error = validate(&synthesize(&descriptor)).expect_err("schedule is missing");
        assert_eq!(
            error.to_string(),
            r#"missing schedule for CronJob "demo" (batch/v1)"#
        );
    }

    #[test]
    fn mounts_need_a_declared_volume() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .add_volume(VolumeSpec::empty_dir("cache"))
            .add_mount(VolumeMountSpec::new("cache", "/cache"))
            .add_mount(VolumeMountSpec::new("data", "/data"))
            .build()
            .expect("valid descriptor");

        let error = validate(&synthesize(&descriptor)).expect_err("unknown volume");
        assert!(
            matches!(&error, Error::ReferentialIntegrity { volume, .. } if volume == "data"),
            "unexpected error: {error:?}"
        );
    }

    #[rstest]
    #[case::duplicate(
        indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: settings
            ---
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: settings
        "},
        r#"ConfigMap "settings" (v1) is defined more than once"#
    )]
    #[case::unnamed(
        indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              labels:
                app: demo
        "},
        "resource #0 (ConfigMap) has no name"
    )]
    fn identity_checks(#[case] manifest: &str, #[case] expected: &str) {
        let error = validate(&resources(manifest)).expect_err("invalid resources");
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn same_name_in_other_namespace_is_fine() {
        validate(&resources(indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: settings
              namespace: a
            ---
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: settings
              namespace: b
        "}))
        .expect("distinct namespaces");
    }
}
