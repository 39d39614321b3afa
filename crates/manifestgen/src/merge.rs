//! Merges user-authored fragments into synthesized resources.
//!
//! A fragment applies to every resource with the same kind and name. If the fragment sets a
//! namespace, it has to match as well. Fragments which apply to no resource are added as new
//! resources.
//!
//! Merging works on the JSON trees of both objects:
//!
//! - objects are merged key by key, a `null` value removes the key,
//! - arrays whose elements are all objects with a `name` field are merged element-wise by name,
//!   unknown names are appended,
//! - everything else is replaced by the fragment value.
//!
//! Merged objects of well-known kinds are parsed into their typed form afterwards, so that a
//! fragment can't produce an object Kubernetes would reject on schema grounds.
use k8s_openapi::api::{
    apps::v1::{Deployment, StatefulSet},
    autoscaling::v2::HorizontalPodAutoscaler,
    batch::v1::{CronJob, Job},
    core::v1::{ConfigMap, Secret, Service, ServiceAccount},
    networking::v1::Ingress,
    rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
};
use kube::{Resource, core::DynamicObject};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::resource::{self, ResourceKey, ResourceObject};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize {key} for merging"))]
    SerializeResource {
        source: serde_json::Error,
        key: ResourceKey,
    },

    #[snafu(display("the fragment for {key} did not merge into a valid Kubernetes object"))]
    DeserializeMergedResource {
        source: serde_json::Error,
        key: ResourceKey,
    },

    #[snafu(display("the merged {key} does not match the schema of its kind"))]
    ParseMergedResource { source: resource::Error, key: ResourceKey },

    #[snafu(display("failed to convert the merged {key} back into a dynamic object"))]
    ConvertMergedResource { source: resource::Error, key: ResourceKey },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether `fragment` applies to `resource`.
fn matches(resource: &ResourceObject, fragment: &ResourceObject) -> bool {
    resource.kind() == fragment.kind()
        && resource.name() == fragment.name()
        && fragment
            .namespace()
            .is_none_or(|namespace| resource.namespace() == Some(namespace))
}

/// Merges `fragments` into `resources`, in the order in which the fragments are given.
#[instrument(skip_all, fields(resources = resources.len(), fragments = fragments.len()))]
pub fn apply_fragments(
    mut resources: Vec<ResourceObject>,
    fragments: &[ResourceObject],
) -> Result<Vec<ResourceObject>> {
    let mut added = Vec::new();

    for fragment in fragments {
        let mut matched = false;
        for resource in resources.iter_mut().filter(|resource| matches(resource, fragment)) {
            debug!(resource = %resource.key(), "merging fragment");
            *resource = merge_resource(resource, fragment)?;
            matched = true;
        }

        if !matched {
            debug!(resource = %fragment.key(), "fragment matches no resource, adding it");
            added.push(fragment.clone());
        }
    }

    resources.extend(added);
    Ok(resources)
}

fn merge_resource(resource: &ResourceObject, fragment: &ResourceObject) -> Result<ResourceObject> {
    let key = resource.key();

    let mut tree = resource
        .to_value()
        .with_context(|_| SerializeResourceSnafu { key: key.clone() })?;
    let patch = fragment.to_value().with_context(|_| SerializeResourceSnafu {
        key: fragment.key(),
    })?;
    deep_merge(&mut tree, &patch);

    let merged: DynamicObject = serde_json::from_value(tree)
        .with_context(|_| DeserializeMergedResourceSnafu { key: key.clone() })?;
    retype(ResourceObject::from_dynamic(merged))
}

/// Deep merges `patch` into `base`.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    base.remove(key);
                } else if let Some(existing) = base.get_mut(key) {
                    deep_merge(existing, value);
                } else {
                    base.insert(key.clone(), value.clone());
                }
            }
        }
        (Value::Array(base), Value::Array(patch)) if is_named_list(base) && is_named_list(patch) => {
            for item in patch {
                let name = item.get("name");
                match base.iter_mut().find(|existing| existing.get("name") == name) {
                    Some(existing) => deep_merge(existing, item),
                    None => base.push(item.clone()),
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Lists like containers, ports or volumes, whose elements are identified by their name.
fn is_named_list(items: &[Value]) -> bool {
    items
        .iter()
        .all(|item| item.get("name").is_some_and(Value::is_string))
}

fn parse_as<K>(resource: &ResourceObject) -> Result<ResourceObject>
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Serialize,
{
    let typed = resource
        .parse::<K>()
        .with_context(|_| ParseMergedResourceSnafu { key: resource.key() })?;
    ResourceObject::from_resource(&typed)
        .with_context(|_| ConvertMergedResourceSnafu { key: resource.key() })
}

/// Round-trips merged objects of well-known kinds through their typed form.
fn retype(resource: ResourceObject) -> Result<ResourceObject> {
    match (resource.api_version(), resource.kind()) {
        ("v1", "ServiceAccount") => parse_as::<ServiceAccount>(&resource),
        ("v1", "ConfigMap") => parse_as::<ConfigMap>(&resource),
        ("v1", "Secret") => parse_as::<Secret>(&resource),
        ("v1", "Service") => parse_as::<Service>(&resource),
        ("apps/v1", "Deployment") => parse_as::<Deployment>(&resource),
        ("apps/v1", "StatefulSet") => parse_as::<StatefulSet>(&resource),
        ("batch/v1", "Job") => parse_as::<Job>(&resource),
        ("batch/v1", "CronJob") => parse_as::<CronJob>(&resource),
        ("networking.k8s.io/v1", "Ingress") => parse_as::<Ingress>(&resource),
        ("autoscaling/v2", "HorizontalPodAutoscaler") => {
            parse_as::<HorizontalPodAutoscaler>(&resource)
        }
        ("rbac.authorization.k8s.io/v1", "Role") => parse_as::<Role>(&resource),
        ("rbac.authorization.k8s.io/v1", "ClusterRole") => parse_as::<ClusterRole>(&resource),
        ("rbac.authorization.k8s.io/v1", "RoleBinding") => parse_as::<RoleBinding>(&resource),
        ("rbac.authorization.k8s.io/v1", "ClusterRoleBinding") => {
            parse_as::<ClusterRoleBinding>(&resource)
        }
        _ => Ok(resource),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use manifestgen_shared::manifest::parse_documents;
    use serde_json::json;

    use super::*;
    use crate::{descriptor::ApplicationDescriptor, synth, target::DeploymentTarget};

    fn synthesized() -> Vec<ResourceObject> {
        let descriptor = ApplicationDescriptor::builder("demo")
            .namespace("shop")
            .build()
            .expect("valid descriptor");
        synth::synthesize(&descriptor, DeploymentTarget::Kubernetes).expect("synthesis succeeds")
    }

    fn fragments(manifest: &str) -> Vec<ResourceObject> {
        parse_documents(manifest)
            .expect("test YAML is valid")
            .into_iter()
            .map(ResourceObject::from_dynamic)
            .collect()
    }

    fn deployment(resources: &[ResourceObject]) -> Deployment {
        resources
            .iter()
            .find(|resource| resource.kind() == "Deployment")
            .expect("deployment is synthesized")
            .parse()
            .expect("valid deployment")
    }

    #[test]
    fn containers_merge_by_name() {
        let resources = apply_fragments(
            synthesized(),
            &fragments(indoc! {"
                apiVersion: apps/v1
                kind: Deployment
                metadata:
                  name: demo
                  labels:
                    team: checkout
                spec:
                  replicas: 3
                  template:
                    spec:
                      containers:
                        - name: demo
                          workingDir: /srv
                        - name: sidecar
                          image: envoyproxy/envoy:v1.31.0
            "}),
        )
        .expect("fragment merges");

        assert_eq!(resources.len(), 3);
        let deployment = deployment(&resources);
        assert_eq!(
            deployment.metadata.labels.as_ref().expect("labels")["team"],
            "checkout"
        );

        let spec = deployment.spec.expect("spec is set");
        assert_eq!(spec.replicas, Some(3));
        let containers = spec.template.spec.expect("pod spec").containers;
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "demo");
        assert_eq!(containers[0].image.as_deref(), Some("demo:latest"));
        assert_eq!(containers[0].working_dir.as_deref(), Some("/srv"));
        assert_eq!(containers[1].name, "sidecar");
    }

    #[test]
    fn unmatched_fragments_are_added() {
        let resources = apply_fragments(
            synthesized(),
            &fragments(indoc! {"
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: extra
                  namespace: shop
                data:
                  key: value
                ---
                apiVersion: apps/v1
                kind: Deployment
                metadata:
                  name: demo
                  namespace: elsewhere
                spec:
                  replicas: 5
            "}),
        )
        .expect("fragments apply");

        let keys = resources
            .iter()
            .map(|resource| (resource.kind(), resource.namespace()))
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            [
                ("ServiceAccount", Some("shop")),
                ("Service", Some("shop")),
                ("Deployment", Some("shop")),
                ("ConfigMap", Some("shop")),
                ("Deployment", Some("elsewhere")),
            ]
        );
        assert_eq!(deployment(&resources).spec.expect("spec").replicas, Some(1));
    }

    #[test]
    fn schema_violations_are_rejected() {
        let error = apply_fragments(
            synthesized(),
            &fragments(indoc! {"
                apiVersion: apps/v1
                kind: Deployment
                metadata:
                  name: demo
                spec:
                  replicas: three
            "}),
        )
        .expect_err("replicas must be a number");

        assert_eq!(
            error.to_string(),
            r#"the merged Deployment shop/"demo" (apps/v1) does not match the schema of its kind"#
        );
    }

    #[test]
    fn null_removes_keys_and_scalars_replace() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "list": [1, 2]});
        deep_merge(&mut base, &json!({"a": {"c": null, "d": 3}, "list": [3]}));

        assert_eq!(base, json!({"a": {"b": 1, "d": 3}, "list": [3]}));
    }
}
