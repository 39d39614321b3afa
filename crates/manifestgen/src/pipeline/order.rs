//! Orders resources so that identities and their permissions exist before anything runs as them.
use tracing::instrument;

use crate::resource::ResourceObject;

/// Lower values are applied first.
pub fn precedence(resource: &ResourceObject) -> u8 {
    match resource.kind() {
        "ServiceAccount" | "Role" | "ClusterRole" => 0,
        "RoleBinding" | "ClusterRoleBinding" => 1,
        _ if resource.is_workload() => 2,
        _ => 3,
    }
}

/// Sorts `resources` by [`precedence`]. The sort is stable, so resources of the same precedence
/// keep their insertion order.
#[instrument(skip_all, fields(resources = resources.len()))]
pub fn order(resources: &mut [ResourceObject]) {
    resources.sort_by_key(precedence);
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::{
        apps::v1::Deployment,
        core::v1::{ConfigMap, PodTemplateSpec, Service, ServiceAccount},
        rbac::v1::{Role, RoleBinding},
    };
    use kube::{Resource, core::ObjectMeta};
    use serde::Serialize;

    use super::*;
    use crate::crd::knative::{KnativeService, KnativeServiceSpec};

    fn named<K>(name: &str) -> ResourceObject
    where
        K: Resource<DynamicType = ()> + Default + Serialize,
    {
        let mut resource = K::default();
        *resource.meta_mut() = ObjectMeta {
            name: Some(name.to_owned()),
            ..ObjectMeta::default()
        };
        ResourceObject::from_resource(&resource).expect("convertible")
    }

    #[test]
    fn identities_precede_bindings_precede_workloads() {
        let mut resources = vec![
            named::<Service>("demo"),
            named::<Deployment>("demo"),
            named::<RoleBinding>("demo"),
            named::<ConfigMap>("settings"),
            named::<ServiceAccount>("demo"),
            named::<Role>("view-jobs"),
            named::<RoleBinding>("demo-view-jobs"),
        ];
        order(&mut resources);

        let names = resources
            .iter()
            .map(|resource| (resource.kind(), resource.name()))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                ("ServiceAccount", "demo"),
                ("Role", "view-jobs"),
                ("RoleBinding", "demo"),
                ("RoleBinding", "demo-view-jobs"),
                ("Deployment", "demo"),
                ("Service", "demo"),
                ("ConfigMap", "settings"),
            ]
        );
    }

    #[test]
    fn knative_services_are_workloads() {
        let knative = ResourceObject::from_resource(&KnativeService::new(
            "demo",
            KnativeServiceSpec {
                template: PodTemplateSpec::default(),
            },
        ))
        .expect("convertible");

        assert_eq!(precedence(&knative), 2);
        assert_eq!(precedence(&named::<Service>("demo")), 3);
    }
}
