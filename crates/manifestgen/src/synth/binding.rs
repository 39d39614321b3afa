use crate::{
    crd::service_binding::{BindingApplication, BindingService, ServiceBinding, ServiceBindingSpec},
    descriptor::WorkloadKind,
    synth::Context,
};

/// Group, version and plural resource name of the generated workload.
fn application_resource(workload: WorkloadKind) -> (&'static str, &'static str, &'static str) {
    match workload {
        WorkloadKind::Deployment => ("apps", "v1", "deployments"),
        WorkloadKind::StatefulSet => ("apps", "v1", "statefulsets"),
        WorkloadKind::Job => ("batch", "v1", "jobs"),
        WorkloadKind::CronJob => ("batch", "v1", "cronjobs"),
        WorkloadKind::DeploymentConfig => ("apps.openshift.io", "v1", "deploymentconfigs"),
        WorkloadKind::KnativeService => ("serving.knative.dev", "v1", "services"),
    }
}

/// Splits an `apiVersion` into group and version, the core group is empty.
fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.rsplit_once('/').unwrap_or(("", api_version))
}

pub fn service_bindings(ctx: &Context) -> Vec<ServiceBinding> {
    let (group, version, resource) = application_resource(ctx.workload);

    ctx.descriptor
        .service_bindings
        .iter()
        .map(|binding| {
            let name = binding
                .binding_name
                .clone()
                .unwrap_or_else(|| format!("{app}-{name}", app = ctx.name(), name = binding.name));
            let (service_group, service_version) = split_api_version(&binding.api_version);

            let mut service_binding = ServiceBinding::new(
                &name,
                ServiceBindingSpec {
                    application: BindingApplication {
                        group: group.to_owned(),
                        version: version.to_owned(),
                        resource: resource.to_owned(),
                        name: ctx.name().to_owned(),
                    },
                    services: vec![BindingService {
                        group: service_group.to_owned(),
                        version: service_version.to_owned(),
                        kind: binding.kind.clone(),
                        name: binding
                            .service_name
                            .clone()
                            .unwrap_or_else(|| binding.name.clone()),
                        namespace: binding.namespace.clone(),
                    }],
                    bind_as_files: true,
                },
            );
            service_binding.metadata = ctx.metadata(name);
            service_binding
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{ApplicationDescriptor, ServiceBindingSpec as BindingRequest},
        target::DeploymentTarget,
    };

    #[test]
    fn binds_postgres_cluster_to_deployment() {
        let descriptor = ApplicationDescriptor::builder("demo")
            .add_service_binding(BindingRequest {
                name: "db".to_owned(),
                api_version: "postgres-operator.crunchydata.com/v1beta1".to_owned(),
                kind: "PostgresCluster".to_owned(),
                service_name: Some("hippo".to_owned()),
                namespace: None,
                binding_name: None,
            })
            .build()
            .expect("valid descriptor");
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let bindings = service_bindings(&ctx);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].metadata.name.as_deref(), Some("demo-db"));
        assert_eq!(
            bindings[0].spec.application,
            BindingApplication {
                group: "apps".to_owned(),
                version: "v1".to_owned(),
                resource: "deployments".to_owned(),
                name: "demo".to_owned(),
            }
        );
        assert_eq!(
            bindings[0].spec.services,
            [BindingService {
                group: "postgres-operator.crunchydata.com".to_owned(),
                version: "v1beta1".to_owned(),
                kind: "PostgresCluster".to_owned(),
                name: "hippo".to_owned(),
                namespace: None,
            }]
        );
    }

    #[test]
    fn core_api_version_has_an_empty_group() {
        assert_eq!(split_api_version("v1"), ("", "v1"));
        assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
    }
}
