use k8s_openapi::{
    api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
        IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
    },
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::{
    crd::route::{Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig},
    descriptor::{self, PathType, TlsTermination},
    synth::{Context, service},
};

/// The port receiving external traffic: the requested one, else the first application port.
fn exposed_port_name(ctx: &Context, requested: Option<&str>) -> Option<String> {
    requested
        .map(ToOwned::to_owned)
        .or_else(|| ctx.descriptor.ports.first().map(|port| port.name.clone()))
}

/// Port names and numbers are both accepted.
fn backend_port(port: &str) -> ServiceBackendPort {
    match port.parse::<i32>() {
        Ok(number) => ServiceBackendPort {
            number: Some(number),
            ..ServiceBackendPort::default()
        },
        Err(_) => ServiceBackendPort {
            name: Some(port.to_owned()),
            ..ServiceBackendPort::default()
        },
    }
}

fn ingress_rule(ctx: &Context, rule: &descriptor::IngressRule) -> IngressRule {
    let service_name = rule
        .service_name
        .clone()
        .unwrap_or_else(|| ctx.name().to_owned());
    let port = rule
        .service_port
        .clone()
        .or_else(|| exposed_port_name(ctx, ctx.descriptor.ingress.target_port.as_deref()))
        .unwrap_or_default();

    IngressRule {
        host: rule.host.clone(),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: Some(rule.path.clone()),
                path_type: rule.path_type.to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: service_name,
                        port: Some(backend_port(&port)),
                    }),
                    ..IngressBackend::default()
                },
            }],
        }),
    }
}

/// An Ingress routing to the application Service, if exposure was requested and the target uses
/// Ingresses. The default rule comes first, followed by the declared rules in their order.
pub fn ingress(ctx: &Context) -> Option<Ingress> {
    let spec = &ctx.descriptor.ingress;
    if !(spec.expose && ctx.target.supports_ingress() && service::has_service(ctx)) {
        return None;
    }

    let default_rule = descriptor::IngressRule {
        host: spec.host.clone(),
        path: "/".to_owned(),
        path_type: PathType::Prefix,
        service_name: None,
        service_port: spec.target_port.clone(),
    };
    let rules = std::iter::once(&default_rule)
        .chain(&spec.rules)
        .map(|rule| ingress_rule(ctx, rule))
        .collect();

    let tls = spec
        .tls
        .iter()
        .map(|tls| IngressTLS {
            secret_name: Some(tls.secret_name.clone()),
            hosts: (!tls.hosts.is_empty()).then(|| tls.hosts.clone()),
        })
        .collect::<Vec<_>>();

    let mut metadata = ctx.metadata(ctx.name());
    if !spec.annotations.is_empty() {
        metadata
            .annotations
            .get_or_insert_with(Default::default)
            .extend(spec.annotations.clone());
    }

    Some(Ingress {
        metadata,
        spec: Some(IngressSpec {
            ingress_class_name: spec.ingress_class_name.clone(),
            rules: Some(rules),
            tls: (!tls.is_empty()).then_some(tls),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    })
}

/// An OpenShift Route to the application Service, if exposure was requested.
pub fn route(ctx: &Context) -> Option<Route> {
    let spec = &ctx.descriptor.route;
    if !(spec.expose && ctx.target.supports_route() && service::has_service(ctx)) {
        return None;
    }

    let tls = spec.tls_termination.map(|termination| TlsConfig {
        termination: termination.to_string(),
        insecure_edge_termination_policy: (termination == TlsTermination::Edge)
            .then(|| "Redirect".to_owned()),
    });

    let mut route = Route::new(
        ctx.name(),
        RouteSpec {
            host: spec.host.clone(),
            to: RouteTargetReference::service(ctx.name()),
            port: exposed_port_name(ctx, spec.target_port.as_deref()).map(|port| RoutePort {
                target_port: IntOrString::String(port),
            }),
            tls,
        },
    );
    route.metadata = ctx.metadata(ctx.name());
    if !spec.annotations.is_empty() {
        route
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .extend(spec.annotations.clone());
    }
    Some(route)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        descriptor::{ApplicationDescriptor, IngressSpec as IngressRequest, IngressTls},
        target::DeploymentTarget,
    };

    fn exposed() -> ApplicationDescriptor {
        ApplicationDescriptor::builder("demo")
            .ingress(IngressRequest {
                expose: true,
                host: Some("demo.example.com".to_owned()),
                ingress_class_name: Some("nginx".to_owned()),
                tls: vec![IngressTls {
                    secret_name: "demo-tls".to_owned(),
                    hosts: vec!["demo.example.com".to_owned()],
                }],
                rules: vec![
                    descriptor::IngressRule::new(Some("api.example.com".to_owned()), "/v2")
                        .with_service("api", "8443"),
                    descriptor::IngressRule::new(None, "/static")
                        .with_path_type(PathType::Exact),
                ],
                ..IngressRequest::default()
            })
            .route(descriptor::RouteSpec {
                expose: true,
                tls_termination: Some(TlsTermination::Edge),
                ..descriptor::RouteSpec::default()
            })
            .build()
            .expect("valid descriptor")
    }

    #[test]
    fn ingress_rules_keep_declaration_order() {
        let descriptor = exposed();
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let spec = ingress(&ctx)
            .and_then(|ingress| ingress.spec)
            .expect("ingress is generated");
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));

        let rules = spec.rules.expect("rules are set");
        let hosts = rules.iter().map(|rule| rule.host.as_deref()).collect::<Vec<_>>();
        assert_eq!(
            hosts,
            [Some("demo.example.com"), Some("api.example.com"), None]
        );

        let backends = rules
            .iter()
            .map(|rule| {
                let path = &rule.http.as_ref().expect("http rule").paths[0];
                let service = path.backend.service.as_ref().expect("service backend");
                (service.name.as_str(), service.port.clone().expect("port"))
            })
            .collect::<Vec<_>>();
        assert_eq!(backends[0].0, "demo");
        assert_eq!(backends[0].1.name.as_deref(), Some("http"));
        assert_eq!(backends[1].0, "api");
        assert_eq!(backends[1].1.number, Some(8443));
        assert_eq!(
            rules[2].http.as_ref().expect("http rule").paths[0].path_type,
            "Exact"
        );
    }

    #[rstest]
    #[case(DeploymentTarget::Openshift)]
    #[case(DeploymentTarget::Knative)]
    fn no_ingress(#[case] target: DeploymentTarget) {
        let descriptor = exposed();
        let ctx = Context::new(&descriptor, target).expect("context");
        assert_eq!(ingress(&ctx), None);
    }

    #[test]
    fn route_on_openshift() {
        let descriptor = exposed();
        let ctx = Context::new(&descriptor, DeploymentTarget::Openshift).expect("context");

        let route = route(&ctx).expect("route is generated");
        assert_eq!(route.spec.to, RouteTargetReference::service("demo"));
        assert_eq!(
            route.spec.port,
            Some(RoutePort {
                target_port: IntOrString::String("http".to_owned())
            })
        );
        assert_eq!(
            route.spec.tls,
            Some(TlsConfig {
                termination: "edge".to_owned(),
                insecure_edge_termination_policy: Some("Redirect".to_owned()),
            })
        );

        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");
        assert_eq!(super::route(&ctx), None);
    }
}
