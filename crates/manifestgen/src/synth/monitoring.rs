use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::{
    crd::service_monitor::{Endpoint, ServiceMonitor, ServiceMonitorSpec},
    descriptor::{PortSpec, Scheme, port::DEFAULT_HTTP_PORT_NAME},
    synth::{Context, service},
};

/// The port metrics are scraped from: the configured one, then `http`, then the first port.
pub fn metrics_port<'a>(ctx: &Context<'a>) -> Option<&'a PortSpec> {
    let descriptor = ctx.descriptor;
    let name = descriptor
        .metrics
        .port
        .as_deref()
        .unwrap_or(DEFAULT_HTTP_PORT_NAME);

    descriptor
        .port(name)
        .or_else(|| descriptor.ports.first())
}

fn scheme(ctx: &Context, port: &PortSpec) -> Scheme {
    ctx.descriptor.metrics.scheme.unwrap_or(if port.is_secure() {
        Scheme::Https
    } else {
        Scheme::Http
    })
}

/// `prometheus.io/scrape` style annotations, put on the Service and the pod template. Empty if
/// metrics are disabled.
pub fn prometheus_annotations(ctx: &Context) -> BTreeMap<String, String> {
    let metrics = &ctx.descriptor.metrics;
    let Some(port) = metrics_port(ctx).filter(|_| metrics.enabled) else {
        return BTreeMap::new();
    };
    let prefix = metrics.annotation_prefix();

    BTreeMap::from([
        (format!("{prefix}/scrape"), "true".to_owned()),
        (format!("{prefix}/path"), metrics.path().to_owned()),
        (format!("{prefix}/port"), port.container_port.to_string()),
        (
            format!("{prefix}/scheme"),
            scheme(ctx, port).to_string().to_lowercase(),
        ),
    ])
}

/// A Prometheus Operator ServiceMonitor selecting the application Service, if requested.
pub fn service_monitor(ctx: &Context) -> Option<ServiceMonitor> {
    let metrics = &ctx.descriptor.metrics;
    if !(metrics.enabled && metrics.service_monitor && service::has_service(ctx)) {
        return None;
    }
    let port = metrics_port(ctx)?;

    let mut service_monitor = ServiceMonitor::new(
        ctx.name(),
        ServiceMonitorSpec {
            selector: LabelSelector {
                match_labels: Some(ctx.selector.clone()),
                ..LabelSelector::default()
            },
            endpoints: vec![Endpoint {
                port: Some(port.name.clone()),
                path: Some(metrics.path().to_owned()),
                scheme: Some(scheme(ctx, port).to_string().to_lowercase()),
                interval: metrics.scrape_interval.clone(),
            }],
        },
    );
    service_monitor.metadata = ctx.metadata(ctx.name());
    Some(service_monitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{ApplicationDescriptor, MetricsSpec},
        target::DeploymentTarget,
    };

    fn descriptor(metrics: MetricsSpec) -> ApplicationDescriptor {
        ApplicationDescriptor::builder("demo")
            .metrics(metrics)
            .build()
            .expect("valid descriptor")
    }

    #[test]
    fn disabled_metrics_add_nothing() {
        let descriptor = descriptor(MetricsSpec::default());
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        assert!(prometheus_annotations(&ctx).is_empty());
        assert_eq!(service_monitor(&ctx), None);
    }

    #[test]
    fn scrape_annotations() {
        let descriptor = descriptor(MetricsSpec {
            enabled: true,
            path: Some("/q/metrics".to_owned()),
            ..MetricsSpec::default()
        });
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        assert_eq!(
            prometheus_annotations(&ctx),
            BTreeMap::from([
                ("prometheus.io/path".to_owned(), "/q/metrics".to_owned()),
                ("prometheus.io/port".to_owned(), "8080".to_owned()),
                ("prometheus.io/scheme".to_owned(), "http".to_owned()),
                ("prometheus.io/scrape".to_owned(), "true".to_owned()),
            ])
        );
    }

    #[test]
    fn service_monitor_on_request() {
        let descriptor = descriptor(MetricsSpec {
            enabled: true,
            service_monitor: true,
            scrape_interval: Some("30s".to_owned()),
            ..MetricsSpec::default()
        });
        let ctx = Context::new(&descriptor, DeploymentTarget::Kubernetes).expect("context");

        let service_monitor = service_monitor(&ctx).expect("service monitor is generated");
        assert_eq!(service_monitor.metadata.name.as_deref(), Some("demo"));
        assert_eq!(
            service_monitor.spec.endpoints,
            [Endpoint {
                port: Some("http".to_owned()),
                path: Some("/metrics".to_owned()),
                scheme: Some("http".to_owned()),
                interval: Some("30s".to_owned()),
            }]
        );
    }
}
