use std::{
    collections::{BTreeMap, BTreeSet},
    ops::RangeInclusive,
};

use k8s_openapi::{
    api::core::v1::{Service, ServicePort, ServiceSpec},
    apimachinery::pkg::util::intstr::IntOrString,
};
use sha2::{Digest, Sha256};

use crate::{
    descriptor::{PortSpec, ServiceType},
    synth::{Context, monitoring},
};

/// Node ports are picked from the lower part of the default node port range, leaving the rest
/// to Kubernetes.
pub const STABLE_NODE_PORT_RANGE: RangeInclusive<u16> = 30000..=31999;

/// Derives a node port from the application and port name, so it stays the same between
/// builds.
pub fn stable_node_port(application: &str, port_name: &str) -> u16 {
    let digest = Sha256::digest(format!("{application}-{port_name}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);

    let start = *STABLE_NODE_PORT_RANGE.start();
    let len = u64::from(*STABLE_NODE_PORT_RANGE.end() - start) + 1;
    let offset = u16::try_from(u64::from_be_bytes(prefix) % len).unwrap_or_default();
    start + offset
}

/// Node ports of a `NodePort` Service by port name.
///
/// Explicit node ports are kept. The others start at [`stable_node_port`] and move on to the next
/// free port of [`STABLE_NODE_PORT_RANGE`] if that one is already taken.
pub fn node_ports<'a>(application: &str, ports: &'a [PortSpec]) -> BTreeMap<&'a str, u16> {
    let mut used = ports
        .iter()
        .filter_map(|port| port.node_port)
        .collect::<BTreeSet<_>>();

    ports
        .iter()
        .map(|port| {
            let node_port = port.node_port.unwrap_or_else(|| {
                let preferred = stable_node_port(application, &port.name);
                let node_port = next_free_node_port(preferred, &used);
                used.insert(node_port);
                node_port
            });
            (port.name.as_str(), node_port)
        })
        .collect()
}

fn next_free_node_port(preferred: u16, used: &BTreeSet<u16>) -> u16 {
    let (start, end) = (*STABLE_NODE_PORT_RANGE.start(), *STABLE_NODE_PORT_RANGE.end());
    (preferred..=end)
        .chain(start..preferred)
        .find(|node_port| !used.contains(node_port))
        .unwrap_or(preferred)
}

/// Whether a Kubernetes Service is generated. Knative creates Services on its own and batch
/// workloads don't serve traffic.
pub fn has_service(ctx: &Context) -> bool {
    !ctx.is_knative() && ctx.workload.is_long_running()
}

pub fn service_type(ctx: &Context) -> Option<ServiceType> {
    ctx.descriptor
        .service_type
        .or_else(|| ctx.target.default_service_type())
}

pub fn service(ctx: &Context) -> Option<Service> {
    if !has_service(ctx) {
        return None;
    }
    let service_type = service_type(ctx)?;

    let node_ports = match service_type {
        ServiceType::NodePort => node_ports(ctx.name(), &ctx.descriptor.ports),
        ServiceType::ClusterIP | ServiceType::LoadBalancer => BTreeMap::new(),
    };
    let ports = ctx
        .descriptor
        .ports
        .iter()
        .map(|port| service_port(port, node_ports.get(port.name.as_str()).copied()))
        .collect();

    let mut metadata = ctx.metadata(ctx.name());
    let scrape_annotations = monitoring::prometheus_annotations(ctx);
    if !scrape_annotations.is_empty() {
        metadata
            .annotations
            .get_or_insert_with(Default::default)
            .extend(scrape_annotations);
    }

    Some(Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(ctx.selector.clone()),
            ports: Some(ports),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    })
}

fn service_port(port: &PortSpec, node_port: Option<u16>) -> ServicePort {
    let node_port = node_port.or(port.node_port);

    ServicePort {
        name: Some(port.name.clone()),
        port: port.service_port().into(),
        target_port: Some(IntOrString::Int(port.target_port().into())),
        node_port: node_port.map(Into::into),
        protocol: Some(port.protocol.to_string()),
        ..ServicePort::default()
    }
}
