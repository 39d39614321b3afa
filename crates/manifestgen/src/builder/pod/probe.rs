use k8s_openapi::{
    api::core::v1::{ExecAction, GRPCAction, HTTPGetAction, Probe, TCPSocketAction},
    apimachinery::pkg::util::intstr::IntOrString,
};

use crate::{
    builder::saturating_i32,
    descriptor::{
        PortSpec, ProbeAction, ProbeSpec, Scheme,
        port::{DEFAULT_HTTP_PORT, DEFAULT_HTTP_PORT_NAME},
    },
};

/// Turns a [`ProbeSpec`] into a Kubernetes [`Probe`], resolving named ports against the ports
/// of the container the probe belongs to.
#[derive(Debug)]
pub struct ProbeBuilder<'a> {
    spec: &'a ProbeSpec,
    ports: &'a [PortSpec],
}

impl<'a> ProbeBuilder<'a> {
    pub fn new(spec: &'a ProbeSpec, ports: &'a [PortSpec]) -> Self {
        Self { spec, ports }
    }

    /// Resolves the port number an HTTP or TCP action talks to. An explicit number wins, then
    /// the declared port with the referenced name, then [`DEFAULT_HTTP_PORT`].
    fn resolve_port(&self, port: Option<u16>, port_name: Option<&str>) -> (u16, Option<&PortSpec>) {
        if let Some(port) = port {
            return (port, self.ports.iter().find(|p| p.container_port == port));
        }

        let port_name = port_name.unwrap_or(DEFAULT_HTTP_PORT_NAME);
        match self.ports.iter().find(|p| p.name == port_name) {
            Some(declared) => (declared.container_port, Some(declared)),
            None => (DEFAULT_HTTP_PORT, None),
        }
    }

    fn http_get_action(
        &self,
        path: Option<&String>,
        port: Option<u16>,
        port_name: Option<&str>,
        scheme: Option<Scheme>,
    ) -> HTTPGetAction {
        let (number, declared) = self.resolve_port(port, port_name);
        let scheme = scheme.unwrap_or_else(|| {
            let secure = declared.map_or(matches!(number, 443 | 8443), PortSpec::is_secure);
            if secure { Scheme::Https } else { Scheme::Http }
        });

        HTTPGetAction {
            path: path.cloned(),
            port: IntOrString::Int(number.into()),
            scheme: Some(scheme.to_string()),
            ..HTTPGetAction::default()
        }
    }

    pub fn build(&self) -> Probe {
        let mut probe = Probe {
            initial_delay_seconds: self.spec.initial_delay_seconds.map(saturating_i32),
            period_seconds: self.spec.period_seconds.map(saturating_i32),
            timeout_seconds: self.spec.timeout_seconds.map(saturating_i32),
            success_threshold: self.spec.success_threshold.map(saturating_i32),
            failure_threshold: self.spec.failure_threshold.map(saturating_i32),
            ..Probe::default()
        };

        match &self.spec.action {
            ProbeAction::HttpGet {
                path,
                port,
                port_name,
                scheme,
            } => {
                probe.http_get = Some(self.http_get_action(
                    path.as_ref(),
                    *port,
                    port_name.as_deref(),
                    *scheme,
                ));
            }
            ProbeAction::Exec { command } => {
                probe.exec = Some(ExecAction {
                    command: Some(command.clone()),
                });
            }
            ProbeAction::TcpSocket { port, port_name } => {
                let (number, _) = self.resolve_port(*port, port_name.as_deref());
                probe.tcp_socket = Some(TCPSocketAction {
                    port: IntOrString::Int(number.into()),
                    ..TCPSocketAction::default()
                });
            }
            ProbeAction::Grpc { port, service } => {
                probe.grpc = Some(GRPCAction {
                    port: (*port).into(),
                    service: service.clone(),
                });
            }
        }

        probe
    }
}
