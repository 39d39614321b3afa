use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The name of the port which is assumed when a descriptor declares no ports at all.
pub const DEFAULT_HTTP_PORT_NAME: &str = "http";
pub const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

/// A container port and how it is exposed through the generated Service.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    pub name: String,
    pub container_port: u16,

    #[serde(default)]
    pub protocol: Protocol,

    /// Fixed node port, only used for `NodePort` Services. Generated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_port: Option<u16>,

    /// Port number the Service forwards to, defaults to the container port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,

    /// Port number the Service listens on. See [`PortSpec::service_port`] for the fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_port: Option<u16>,

    /// HTTP path served on this port, used for ingress and route rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub tls: bool,
}

impl PortSpec {
    pub fn new(name: impl Into<String>, container_port: u16) -> Self {
        Self {
            name: name.into(),
            container_port,
            protocol: Protocol::default(),
            node_port: None,
            target_port: None,
            service_port: None,
            path: None,
            tls: false,
        }
    }

    /// The port assumed for applications which don't declare any ports.
    pub fn default_http() -> Self {
        Self::new(DEFAULT_HTTP_PORT_NAME, DEFAULT_HTTP_PORT)
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_node_port(mut self, node_port: u16) -> Self {
        self.node_port = Some(node_port);
        self
    }

    pub fn with_target_port(mut self, target_port: u16) -> Self {
        self.target_port = Some(target_port);
        self
    }

    pub fn with_service_port(mut self, service_port: u16) -> Self {
        self.service_port = Some(service_port);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// The port exposed by the Service.
    ///
    /// Well-known port names map to their well-known port numbers, every other port is exposed
    /// with the same number as the container port.
    pub fn service_port(&self) -> u16 {
        match (self.service_port, self.name.as_str()) {
            (Some(port), _) => port,
            (None, "http") => 80,
            (None, "https") => 443,
            (None, _) => self.container_port,
        }
    }

    /// The port the Service forwards traffic to.
    pub fn target_port(&self) -> u16 {
        self.target_port.unwrap_or(self.container_port)
    }

    /// Whether clients are expected to talk TLS to this port.
    pub fn is_secure(&self) -> bool {
        self.tls || matches!(self.container_port, 443 | 8443)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PortSpec::new("http", 8080), 80)]
    #[case(PortSpec::new("https", 8443), 443)]
    #[case(PortSpec::new("grpc", 9000), 9000)]
    #[case(PortSpec::new("http", 8080).with_service_port(8081), 8081)]
    fn service_port_fallback(#[case] port: PortSpec, #[case] expected: u16) {
        assert_eq!(port.service_port(), expected);
    }

    #[test]
    fn deserializes_with_defaults() {
        let port: PortSpec =
            serde_yaml::from_str("name: metrics\ncontainerPort: 9090\n").expect("valid port");

        assert_eq!(port, PortSpec::new("metrics", 9090));
        assert_eq!(port.protocol.to_string(), "TCP");
        assert_eq!(port.target_port(), 9090);
    }
}
