//! Container configuration builders.
//!
//! Provides a fluent API for building container create requests: image,
//! published ports, static network attachment and labels.

use crate::container::{ContainerError, Result};
use bollard::models::{
    ContainerCreateBody, EndpointIpamConfig, EndpointSettings, HostConfig, NetworkingConfig,
    PortBinding,
};
use std::collections::{BTreeMap, HashMap};

/// Static attachment to a user-defined network.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetworkAttachment {
    network: String,
    ipv4_address: Option<String>,
    gateway: Option<String>,
}

/// Container configuration builder.
///
/// Ports are kept sorted so the resulting request is deterministic.
pub struct ContainerConfigBuilder {
    image: Option<String>,
    labels: HashMap<String, String>,
    exposed_ports: Vec<String>,
    port_bindings: BTreeMap<String, PortBinding>,
    attachment: Option<NetworkAttachment>,
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerConfigBuilder {
    /// Create a new container configuration builder.
    pub fn new() -> Self {
        Self {
            image: None,
            labels: HashMap::new(),
            exposed_ports: Vec::new(),
            port_bindings: BTreeMap::new(),
            attachment: None,
        }
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Add several labels.
    pub fn labels<'a, I>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (k, v) in labels {
            self.labels.insert(k.clone(), v.clone());
        }
        self
    }

    /// Expose a TCP port and publish it on `host_ip:host_port`.
    pub fn publish<S: Into<String>>(mut self, port: u16, host_ip: S, host_port: u16) -> Self {
        let key = tcp_port(port);
        if !self.exposed_ports.contains(&key) {
            self.exposed_ports.push(key);
        }
        self.port_bindings.insert(
            tcp_port(port),
            PortBinding {
                host_ip: Some(host_ip.into()),
                host_port: Some(host_port.to_string()),
            },
        );
        self
    }

    /// Attach to `network`, optionally with a fixed IPv4 address and gateway.
    pub fn network<S: Into<String>>(
        mut self,
        network: S,
        ipv4_address: Option<String>,
        gateway: Option<String>,
    ) -> Self {
        self.attachment = Some(NetworkAttachment {
            network: network.into(),
            ipv4_address,
            gateway,
        });
        self
    }

    /// Build the container configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the image is missing, or a static address is
    /// requested without a network.
    pub fn build(self) -> Result<ContainerConfig> {
        let image = self
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| ContainerError::ConfigError("Image is required".to_string()))?;

        if let Some(attachment) = &self.attachment
            && attachment.network.trim().is_empty()
        {
            return Err(ContainerError::ConfigError(
                "Network attachment needs a network name".to_string(),
            ));
        }

        let mut exposed_ports = self.exposed_ports;
        exposed_ports.sort();

        Ok(ContainerConfig {
            image,
            labels: self.labels,
            exposed_ports,
            port_bindings: self.port_bindings,
            attachment: self.attachment,
        })
    }
}

/// Container configuration.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    image: String,
    labels: HashMap<String, String>,
    exposed_ports: Vec<String>,
    port_bindings: BTreeMap<String, PortBinding>,
    attachment: Option<NetworkAttachment>,
}

impl ContainerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::new()
    }

    /// Get the image name.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Exposed ports in `port/tcp` form, sorted.
    pub fn exposed_ports(&self) -> &[String] {
        &self.exposed_ports
    }

    /// Name of the network the container attaches to, if any.
    pub fn network(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.network.as_str())
    }

    /// Build the engine create request.
    pub fn to_create_body(&self) -> ContainerCreateBody {
        let exposed_ports = if self.exposed_ports.is_empty() {
            None
        } else {
            Some(
                self.exposed_ports
                    .iter()
                    .map(|port| (port.clone(), HashMap::new()))
                    .collect(),
            )
        };

        let port_bindings = if self.port_bindings.is_empty() {
            None
        } else {
            Some(
                self.port_bindings
                    .iter()
                    .map(|(port, binding)| (port.clone(), Some(vec![binding.clone()])))
                    .collect(),
            )
        };

        let networking_config = self.attachment.as_ref().map(|attachment| {
            let endpoint = EndpointSettings {
                ipam_config: attachment.ipv4_address.as_ref().map(|ip| EndpointIpamConfig {
                    ipv4_address: Some(ip.clone()),
                    ..Default::default()
                }),
                ip_address: attachment.ipv4_address.clone(),
                gateway: attachment.gateway.clone(),
                ..Default::default()
            };
            let mut endpoints = HashMap::new();
            endpoints.insert(attachment.network.clone(), endpoint);
            NetworkingConfig {
                endpoints_config: Some(endpoints),
            }
        });

        ContainerCreateBody {
            image: Some(self.image.clone()),
            labels: if self.labels.is_empty() {
                None
            } else {
                Some(self.labels.clone())
            },
            exposed_ports,
            host_config: Some(HostConfig {
                port_bindings,
                network_mode: self.attachment.as_ref().map(|a| a.network.clone()),
                ..Default::default()
            }),
            networking_config,
            ..Default::default()
        }
    }
}

fn tcp_port(port: u16) -> String {
    format!("{}/tcp", port)
}
