//! Container networking management.
//!
//! Creates the isolated bridge network the stack's containers attach to,
//! with a fixed IPAM range so containers can hold static addresses.

use crate::container::{Engine, Resolved, Result, find_network};
use bollard::models::{Ipam, IpamConfig, NetworkCreateRequest};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network name
    pub name: String,
    /// Network driver (bridge, host, none, overlay)
    pub driver: String,
    /// Allow standalone containers to attach
    pub attachable: bool,
    /// Internal network (no external connectivity)
    pub internal: bool,
    /// IPAM driver
    pub ipam_driver: String,
    pub subnet: String,
    pub gateway: String,
    /// Driver-specific options
    pub options: BTreeMap<String, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert(
            "com.docker.network.bridge.name".to_string(),
            "kafka-net".to_string(),
        );
        options.insert(
            "com.docker.network.bridge.host_binding_ipv4".to_string(),
            "0.0.0.0".to_string(),
        );

        Self {
            name: "kafka-net".to_string(),
            driver: "bridge".to_string(),
            attachable: true,
            internal: false,
            ipam_driver: "default".to_string(),
            subnet: "172.18.0.0/16".to_string(),
            gateway: "172.18.0.1".to_string(),
            options,
        }
    }
}

impl NetworkConfig {
    /// Build the engine create request, tagging it with `labels`.
    pub fn to_request(&self, labels: &HashMap<String, String>) -> NetworkCreateRequest {
        NetworkCreateRequest {
            name: self.name.clone(),
            driver: Some(self.driver.clone()),
            attachable: Some(self.attachable),
            internal: Some(self.internal),
            ingress: Some(false),
            options: Some(self.options.clone().into_iter().collect()),
            labels: if labels.is_empty() {
                None
            } else {
                Some(labels.clone())
            },
            ipam: Some(Ipam {
                driver: Some(self.ipam_driver.clone()),
                config: Some(vec![IpamConfig {
                    subnet: Some(self.subnet.clone()),
                    gateway: Some(self.gateway.clone()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Network manager for container networking.
pub struct NetworkManager {
    engine: Arc<dyn Engine>,
}

impl NetworkManager {
    /// Create a new network manager.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Create the network unless one with the exact name already exists.
    ///
    /// # Errors
    ///
    /// Returns error if listing or creation fails.
    pub async fn ensure_network(
        &self,
        config: &NetworkConfig,
        labels: &HashMap<String, String>,
    ) -> Result<Resolved> {
        if let Some(existing) = find_network(self.engine.as_ref(), &config.name).await? {
            info!("Network {} already exists ({})", config.name, existing.id);
            return Ok(Resolved::existing(existing.id));
        }

        debug!(
            "Creating network {} ({}, subnet {}, gateway {})",
            config.name, config.driver, config.subnet, config.gateway
        );
        let id = self.engine.create_network(config.to_request(labels)).await?;
        info!("Created network: {} ({})", config.name, id);

        Ok(Resolved::created(id))
    }
}
