//! Stack configuration.
//!
//! Every name, address, port and credential used by a provisioning run. All
//! sections are optional in TOML; missing fields take the defaults below.

use crate::container::{
    ContainerConfig, ContainerError, EngineConfig, ExecConfig, ImageBuildSpec, NetworkConfig,
    Result,
};
use crate::readiness::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Complete configuration of a provisioning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Pull missing images before creating containers from them
    pub auto_pull: bool,
    pub engine: EngineConfig,
    pub network: NetworkConfig,
    pub broker_image: ImageBuildSpec,
    pub broker: ServiceSpec,
    pub coordinator: ServiceSpec,
    pub database: DatabaseSpec,
    pub wait: WaitConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            auto_pull: true,
            engine: EngineConfig::default(),
            network: NetworkConfig::default(),
            broker_image: ImageBuildSpec::default(),
            broker: ServiceSpec {
                name: "my-kafka".to_string(),
                image: "my-kafka:latest".to_string(),
                ports: vec![9092],
                ipv4_address: Some("172.18.0.3".to_string()),
                ..Default::default()
            },
            coordinator: ServiceSpec {
                name: "zookeeper".to_string(),
                image: "zookeeper:latest".to_string(),
                ports: Vec::new(),
                ipv4_address: Some("172.18.0.2".to_string()),
                ..Default::default()
            },
            database: DatabaseSpec::default(),
            wait: WaitConfig::default(),
        }
    }
}

impl StackConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ContainerError::ConfigError(msg) => {
                ContainerError::ConfigError(format!("{}: {}", path.as_ref().display(), msg))
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ContainerError::ConfigError(e.to_string()))
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ContainerError::ConfigError(e.to_string()))
    }

    /// Reject configurations that cannot produce a working run.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        require("network.name", &self.network.name)?;
        require("broker_image.tag", &self.broker_image.tag)?;
        require("broker_image.build_tag", &self.broker_image.build_tag)?;
        require("broker_image.dockerfile", &self.broker_image.dockerfile)?;
        self.broker.validate("broker")?;
        self.coordinator.validate("coordinator")?;
        self.database.validate()?;

        let names = [&self.broker.name, &self.coordinator.name, &self.database.name];
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ContainerError::ConfigError(format!(
                    "Container name {} is used twice",
                    name
                )));
            }
        }

        self.wait.running.validate("wait.running")?;
        self.wait.readiness.validate("wait.readiness")?;
        if self.wait.probe_timeout_secs == 0 {
            return Err(ContainerError::ConfigError(
                "wait.probe_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ContainerError::ConfigError(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

/// A long-running service container attached to the stack network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    /// TCP ports published on `host_ip` under the same number
    pub ports: Vec<u16>,
    pub host_ip: String,
    /// Static address on the stack network
    pub ipv4_address: Option<String>,
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            ports: Vec::new(),
            host_ip: "0.0.0.0".to_string(),
            ipv4_address: None,
        }
    }
}

impl ServiceSpec {
    fn validate(&self, section: &str) -> Result<()> {
        require(&format!("{}.name", section), &self.name)?;
        require(&format!("{}.image", section), &self.image)
    }

    /// Create request for this service on `network`.
    pub fn container_config(
        &self,
        network: &NetworkConfig,
        labels: &HashMap<String, String>,
    ) -> Result<ContainerConfig> {
        let mut builder = ContainerConfig::builder()
            .image(&self.image)
            .labels(labels)
            .network(
                &network.name,
                self.ipv4_address.clone(),
                Some(network.gateway.clone()),
            );
        for port in &self.ports {
            builder = builder.publish(*port, &self.host_ip, *port);
        }
        builder.build()
    }
}

/// The database container that is torn down and recreated on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSpec {
    pub name: String,
    pub image: String,
    /// Ports published on `host_ip` under the same number
    pub ports: Vec<u16>,
    pub host_ip: String,
    /// Grace period before the engine kills the container on stop
    pub stop_timeout_secs: u32,
    /// Fail the run when the container to recreate does not exist
    pub require_existing: bool,
    /// Management endpoint that answers 200 once the server is up
    pub readiness_url: String,
    /// Address couchbase-cli uses inside the container
    pub cluster_host: String,
    pub username: String,
    pub password: String,
    pub services: String,
    pub cluster_ramsize_mb: u32,
    pub index_ramsize_mb: u32,
    pub eventing_ramsize_mb: u32,
    pub index_storage: String,
    pub bucket: String,
    pub bucket_type: String,
    pub bucket_ramsize_mb: u32,
}

impl Default for DatabaseSpec {
    fn default() -> Self {
        Self {
            name: "single-node-cb".to_string(),
            image: "couchbase:latest".to_string(),
            ports: vec![8091, 8092, 8093, 8094, 8095, 8096, 11210],
            host_ip: "0.0.0.0".to_string(),
            stop_timeout_secs: 10,
            require_existing: true,
            readiness_url: "http://127.0.0.1:8091/pools".to_string(),
            cluster_host: "127.0.0.1".to_string(),
            username: "Administrator".to_string(),
            password: "password".to_string(),
            services: "data, index, query".to_string(),
            cluster_ramsize_mb: 2048,
            index_ramsize_mb: 1024,
            eventing_ramsize_mb: 512,
            index_storage: "default".to_string(),
            bucket: "default".to_string(),
            bucket_type: "couchbase".to_string(),
            bucket_ramsize_mb: 1024,
        }
    }
}

impl DatabaseSpec {
    fn validate(&self) -> Result<()> {
        require("database.name", &self.name)?;
        require("database.image", &self.image)?;
        require("database.username", &self.username)?;
        require("database.bucket", &self.bucket)?;
        url::Url::parse(&self.readiness_url).map_err(|e| {
            ContainerError::ConfigError(format!(
                "database.readiness_url {} is invalid: {}",
                self.readiness_url, e
            ))
        })?;
        Ok(())
    }

    /// Create request with every port published on the host.
    pub fn container_config(&self, labels: &HashMap<String, String>) -> Result<ContainerConfig> {
        let mut builder = ContainerConfig::builder().image(&self.image).labels(labels);
        for port in &self.ports {
            builder = builder.publish(*port, &self.host_ip, *port);
        }
        builder.build()
    }

    pub fn cluster_init_command(&self) -> ExecConfig {
        ExecConfig::builder()
            .cmd(vec![
                "couchbase-cli".to_string(),
                "cluster-init".to_string(),
                "-c".to_string(),
                self.cluster_host.clone(),
                "--cluster-username".to_string(),
                self.username.clone(),
                "--cluster-password".to_string(),
                self.password.clone(),
                "--services".to_string(),
                self.services.clone(),
                "--cluster-ramsize".to_string(),
                self.cluster_ramsize_mb.to_string(),
                "--cluster-index-ramsize".to_string(),
                self.index_ramsize_mb.to_string(),
                "--cluster-eventing-ramsize".to_string(),
                self.eventing_ramsize_mb.to_string(),
                "--index-storage-setting".to_string(),
                self.index_storage.clone(),
            ])
            .tty(true)
            .build()
    }

    pub fn bucket_create_command(&self) -> ExecConfig {
        ExecConfig::builder()
            .cmd(vec![
                "couchbase-cli".to_string(),
                "bucket-create".to_string(),
                "-c".to_string(),
                self.cluster_host.clone(),
                "--username".to_string(),
                self.username.clone(),
                "--password".to_string(),
                self.password.clone(),
                "--bucket".to_string(),
                self.bucket.clone(),
                "--bucket-type".to_string(),
                self.bucket_type.clone(),
                "--bucket-ramsize".to_string(),
                self.bucket_ramsize_mb.to_string(),
            ])
            .tty(true)
            .build()
    }
}

/// Retry policies for the two waits of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Timeout of a single readiness request
    pub probe_timeout_secs: u64,
    /// Waiting for the recreated database to report running
    pub running: RetryPolicy,
    /// Waiting for the management endpoint to answer 200
    pub readiness: RetryPolicy,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 5,
            running: RetryPolicy::default(),
            readiness: RetryPolicy::http_readiness(),
        }
    }
}
