//! Docker/Podman client wrapper.
//!
//! Connects to the engine from an explicit [`EngineConfig`] and implements the
//! [`Engine`] seam over the bollard API.

use crate::container::engine::{
    BuildProgress, ContainerInfo, EngineEvent, ImageInfo, NetworkInfo,
};
use crate::container::{BuildStream, ContainerError, Engine, EventStream, ExecStream, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::StartExecResults;
use bollard::models::{
    BuildInfo, ContainerCreateBody, ContainerSummary, EventMessage, ExecConfig as ExecRequest,
    ImageSummary, Network, NetworkCreateRequest,
};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptionsBuilder, CreateImageOptionsBuilder,
    EventsOptions, ListContainersOptionsBuilder, ListImagesOptionsBuilder, ListNetworksOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptionsBuilder,
};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Engine connection settings.
///
/// `host` follows the `DOCKER_HOST` conventions (`unix://`, `npipe://`,
/// `tcp://`, `http://`). With no host the platform's local socket is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub host: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub tls: Option<TlsConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: 120,
            tls: None,
        }
    }
}

/// Client certificate material for a TLS-protected engine endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl TlsConfig {
    /// Uses the `ca.pem`/`cert.pem`/`key.pem` layout of `DOCKER_CERT_PATH`.
    pub fn from_cert_dir(dir: &Path) -> Self {
        Self {
            ca: dir.join("ca.pem"),
            cert: dir.join("cert.pem"),
            key: dir.join("key.pem"),
        }
    }
}

/// Docker/Podman API client wrapper.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
}

impl ContainerClient {
    /// Connect to the engine described by `config` and verify it answers.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Connection`] if the endpoint cannot be opened
    /// or does not answer a ping.
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        let docker = Self::open(config)?;
        let client = Self {
            docker: Arc::new(docker),
        };

        client.ping().await.map_err(|e| {
            ContainerError::Connection(format!("{} did not answer: {}", endpoint(config), e))
        })?;

        match client.docker.version().await {
            Ok(version) => info!(
                "Connected to container engine at {} (version {}, API {})",
                endpoint(config),
                version.version.unwrap_or_default(),
                version.api_version.unwrap_or_default()
            ),
            Err(e) => debug!("Engine version query failed: {}", e),
        }

        Ok(client)
    }

    fn open(config: &EngineConfig) -> Result<Docker> {
        let timeout = config.timeout_secs;
        let version = bollard::API_DEFAULT_VERSION;

        let docker = match (config.host.as_deref(), config.tls.as_ref()) {
            (None, _) => {
                debug!("Connecting to container engine via local defaults");
                Docker::connect_with_local_defaults()
                    .map(|docker| docker.with_timeout(Duration::from_secs(timeout)))
            }
            (Some(host), _) if host.starts_with("unix://") || host.starts_with("npipe://") => {
                debug!("Connecting to container engine socket {}", host);
                Docker::connect_with_socket(host, timeout, version)
            }
            (Some(host), Some(tls)) => {
                debug!("Connecting to container engine {} over TLS", host);
                Docker::connect_with_ssl(host, &tls.key, &tls.cert, &tls.ca, timeout, version)
            }
            (Some(host), None) => {
                debug!("Connecting to container engine {} over HTTP", host);
                Docker::connect_with_http(host, timeout, version)
            }
        };

        docker.map_err(|e| ContainerError::Connection(format!("{}: {}", endpoint(config), e)))
    }

    /// Get the underlying Docker client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

fn endpoint(config: &EngineConfig) -> &str {
    config.host.as_deref().unwrap_or("local default socket")
}

#[async_trait]
impl Engine for ContainerClient {
    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        debug!("Container engine ping successful");
        Ok(())
    }

    async fn list_networks(&self) -> Result<Vec<NetworkInfo>> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions>)
            .await?;

        Ok(networks.into_iter().map(network_info).collect())
    }

    async fn create_network(&self, request: NetworkCreateRequest) -> Result<String> {
        let response = self.docker.create_network(request).await?;
        Ok(response.id)
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        let options = ListImagesOptionsBuilder::default().all(true).build();
        let images = self.docker.list_images(Some(options)).await?;

        Ok(images.into_iter().map(image_info).collect())
    }

    fn build_image(&self, dockerfile: &str, tag: &str, context: Vec<u8>) -> BuildStream<'_> {
        let options = BuildImageOptionsBuilder::default()
            .dockerfile(dockerfile)
            .t(tag)
            .rm(true)
            .build();

        Box::pin(
            self.docker
                .build_image(options, None, Some(bollard::body_full(context.into())))
                .map(|item| item.map(build_progress).map_err(ContainerError::from)),
        )
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let options = CreateImageOptionsBuilder::default()
            .from_image(image)
            .build();
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            let info = result?;
            if let Some(status) = info.status {
                debug!("Pull status: {}", status);
            }
            if let Some(progress) = info.progress {
                debug!("Pull progress: {}", progress);
            }
        }

        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptionsBuilder::default().all(true).build();
        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers.into_iter().map(container_info).collect())
    }

    async fn create_container(&self, name: &str, body: ContainerCreateBody) -> Result<String> {
        let options = CreateContainerOptionsBuilder::default().name(name).build();
        let response = self.docker.create_container(Some(options), body).await?;
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace_secs: u32) -> Result<()> {
        let grace = i32::try_from(grace_secs).unwrap_or(i32::MAX);
        let options = StopContainerOptionsBuilder::default().t(grace).build();
        self.docker.stop_container(id, Some(options)).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(id, None::<RemoveContainerOptions>)
            .await?;
        Ok(())
    }

    async fn create_exec(&self, container_id: &str, request: ExecRequest) -> Result<String> {
        let exec = self.docker.create_exec(container_id, request).await?;
        Ok(exec.id)
    }

    async fn start_exec(&self, exec_id: &str) -> Result<ExecStream> {
        match self.docker.start_exec(exec_id, None).await? {
            StartExecResults::Attached { output, .. } => Ok(Box::pin(output.map(|item| {
                item.map(|log| log.into_bytes().to_vec())
                    .map_err(ContainerError::from)
            }))),
            StartExecResults::Detached => Err(ContainerError::ExecutionError(format!(
                "exec {} started detached, no output to attach to",
                exec_id
            ))),
        }
    }

    async fn exec_exit_code(&self, exec_id: &str) -> Result<Option<i64>> {
        let inspect = self.docker.inspect_exec(exec_id).await?;
        Ok(inspect.exit_code)
    }

    fn events(&self) -> EventStream {
        Box::pin(
            self.docker
                .events(None::<EventsOptions>)
                .map(|item| item.map(engine_event).map_err(ContainerError::from)),
        )
    }
}

fn network_info(network: Network) -> NetworkInfo {
    NetworkInfo {
        id: network.id.unwrap_or_default(),
        name: network.name.unwrap_or_default(),
        driver: network.driver.unwrap_or_default(),
    }
}

fn image_info(image: ImageSummary) -> ImageInfo {
    ImageInfo {
        id: image.id,
        repo_tags: image.repo_tags,
        size: image.size,
        created: image.created,
    }
}

fn container_info(container: ContainerSummary) -> ContainerInfo {
    ContainerInfo {
        id: container.id.unwrap_or_default(),
        names: container.names.unwrap_or_default(),
        image: container.image.unwrap_or_default(),
        state: container
            .state
            .map(|s| s.to_string())
            .unwrap_or_default(),
        status: container.status.unwrap_or_default(),
    }
}

fn build_progress(info: BuildInfo) -> BuildProgress {
    BuildProgress {
        message: info.stream.or(info.status),
        error: info.error_detail.and_then(|detail| detail.message),
    }
}

fn engine_event(event: EventMessage) -> EngineEvent {
    let (actor_id, actor_name) = event
        .actor
        .map(|actor| {
            let name = actor
                .attributes
                .and_then(|mut attributes| attributes.remove("name"));
            (actor.id.unwrap_or_default(), name)
        })
        .unwrap_or_default();

    EngineEvent {
        kind: event.typ.map(|t| t.to_string()).unwrap_or_default(),
        action: event.action.unwrap_or_default(),
        actor_id,
        actor_name,
        time: event.time.unwrap_or_default(),
    }
}
