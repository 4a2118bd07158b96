//! The engine seam.
//!
//! [`Engine`] is the narrow slice of the container engine API this tool uses.
//! [`ContainerClient`](crate::container::ContainerClient) implements it over
//! bollard; tests implement it in memory. Responses are flattened into the
//! plain records below so callers never deal with optional API fields.

use crate::container::Result;
use async_trait::async_trait;
use bollard::models::{ContainerCreateBody, ExecConfig as ExecRequest, NetworkCreateRequest};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;

/// Progress messages of an image build. The stream may borrow the engine.
pub type BuildStream<'a> = Pin<Box<dyn Stream<Item = Result<BuildProgress>> + Send + 'a>>;

/// Raw output chunks of an attached exec session, in arrival order.
pub type ExecStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Engine event notifications. `Err` items are the engine's error channel.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EngineEvent>> + Send>>;

#[async_trait]
pub trait Engine: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn list_networks(&self) -> Result<Vec<NetworkInfo>>;

    /// Returns the id of the new network.
    async fn create_network(&self, request: NetworkCreateRequest) -> Result<String>;

    /// Lists all images, intermediate layers included.
    async fn list_images(&self) -> Result<Vec<ImageInfo>>;

    /// Builds `tag` from an uncompressed tar of the build context.
    fn build_image(&self, dockerfile: &str, tag: &str, context: Vec<u8>) -> BuildStream<'_>;

    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Lists all containers, stopped ones included.
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// Returns the id of the new container.
    async fn create_container(&self, name: &str, body: ContainerCreateBody) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    async fn stop_container(&self, id: &str, grace_secs: u32) -> Result<()>;

    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Returns the id of the new exec instance.
    async fn create_exec(&self, container_id: &str, request: ExecRequest) -> Result<String>;

    /// Starts an exec instance attached and hands back its output.
    async fn start_exec(&self, exec_id: &str) -> Result<ExecStream>;

    /// Exit code of a finished exec instance, if the engine reports one.
    async fn exec_exit_code(&self, exec_id: &str) -> Result<Option<i64>>;

    fn events(&self) -> EventStream;
}

/// Network information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkInfo {
    /// Network ID
    pub id: String,
    /// Network name
    pub name: String,
    /// Network driver
    pub driver: String,
}

/// Image information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    /// Image ID
    pub id: String,
    /// Repository tags
    pub repo_tags: Vec<String>,
    /// Size in bytes
    pub size: i64,
    /// Creation timestamp
    pub created: i64,
}

/// Container summary information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    /// Container ID
    pub id: String,
    /// Container names, each with the engine's leading `/`
    pub names: Vec<String>,
    /// Image name
    pub image: String,
    /// Machine-readable state (`running`, `exited`, ...)
    pub state: String,
    /// Human-readable status (`Up 5 seconds`, ...)
    pub status: String,
}

/// One message from an image build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProgress {
    pub message: Option<String>,
    pub error: Option<String>,
}

/// One engine event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineEvent {
    /// Object type (`container`, `network`, `image`, ...)
    pub kind: String,
    pub action: String,
    pub actor_id: String,
    /// The actor's `name` attribute, when present
    pub actor_name: Option<String>,
    /// Unix timestamp in seconds
    pub time: i64,
}
