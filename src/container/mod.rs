//! Container engine access layer.
//!
//! Everything that talks to the Docker/Podman daemon lives here. The rest of
//! the crate only sees the [`Engine`] trait, which keeps the provisioning
//! sequence testable against an in-memory engine.
//!
//! ## Architecture
//!
//! - `client`: bollard-backed engine client built from an explicit [`EngineConfig`]
//! - `engine`: the [`Engine`] seam and its stream aliases
//! - `inventory`: read-only listings of networks, images and containers
//! - `lookup`: exact-match resource lookups over full listings
//! - `network`: bridge network creation with IPAM
//! - `image`: image builds from a local build context
//! - `config`: container create-request builder
//! - `manager`: resolve-or-create, start, stop, remove and state polling
//! - `executor`: command execution inside running containers
//! - `monitor`: background engine event drain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dock_bootstrap::container::{ContainerClient, EngineConfig, Inventory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ContainerClient::connect(&EngineConfig::default()).await?;
//!     let inventory = Inventory::collect(&client).await?;
//!     print!("{}", inventory.render());
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod engine;
mod executor;
mod image;
mod inventory;
mod lookup;
mod manager;
mod monitor;
mod network;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ContainerClient, EngineConfig, TlsConfig};
pub use config::{ContainerConfig, ContainerConfigBuilder};
pub use engine::{
    BuildProgress, BuildStream, ContainerInfo, Engine, EngineEvent, EventStream, ExecStream,
    ImageInfo, NetworkInfo,
};
pub use executor::{ExecConfig, ExecConfigBuilder, ExecOutput, execute};
pub use image::{ImageBuildSpec, ImageBuilder};
pub use inventory::Inventory;
pub use lookup::{
    find_container, find_image, find_network, normalize_container_name, normalize_image_ref,
};
pub use manager::{ContainerManager, ContainerState};
pub use monitor::EventMonitor;
pub use network::{NetworkConfig, NetworkManager};

/// Label attached to every resource created by a provisioning run.
pub const RUN_LABEL: &str = "dock-bootstrap.run";

/// Outcome of an ensure/resolve-or-create step.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Resolved {
    /// Engine id of the resource
    pub id: String,
    /// Whether this run created it
    pub created: bool,
}

impl Resolved {
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created: false,
        }
    }

    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created: true,
        }
    }
}

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Could not reach the engine daemon
    #[error("Failed to connect to container engine: {0}")]
    Connection(String),

    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    /// Required resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Command execution error
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Image build error
    #[error("Image build error: {0}")]
    BuildError(String),

    /// A wait exhausted its retry policy
    #[error("Timed out waiting for {what} after {attempts} attempts ({waited:?})")]
    Timeout {
        what: String,
        attempts: u32,
        waited: std::time::Duration,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// General error
    #[error("Container error: {0}")]
    Other(String),
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
