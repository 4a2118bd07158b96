//! Container lifecycle management.
//!
//! Resolve-or-create by exact name, start, stop, remove, and waiting for a
//! container to reach the running state.

use crate::container::{
    ContainerConfig, ContainerError, ContainerInfo, Engine, ImageBuilder, Resolved, Result,
    find_container,
};
use crate::readiness::RetryPolicy;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Container state as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown(String),
}

impl ContainerState {
    /// Parse the engine's state string.
    pub fn parse(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown(state.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown(state) => write!(f, "{}", state),
        }
    }
}

/// Container manager over an [`Engine`].
pub struct ContainerManager {
    engine: Arc<dyn Engine>,
    images: ImageBuilder,
    auto_pull: bool,
}

impl ContainerManager {
    /// Create a new container manager. Missing images are pulled before create.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            images: ImageBuilder::new(engine.clone()),
            engine,
            auto_pull: true,
        }
    }

    /// Enable or disable pulling of missing images before create.
    pub fn with_auto_pull(mut self, auto_pull: bool) -> Self {
        self.auto_pull = auto_pull;
        self
    }

    /// Return the id of the container named `name`, creating it from `config`
    /// if no container has that exact name.
    ///
    /// # Errors
    ///
    /// Returns error if the lookup, the pull or the create fails.
    pub async fn resolve_or_create(&self, name: &str, config: &ContainerConfig) -> Result<Resolved> {
        if let Some(existing) = find_container(self.engine.as_ref(), name).await? {
            info!(
                "Container {} already exists ({}, {})",
                name, existing.id, existing.state
            );
            return Ok(Resolved::existing(existing.id));
        }

        if self.auto_pull {
            self.images.ensure_pulled(config.image()).await?;
        }

        debug!("Creating container {} from {}", name, config.image());
        let id = self
            .engine
            .create_container(name, config.to_create_body())
            .await?;
        info!("Created container: {} ({})", name, id);

        Ok(Resolved::created(id))
    }

    /// Start a container.
    ///
    /// # Errors
    ///
    /// Returns error if the engine rejects the start.
    pub async fn start(&self, id: &str) -> Result<()> {
        self.engine.start_container(id).await?;
        info!("Started container: {}", id);
        Ok(())
    }

    /// Stop a container, giving it `grace_secs` before it is killed.
    ///
    /// # Errors
    ///
    /// Returns error if the engine rejects the stop.
    pub async fn stop(&self, id: &str, grace_secs: u32) -> Result<()> {
        debug!("Stopping container {} ({}s grace)", id, grace_secs);
        self.engine.stop_container(id, grace_secs).await?;
        info!("Stopped container: {}", id);
        Ok(())
    }

    /// Remove a stopped container.
    ///
    /// # Errors
    ///
    /// Returns error if the engine rejects the removal.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.engine.remove_container(id).await?;
        info!("Removed container: {}", id);
        Ok(())
    }

    /// Look up a container by exact name.
    ///
    /// # Errors
    ///
    /// Returns error if the listing fails.
    pub async fn find(&self, name: &str) -> Result<Option<ContainerInfo>> {
        find_container(self.engine.as_ref(), name).await
    }

    /// Current state of the container named `name`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns error if the listing fails.
    pub async fn state(&self, name: &str) -> Result<Option<ContainerState>> {
        Ok(self
            .find(name)
            .await?
            .map(|container| ContainerState::parse(&container.state)))
    }

    /// Poll until the container named `name` is running.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] if the container disappears,
    /// [`ContainerError::Timeout`] if it is still not running when `policy`
    /// is exhausted.
    pub async fn wait_running(&self, name: &str, policy: &RetryPolicy) -> Result<ContainerInfo> {
        let what = format!("container {} to be running", name);
        policy
            .poll(&what, |attempt| async move {
                let container = self.find(name).await?.ok_or_else(|| {
                    ContainerError::NotFound(format!("Container {} disappeared", name))
                })?;
                let state = ContainerState::parse(&container.state);
                info!(
                    "Container {} is {} ({}), attempt {}",
                    name, state, container.status, attempt
                );
                Ok(state.is_running().then_some(container))
            })
            .await
    }
}
