//! Container image building and management.
//!
//! Builds images through the engine API from a local build context, which is
//! packed into an in-memory tar archive first.

use crate::container::{ContainerError, Engine, Resolved, Result, find_image, normalize_image_ref};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where and how to build an image that is not present locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageBuildSpec {
    /// Tag whose presence means no build is needed
    pub tag: String,
    /// Tag applied by the build
    pub build_tag: String,
    /// Build context directory
    pub context_dir: PathBuf,
    /// Dockerfile name, relative to the context
    pub dockerfile: String,
}

impl Default for ImageBuildSpec {
    fn default() -> Self {
        Self {
            tag: "my-kafka:latest".to_string(),
            build_tag: "my-kafka".to_string(),
            context_dir: PathBuf::from("docker"),
            dockerfile: "Dockerfile".to_string(),
        }
    }
}

/// Image builder for creating and fetching container images.
pub struct ImageBuilder {
    engine: Arc<dyn Engine>,
}

impl ImageBuilder {
    /// Create a new image builder.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Ensure `spec.tag` exists, building it if necessary.
    ///
    /// # Errors
    ///
    /// Returns error if the lookup fails, the build context is unusable, the
    /// build reports an error, or the tag is still missing afterwards.
    pub async fn ensure_image(&self, spec: &ImageBuildSpec) -> Result<Resolved> {
        if let Some(image) = find_image(self.engine.as_ref(), &spec.tag).await? {
            info!("Image already exists: {}", spec.tag);
            return Ok(Resolved::existing(image.id));
        }

        info!("Image {} not found, building...", spec.tag);
        self.build(spec).await?;

        match find_image(self.engine.as_ref(), &spec.tag).await? {
            Some(image) => Ok(Resolved::created(image.id)),
            None => Err(ContainerError::BuildError(format!(
                "build of {} finished but {} is not present",
                spec.build_tag, spec.tag
            ))),
        }
    }

    /// Build an image from its context directory.
    ///
    /// # Errors
    ///
    /// Returns error if the context cannot be packed or the build fails.
    pub async fn build(&self, spec: &ImageBuildSpec) -> Result<()> {
        let context_dir = spec.context_dir.clone();
        let dockerfile = spec.dockerfile.clone();
        let context = tokio::task::spawn_blocking(move || tar_context(&context_dir, &dockerfile))
            .await
            .map_err(|e| ContainerError::Other(format!("Build context task failed: {}", e)))??;

        debug!(
            "Packed build context {:?} ({} bytes)",
            spec.context_dir,
            context.len()
        );

        let mut stream = self
            .engine
            .build_image(&spec.dockerfile, &spec.build_tag, context);

        while let Some(progress) = stream.next().await {
            let progress = progress?;
            if let Some(error) = progress.error {
                return Err(ContainerError::BuildError(format!(
                    "{}: {}",
                    spec.build_tag, error
                )));
            }
            if let Some(message) = progress.message {
                let message = message.trim();
                if !message.is_empty() {
                    debug!("Build: {}", message);
                }
            }
        }

        info!("Successfully built image: {}", spec.build_tag);
        Ok(())
    }

    /// Pull `image` unless it is already present.
    ///
    /// # Errors
    ///
    /// Returns error if the lookup or the pull fails.
    pub async fn ensure_pulled(&self, image: &str) -> Result<()> {
        let tag = normalize_image_ref(image);
        if find_image(self.engine.as_ref(), &tag).await?.is_some() {
            debug!("Image {} already exists locally", tag);
            return Ok(());
        }

        info!("Pulling image: {}", tag);
        match self.engine.pull_image(&tag).await {
            Ok(()) => {
                info!("Successfully pulled image: {}", tag);
                Ok(())
            }
            Err(e) => {
                warn!("Pull of {} failed: {}", tag, e);
                Err(e)
            }
        }
    }
}

/// Pack `dir` into an uncompressed tar archive rooted at the context.
///
/// # Errors
///
/// Returns error if the directory or the Dockerfile inside it is missing, or
/// reading fails.
pub fn tar_context(dir: &Path, dockerfile: &str) -> Result<Vec<u8>> {
    if !dir.is_dir() {
        return Err(ContainerError::ConfigError(format!(
            "Build context {:?} is not a directory",
            dir
        )));
    }
    if !dir.join(dockerfile).is_file() {
        return Err(ContainerError::ConfigError(format!(
            "Dockerfile {} not found in build context {:?}",
            dockerfile, dir
        )));
    }

    let mut archive = tar::Builder::new(Vec::new());
    archive.follow_symlinks(false);
    archive.append_dir_all(".", dir)?;
    Ok(archive.into_inner()?)
}
