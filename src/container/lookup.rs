//! Exact-match resource lookups.
//!
//! Every lookup fetches the full listing and scans it linearly. Nothing is
//! cached; each call reflects the engine's state at that moment.

use crate::container::{ContainerInfo, Engine, ImageInfo, NetworkInfo, Result};
use tracing::debug;

/// Find the image carrying exactly `tag` (e.g. `my-kafka:latest`).
///
/// # Errors
///
/// Returns error if the image listing fails.
pub async fn find_image(engine: &dyn Engine, tag: &str) -> Result<Option<ImageInfo>> {
    let found = engine
        .list_images()
        .await?
        .into_iter()
        .find(|image| image.repo_tags.iter().any(|t| t == tag));

    if let Some(image) = &found {
        debug!("Found image {} ({})", tag, image.id);
    }
    Ok(found)
}

/// Find a container by exact name.
///
/// The engine reports names with a leading `/`; a bare `name` is matched as
/// `/name`.
///
/// # Errors
///
/// Returns error if the container listing fails.
pub async fn find_container(engine: &dyn Engine, name: &str) -> Result<Option<ContainerInfo>> {
    let wanted = normalize_container_name(name);
    let found = engine
        .list_containers()
        .await?
        .into_iter()
        .find(|container| container.names.iter().any(|n| *n == wanted));

    if let Some(container) = &found {
        debug!("Found container {} ({})", wanted, container.id);
    }
    Ok(found)
}

/// Find a network by exact name.
///
/// # Errors
///
/// Returns error if the network listing fails.
pub async fn find_network(engine: &dyn Engine, name: &str) -> Result<Option<NetworkInfo>> {
    Ok(engine
        .list_networks()
        .await?
        .into_iter()
        .find(|network| network.name == name))
}

/// Add the implicit `:latest` tag to an image reference that has neither a
/// tag nor a digest. A `:` inside a registry host (`host:5000/app`) is not a tag.
pub fn normalize_image_ref(image: &str) -> String {
    let name = image.rsplit('/').next().unwrap_or(image);
    if name.contains(':') || name.contains('@') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

/// Prefix a bare container name with the engine's `/`.
pub fn normalize_container_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}
