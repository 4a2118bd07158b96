//! Read-only listings of networks, images and containers.

use crate::container::{ContainerInfo, Engine, ImageInfo, NetworkInfo, Result};
use serde::Serialize;
use std::fmt::Write;
use tracing::debug;

/// Snapshot of what the engine currently holds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub networks: Vec<NetworkInfo>,
    /// Intermediate images included
    pub images: Vec<ImageInfo>,
    /// Stopped containers included
    pub containers: Vec<ContainerInfo>,
}

impl Inventory {
    /// Fetch all three listings.
    ///
    /// # Errors
    ///
    /// Returns the first listing error; no partial inventory is returned.
    pub async fn collect(engine: &dyn Engine) -> Result<Self> {
        let networks = engine.list_networks().await?;
        let images = engine.list_images().await?;
        let containers = engine.list_containers().await?;

        debug!(
            "Inventory: {} networks, {} images, {} containers",
            networks.len(),
            images.len(),
            containers.len()
        );

        Ok(Self {
            networks,
            images,
            containers,
        })
    }

    /// Render an indexed, human-readable listing.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Networks ({}):", self.networks.len());
        for (i, network) in self.networks.iter().enumerate() {
            let _ = writeln!(
                out,
                "{} | {} | {} | {}",
                i,
                network.name,
                short_id(&network.id),
                network.driver
            );
        }

        let _ = writeln!(out, "Images ({}):", self.images.len());
        for (i, image) in self.images.iter().enumerate() {
            let tags = if image.repo_tags.is_empty() {
                "<none>".to_string()
            } else {
                image.repo_tags.join(", ")
            };
            let _ = writeln!(out, "{} | {} | {}", i, short_id(&image.id), tags);
        }

        let _ = writeln!(out, "Containers ({}):", self.containers.len());
        for (i, container) in self.containers.iter().enumerate() {
            let _ = writeln!(
                out,
                "{} | {} | {} | {} | {}",
                i,
                short_id(&container.id),
                container.image,
                container.state,
                container.names.join(", ")
            );
        }

        out
    }
}

/// First 12 hex digits of an id, `sha256:` prefix dropped.
fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.get(..12).unwrap_or(id)
}
