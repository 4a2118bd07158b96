//! # dock-bootstrap
//!
//! Drives a Docker/Podman engine API to inventory what the engine holds and
//! to stand up a small messaging and database stack.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: engine access (connection, listings, lookups, networks,
//!   images, containers, exec, events) behind the [`container::Engine`] trait
//! - **[`readiness`]**: deadline-bounded retry policy and the HTTP readiness probe
//! - **[`provision`]**: the ordered provisioning sequence and its configuration
//! - **[`cli`]**: argument parsing and configuration discovery
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dock_bootstrap::container::ContainerClient;
//! use dock_bootstrap::provision::{Provisioner, StackConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StackConfig::default();
//!     let client = ContainerClient::connect(&config.engine).await?;
//!
//!     let report = Provisioner::new(Arc::new(client), config).run().await?;
//!     println!("Database container: {}", report.database.id);
//!     Ok(())
//! }
//! ```

/// Container engine access layer.
pub mod container;

/// Bounded waits: retry policy and HTTP readiness probe.
pub mod readiness;

/// The provisioning sequence and its configuration.
pub mod provision;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use container::{ContainerClient, ContainerError, EngineConfig, Inventory};
pub use provision::{ProvisionReport, Provisioner, StackConfig};
pub use readiness::{HttpProbe, RetryPolicy};
