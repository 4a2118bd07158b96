//! Command line argument parsing
//!
//! Subcommands:
//! - `inventory`: List networks, images and containers
//! - `provision`: Run the provisioning sequence
//! - `run`: Inventory, then provision (the default)
//! - `show-config`: Print the effective configuration and where it came from
//! - `init-config`: Write the default configuration to the user config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dock-bootstrap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Inventory a container engine and provision a broker, coordinator and database stack"
)]
#[command(long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Engine endpoint, overriding configuration and DOCKER_HOST
    #[arg(long = "host", global = true)]
    pub host: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// List networks, images (intermediate included) and containers (stopped included)
    Inventory {
        /// Print the listings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build, create and start the stack, then recreate and initialize the database
    Provision {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inventory followed by provision
    Run,
    /// Show the effective configuration and the discovery hierarchy
    ShowConfig,
    /// Write the default configuration to ~/.dock-bootstrap/config.toml
    InitConfig,
}

impl Args {
    /// The subcommand to execute, `run` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Default tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "dock_bootstrap=debug"
        } else {
            "dock_bootstrap=info"
        }
    }
}
