//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Explicit `--config` path
//! 2. Current directory: ./dock-bootstrap.toml or ./.dock-bootstrap/config.toml
//! 3. User config: ~/.dock-bootstrap/config.toml
//! 4. System config: /etc/dock-bootstrap/config.toml
//! 5. Built-in defaults
//!
//! Engine settings are then overlaid from `DOCKER_HOST`, `DOCKER_CERT_PATH`
//! and `DOCKER_TLS_VERIFY`.

use crate::container::{ContainerError, EngineConfig, Result, TlsConfig};
use crate::env::{self, vars};
use crate::provision::StackConfig;
use std::env as std_env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where the effective configuration was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Discovered(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(path) => write!(f, "{} (--config)", path.display()),
            Self::Discovered(path) => write!(f, "{}", path.display()),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load configuration from `explicit` if given, else from the first file
    /// found in the discovery hierarchy, else defaults.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit file is missing, or the chosen file cannot
    /// be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<(StackConfig, ConfigSource)> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ContainerError::ConfigError(format!(
                    "Configuration file {} does not exist",
                    path.display()
                )));
            }
            info!("Loading configuration override from: {:?}", path);
            let config = StackConfig::from_toml_file(path)?;
            return Ok((config, ConfigSource::Explicit(path.to_path_buf())));
        }

        if let Some(path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", path);
            let config = StackConfig::from_toml_file(&path)?;
            return Ok((config, ConfigSource::Discovered(path)));
        }

        info!("No configuration file found, using defaults");
        Ok((StackConfig::default(), ConfigSource::Defaults))
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::local_config_file_path(&current_dir));
            candidates.push(env::local_app_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(env::system_config_file_path());

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var(vars::HOME)
            .ok()
            .or_else(|| std_env::var(vars::USERPROFILE).ok())
            .map(PathBuf::from)
    }

    /// Overlay engine settings from the process environment.
    pub fn apply_env(engine: &mut EngineConfig) {
        Self::apply_env_from(engine, |name| std_env::var(name).ok());
    }

    /// Overlay engine settings from `lookup`.
    ///
    /// A non-empty `DOCKER_HOST` replaces the configured host. TLS material is
    /// taken from `DOCKER_CERT_PATH` only when `DOCKER_TLS_VERIFY` is set.
    pub fn apply_env_from<F>(engine: &mut EngineConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(host) = get(vars::DOCKER_HOST) {
            debug!("Engine host from {}: {}", vars::DOCKER_HOST, host);
            engine.host = Some(host);
        }

        let verify = get(vars::DOCKER_TLS_VERIFY).is_some_and(|value| value != "0");
        match (verify, get(vars::DOCKER_CERT_PATH)) {
            (true, Some(dir)) => {
                debug!("Engine TLS material from {}", dir);
                engine.tls = Some(TlsConfig::from_cert_dir(Path::new(&dir)));
            }
            (true, None) => warn!(
                "{} is set but {} is not, keeping configured TLS settings",
                vars::DOCKER_TLS_VERIFY,
                vars::DOCKER_CERT_PATH
            ),
            (false, _) => {}
        }
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().ok_or_else(|| {
            ContainerError::ConfigError("Could not determine home directory".to_string())
        })?;
        Self::create_default_config_in(&home_dir)
    }

    /// Write the default configuration under `home_dir`, leaving an existing
    /// file untouched.
    pub fn create_default_config_in(home_dir: &Path) -> Result<PathBuf> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            StackConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info(active: &ConfigSource) {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "EXISTS"
                } else {
                    "NOT A FILE"
                }
            } else {
                "NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        println!("Active configuration: {}", active);
    }
}
