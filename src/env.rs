//! Environment constants and path utilities.
//!
//! Centralizes file names, directory names and environment variable names
//! used by configuration discovery.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".dock-bootstrap";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "dock-bootstrap.toml";

/// System-wide configuration directory (Unix-like systems)
pub const SYSTEM_CONFIG_DIR: &str = "/etc/dock-bootstrap";

/// Environment variables read by the CLI layer
pub mod vars {
    /// Engine endpoint, e.g. `unix:///var/run/docker.sock` or `tcp://host:2376`
    pub const DOCKER_HOST: &str = "DOCKER_HOST";

    /// Directory holding `ca.pem`, `cert.pem` and `key.pem`
    pub const DOCKER_CERT_PATH: &str = "DOCKER_CERT_PATH";

    /// Any non-empty value other than `0` enables TLS
    pub const DOCKER_TLS_VERIFY: &str = "DOCKER_TLS_VERIFY";

    pub const HOME: &str = "HOME";

    pub const USERPROFILE: &str = "USERPROFILE";
}

/// Build the `./dock-bootstrap.toml` path for a working directory
pub fn local_config_file_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE_NAME)
}

/// Build the `./.dock-bootstrap/config.toml` path for a working directory
pub fn local_app_config_file_path(dir: &Path) -> PathBuf {
    dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build the user configuration directory path
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(APP_DIR_NAME)
}

/// Build the user configuration file path
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the system configuration file path
pub fn system_config_file_path() -> PathBuf {
    Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME)
}
