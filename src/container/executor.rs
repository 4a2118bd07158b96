//! Container command execution.
//!
//! Runs a command inside a running container over an exec session and
//! collects its whole output stream.

use crate::container::{ContainerError, Engine, Result};
use bollard::models::ExecConfig as ExecRequest;
use futures::stream::StreamExt;
use std::borrow::Cow;
use tracing::debug;

/// Execution configuration builder.
pub struct ExecConfigBuilder {
    cmd: Vec<String>,
    tty: bool,
}

impl Default for ExecConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecConfigBuilder {
    /// Create a new execution configuration builder.
    pub fn new() -> Self {
        Self {
            cmd: Vec::new(),
            tty: false,
        }
    }

    /// Set the command to execute.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Enable TTY allocation.
    pub fn tty(mut self, enable: bool) -> Self {
        self.tty = enable;
        self
    }

    /// Build the execution configuration.
    pub fn build(self) -> ExecConfig {
        ExecConfig {
            cmd: self.cmd,
            tty: self.tty,
        }
    }
}

/// Container execution configuration.
///
/// Output is always attached on stdout and stderr; stdin never is.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    cmd: Vec<String>,
    tty: bool,
}

impl ExecConfig {
    /// Create a new execution configuration builder.
    pub fn builder() -> ExecConfigBuilder {
        ExecConfigBuilder::new()
    }

    /// Get the command.
    pub fn cmd(&self) -> &[String] {
        &self.cmd
    }

    /// The command as a shell-escaped line, for logs.
    pub fn display_cmd(&self) -> String {
        self.cmd
            .iter()
            .map(|arg| shell_escape::escape(Cow::Borrowed(arg.as_str())).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_request(&self) -> ExecRequest {
        ExecRequest {
            cmd: Some(self.cmd.clone()),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(self.tty),
            ..Default::default()
        }
    }
}

/// Output from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exec instance ID
    pub exec_id: String,
    /// Everything the command wrote, chunks concatenated in arrival order
    pub output: Vec<u8>,
    /// Exit code (None if not available)
    pub exit_code: Option<i64>,
}

impl ExecOutput {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Output decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Execute a command in a running container.
///
/// Creates the exec instance, starts it attached, drains the output stream to
/// the end and then asks the engine for the exit code.
///
/// # Errors
///
/// Returns error if any stage fails: create, start/attach, reading the
/// stream, or the final inspect.
pub async fn execute(
    engine: &dyn Engine,
    container_id: &str,
    config: &ExecConfig,
) -> Result<ExecOutput> {
    if config.cmd.is_empty() {
        return Err(ContainerError::ConfigError(
            "Exec command must not be empty".to_string(),
        ));
    }

    debug!(
        "Executing command in container {}: {}",
        container_id,
        config.display_cmd()
    );

    let exec_id = engine.create_exec(container_id, config.to_request()).await?;
    let mut stream = engine.start_exec(&exec_id).await?;

    let mut output = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            ContainerError::ExecutionError(format!("Failed to read output of {}: {}", exec_id, e))
        })?;
        output.extend_from_slice(&chunk);
    }
    drop(stream);

    let exit_code = engine.exec_exit_code(&exec_id).await?;
    debug!(
        "Exec {} finished with exit code {:?} ({} bytes of output)",
        exec_id,
        exit_code,
        output.len()
    );

    Ok(ExecOutput {
        exec_id,
        output,
        exit_code,
    })
}
