//! Docker command builder.
//!
//! Every Docker call goes through [`DockerCommand`] so the daemon endpoint,
//! registry credentials and error wrapping are applied the same way.

use std::ffi::OsString;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::debug;
use vm_core::command_stream::{describe, stream_command, CommandOutput};
use vm_core::error::{Result, VmError};

/// Builder for Docker commands with a fluent interface.
#[derive(Debug, Clone)]
pub struct DockerCommand {
    host: Option<String>,
    config_dir: Option<PathBuf>,
    subcommand: Option<String>,
    args: Vec<OsString>,
}

impl DockerCommand {
    /// `host` is a `-H` endpoint such as `unix:///var/run/docker.sock`.
    pub fn new(host: Option<&str>) -> Self {
        Self {
            host: host.map(str::to_string),
            config_dir: None,
            subcommand: None,
            args: Vec::new(),
        }
    }

    /// Set the Docker subcommand (e.g., "create", "inspect").
    pub fn subcommand<S: Into<String>>(mut self, cmd: S) -> Self {
        self.subcommand = Some(cmd.into());
        self
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Point the client at a different `config.json` directory (registry auth).
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Command {
        let mut cmd = Command::new("docker");
        if let Some(dir) = self.config_dir {
            cmd.env("DOCKER_CONFIG", dir);
        }
        if let Some(host) = self.host {
            cmd.arg("-H").arg(host);
        }
        if let Some(subcmd) = self.subcommand {
            cmd.arg(subcmd);
        }
        cmd.args(self.args);
        cmd
    }

    /// Run and return the exit status and output without judging them.
    pub async fn execute_raw(self) -> Result<CommandOutput> {
        let cmd = self.build();
        stream_command(cmd, |line| debug!("docker: {}", line)).await
    }

    /// Run and return trimmed stdout; a non-zero exit is an error.
    pub async fn execute_with_output(self) -> Result<String> {
        let cmd = self.build();
        let full_command = describe(&cmd);
        let output = stream_command(cmd, |line| debug!("docker: {}", line))
            .await
            .map_err(docker_missing)?
            .into_result(&full_command)?;
        Ok(output.stdout.trim().to_string())
    }

    /// Run, handing each output line to `on_line`.
    pub async fn execute_streaming<F>(self, on_line: F) -> Result<()>
    where
        F: FnMut(&str) + Send,
    {
        let cmd = self.build();
        let full_command = describe(&cmd);
        stream_command(cmd, on_line)
            .await
            .map_err(docker_missing)?
            .into_result(&full_command)
            .map(|_| ())
    }
}

fn docker_missing(err: VmError) -> VmError {
    match err {
        VmError::Dependency(_) => VmError::Dependency("Docker CLI not found in PATH".into()),
        other => other,
    }
}

/// True when Docker reported that the named object does not exist.
pub fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container")
        || lower.contains("no such object")
        || lower.contains("no such image")
}
