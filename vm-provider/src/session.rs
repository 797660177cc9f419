//! Command execution channels.
//!
//! [`LocalShell`] runs commands with `sh -c` on this machine. [`SshSession`]
//! drives the system OpenSSH client as a control master: one authenticated
//! connection, one short-lived `ssh -S` process per command, `-O exit` on
//! close. Password logins go through `sshpass -e` so the password never
//! appears on a command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use duct::cmd;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};
use vm_core::command_stream::{describe, is_tool_installed, stream_command};
use vm_core::error::{Result, VmError};

use crate::log_sink::WorkspaceLog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshAuth {
    Password(String),
    PrivateKey(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    pub connect_timeout: Duration,
}

impl SshTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    Local,
    Ssh(SshTarget),
}

/// An open command channel. Callers close it on every exit path; dropping
/// an unclosed session releases it as a fallback.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run `command` to completion, streaming its output to `log` if given.
    /// A non-zero exit is a `VmError::Command`.
    async fn execute(&self, command: &str, log: Option<&WorkspaceLog>) -> Result<()>;

    /// Expose a Unix socket of the far side at `local`.
    async fn forward_socket(&self, local: &Path, remote: &Path) -> Result<()> {
        let _ = (local, remote);
        Err(VmError::Connectivity(
            "socket forwarding is not supported by this session".into(),
        ))
    }

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn RemoteSession>>;
}

async fn run_streamed(command: Command, log: Option<&WorkspaceLog>) -> Result<()> {
    let full_command = describe(&command);
    let output = stream_command(command, |line| match log {
        Some(log) => log.line(line),
        None => debug!("{}", line),
    })
    .await?;
    output.into_result(&full_command).map(|_| ())
}

/// Runs commands on this machine.
#[derive(Debug, Default)]
pub struct LocalShell;

#[async_trait]
impl RemoteSession for LocalShell {
    async fn execute(&self, command: &str, log: Option<&WorkspaceLog>) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        run_streamed(cmd, log).await
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct SshSession {
    target: SshTarget,
    // Holds the control socket; removed when the session is dropped.
    control_dir: TempDir,
    closed: bool,
}

impl SshSession {
    /// Authenticate and leave a control master running in the background.
    pub async fn connect(target: &SshTarget) -> Result<Self> {
        if let SshAuth::Password(_) = target.auth {
            if !is_tool_installed("sshpass") {
                return Err(VmError::Dependency(
                    "sshpass is required for password authentication".into(),
                ));
            }
        }

        let control_dir = tempfile::Builder::new().prefix("vmg-ssh-").tempdir()?;
        let mut session = Self {
            target: target.clone(),
            control_dir,
            closed: false,
        };

        let mut master = session.base_command(true);
        master
            .arg("-M")
            .arg("-f")
            .arg("-N")
            .arg("-o")
            .arg("ControlPersist=yes");
        session.auth_args(&mut master);
        master.arg(target.destination());

        let full_command = describe(&master);
        let output = stream_command(master, |line| debug!("ssh: {}", line)).await?;
        if let Err(e) = output.into_result(&full_command) {
            // No master is running, so there is nothing for drop to stop.
            session.closed = true;
            return Err(VmError::Connectivity(format!(
                "cannot open ssh session to {}:{}: {}",
                target.host, target.port, e
            )));
        }

        debug!("ssh control master up for {}:{}", target.host, target.port);
        Ok(session)
    }

    fn control_path(&self) -> PathBuf {
        self.control_dir.path().join("ctl")
    }

    /// `ssh` (or `sshpass -e ssh`) with the shared options and control path.
    fn base_command(&self, authenticating: bool) -> Command {
        let mut cmd = match (&self.target.auth, authenticating) {
            (SshAuth::Password(password), true) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                cmd
            }
            _ => Command::new("ssh"),
        };
        cmd.arg("-S")
            .arg(self.control_path())
            .arg("-p")
            .arg(self.target.port.to_string())
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "LogLevel=ERROR"])
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.target.connect_timeout.as_secs().max(1)
            ));
        cmd
    }

    fn auth_args(&self, cmd: &mut Command) {
        match &self.target.auth {
            SshAuth::PrivateKey(key) => {
                cmd.arg("-i")
                    .arg(key)
                    .args(["-o", "IdentitiesOnly=yes", "-o", "BatchMode=yes"]);
            }
            SshAuth::Password(_) => {
                cmd.args([
                    "-o",
                    "PreferredAuthentications=password,keyboard-interactive",
                    "-o",
                    "PubkeyAuthentication=no",
                ]);
            }
        }
    }

    fn control_command(&self, operation: &str) -> Command {
        let mut cmd = self.base_command(false);
        cmd.arg("-O").arg(operation);
        cmd
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(&self, command: &str, log: Option<&WorkspaceLog>) -> Result<()> {
        if self.closed {
            return Err(VmError::Connectivity("ssh session already closed".into()));
        }
        let mut cmd = self.base_command(false);
        cmd.args(["-o", "ControlMaster=no"])
            .arg(self.target.destination())
            .arg("--")
            .arg(command);
        run_streamed(cmd, log).await
    }

    async fn forward_socket(&self, local: &Path, remote: &Path) -> Result<()> {
        if local.exists() {
            std::fs::remove_file(local)?;
        }
        let mut cmd = self.control_command("forward");
        cmd.arg("-L")
            .arg(format!("{}:{}", local.display(), remote.display()))
            .arg(self.target.destination());
        run_streamed(cmd, None).await.map_err(|e| {
            VmError::Connectivity(format!(
                "cannot forward {} from {}: {}",
                remote.display(),
                self.target.host,
                e
            ))
        })
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut cmd = self.control_command("exit");
        cmd.arg(self.target.destination());
        run_streamed(cmd, None).await
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let control_path = self.control_path();
        let result = cmd!(
            "ssh",
            "-S",
            &control_path,
            "-O",
            "exit",
            self.target.destination()
        )
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run();
        if let Err(e) = result {
            warn!("Failed to stop ssh control master: {}", e);
        }
    }
}

/// Opens [`LocalShell`] or [`SshSession`] depending on the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSshOpener;

#[async_trait]
impl SessionOpener for OpenSshOpener {
    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn RemoteSession>> {
        match target {
            SessionTarget::Local => Ok(Box::new(LocalShell)),
            SessionTarget::Ssh(ssh) => Ok(Box::new(SshSession::connect(ssh).await?)),
        }
    }
}
