//! Reaching the container runtime of a target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vm_config::ProviderConfig;
use vm_core::error::{Result, VmError};

use crate::cancel::until_cancelled;
use crate::docker::{ContainerRuntime, DockerCli};
use crate::security::shell_quote;
use crate::session::{OpenSshOpener, RemoteSession, SessionOpener};
use crate::target::{RemoteTarget, TargetConnectionOptions};

#[async_trait]
pub trait RuntimeConnector: Send + Sync {
    async fn connect(
        &self,
        target: &TargetConnectionOptions,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ContainerRuntime>>;
}

/// Local socket for a remote daemon, unique per host and process.
pub fn forwarded_socket_path(sock_dir: &Path, remote: &RemoteTarget) -> PathBuf {
    sock_dir.join(format!(
        "{}-{}-{}-docker.sock",
        remote.hostname,
        remote.port,
        std::process::id()
    ))
}

/// Connects [`DockerCli`] to the target's daemon: directly for local
/// targets, through an SSH-forwarded socket for remote ones.
pub struct DockerConnector {
    opener: Box<dyn SessionOpener>,
}

impl Default for DockerConnector {
    fn default() -> Self {
        Self::new(Box::new(OpenSshOpener))
    }
}

impl DockerConnector {
    pub fn new(opener: Box<dyn SessionOpener>) -> Self {
        Self { opener }
    }

    async fn check_socket(&self, session: &dyn RemoteSession, sock: &Path, cancel: &CancellationToken) -> Result<()> {
        let probe = format!("test -S {}", shell_quote(&sock.to_string_lossy()));
        match until_cancelled(cancel, session.execute(&probe, None)).await {
            Ok(()) => Ok(()),
            Err(VmError::Command { .. }) => Err(VmError::DockerNotRunning),
            Err(e) => Err(e),
        }
    }

    async fn tunnel(
        &self,
        remote: &RemoteTarget,
        session: &dyn RemoteSession,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.check_socket(session, &remote.sock_path, cancel).await?;
        std::fs::create_dir_all(&config.remote_sock_dir)?;
        let local = forwarded_socket_path(&config.remote_sock_dir, remote);
        until_cancelled(cancel, session.forward_socket(&local, &remote.sock_path)).await?;
        Ok(local)
    }
}

#[async_trait]
impl RuntimeConnector for DockerConnector {
    async fn connect(
        &self,
        target: &TargetConnectionOptions,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ContainerRuntime>> {
        let host = target.host_session_target(config.timing.ssh_connect_timeout());
        let mut session = until_cancelled(cancel, self.opener.open(&host)).await?;

        match target {
            TargetConnectionOptions::Local { sock_path } => {
                let checked = self.check_socket(session.as_ref(), sock_path, cancel).await;
                if let Err(e) = session.close().await {
                    warn!("Failed to close local shell: {}", e);
                }
                checked?;
                debug!("Using local Docker socket {}", sock_path.display());
                Ok(Box::new(DockerCli::local(sock_path)))
            }
            TargetConnectionOptions::Remote(remote) => {
                match self.tunnel(remote, session.as_ref(), config, cancel).await {
                    Ok(local) => {
                        info!(
                            "Forwarded Docker socket of {} to {}",
                            remote.hostname,
                            local.display()
                        );
                        Ok(Box::new(DockerCli::tunneled(&local, session)))
                    }
                    Err(e) => {
                        if let Err(close_err) = session.close().await {
                            warn!("Failed to close session to {}: {}", remote.hostname, close_err);
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}
