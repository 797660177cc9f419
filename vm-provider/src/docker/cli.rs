//! [`ContainerRuntime`] backed by the `docker` CLI.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};
use vm_core::error::{Result, VmError};

use super::command::{is_not_found, DockerCommand};
use super::registry::{write_docker_config, RegistryAuth};
use super::runtime::{ContainerHandle, ContainerRuntime};
use super::spec::ContainerSpec;
use crate::log_sink::WorkspaceLog;
use crate::session::RemoteSession;

const INSPECT_FORMAT: &str = "{{.Id}}|{{.State.Running}}|{{.State.Status}}|{{.Name}}";

pub struct DockerCli {
    host: Option<String>,
    // Keeps a forwarded remote socket alive for as long as the client exists.
    tunnel: Option<Box<dyn RemoteSession>>,
}

impl DockerCli {
    /// Talk to the daemon listening on a local Unix socket.
    pub fn local(sock_path: &Path) -> Self {
        Self {
            host: Some(format!("unix://{}", sock_path.display())),
            tunnel: None,
        }
    }

    /// Talk to a remote daemon through a socket forwarded by `tunnel`.
    pub fn tunneled(local_sock: &Path, tunnel: Box<dyn RemoteSession>) -> Self {
        Self {
            host: Some(format!("unix://{}", local_sock.display())),
            tunnel: Some(tunnel),
        }
    }

    fn docker(&self) -> DockerCommand {
        DockerCommand::new(self.host.as_deref())
    }

    /// `docker create` arguments for `spec`.
    ///
    /// The CLI's `--entrypoint` takes only the executable, so the rest of the
    /// entrypoint follows the image as the command.
    pub fn create_args(spec: &ContainerSpec, name: &str) -> Vec<String> {
        let mut args = vec![
            "--name".to_string(),
            name.to_string(),
            "--hostname".to_string(),
            spec.hostname.clone(),
            "--user".to_string(),
            spec.user.clone(),
            "--stop-timeout".to_string(),
            spec.stop_timeout_secs.to_string(),
        ];
        if spec.privileged {
            args.push("--privileged".to_string());
        }
        for device in &spec.devices {
            args.push("--device".to_string());
            args.push(device.clone());
        }
        for cap in &spec.cap_add {
            args.push("--cap-add".to_string());
            args.push(cap.clone());
        }
        for host in &spec.extra_hosts {
            args.push("--add-host".to_string());
            args.push(host.clone());
        }
        for port in &spec.exposed_ports {
            args.push("--expose".to_string());
            args.push(format!("{}/tcp", port));
        }
        for binding in &spec.port_bindings {
            args.push("-p".to_string());
            args.push(binding.publish_arg());
        }
        for entry in &spec.env {
            args.push("-e".to_string());
            args.push(entry.clone());
        }
        for (key, value) in &spec.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }

        let mut entrypoint = spec.entrypoint.iter();
        if let Some(program) = entrypoint.next() {
            args.push("--entrypoint".to_string());
            args.push(program.clone());
        }
        args.push(spec.image.clone());
        args.extend(entrypoint.cloned());
        args
    }
}

fn parse_inspect(line: &str) -> Result<ContainerHandle> {
    let parts: Vec<&str> = line.trim().splitn(4, '|').collect();
    match parts.as_slice() {
        [id, running, status, name] => Ok(ContainerHandle {
            id: id.to_string(),
            running: *running == "true",
            status: status.to_string(),
            name: name.trim_start_matches('/').to_string(),
        }),
        _ => Err(VmError::Internal(format!(
            "unexpected docker inspect output: {:?}",
            line
        ))),
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<()> {
        let version = self
            .docker()
            .subcommand("info")
            .args(["--format", "{{.ServerVersion}}"])
            .execute_with_output()
            .await
            .map_err(|e| match e {
                VmError::Command { .. } => VmError::DockerNotRunning,
                other => other,
            })?;
        debug!("Docker daemon version {}", version);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self
            .docker()
            .subcommand("image")
            .args(["inspect", "--format", "{{.Id}}", image])
            .execute_raw()
            .await?;
        if output.status.success() {
            return Ok(true);
        }
        if is_not_found(&output.stderr) {
            return Ok(false);
        }
        Err(VmError::Command {
            command: format!("docker image inspect {}", image),
            status: output.status.code(),
            stderr: output.stderr,
        })
    }

    async fn pull(&self, image: &str, auth: Option<&RegistryAuth>, log: &WorkspaceLog) -> Result<()> {
        let mut command = self.docker().subcommand("pull").arg(image);

        // The temp dir must outlive the pull.
        let _auth_dir = match auth {
            Some(auth) => {
                let dir = tempfile::Builder::new().prefix("vmg-docker-auth-").tempdir()?;
                write_docker_config(dir.path(), auth)?;
                info!("Pulling {} with credentials for {}", image, auth.server);
                command = command.config_dir(dir.path());
                Some(dir)
            }
            None => None,
        };

        command.execute_streaming(|line| log.line(line)).await
    }

    async fn create(&self, spec: &ContainerSpec, name: &str) -> Result<String> {
        self.docker()
            .subcommand("create")
            .args(Self::create_args(spec, name))
            .execute_with_output()
            .await
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.docker()
            .subcommand("start")
            .arg(name)
            .execute_with_output()
            .await
            .map(|_| ())
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerHandle>> {
        let output = self
            .docker()
            .subcommand("container")
            .args(["inspect", "--format", INSPECT_FORMAT, name])
            .execute_raw()
            .await?;
        if output.status.success() {
            return parse_inspect(&output.stdout).map(Some);
        }
        if is_not_found(&output.stderr) {
            return Ok(None);
        }
        Err(VmError::Command {
            command: format!("docker container inspect {}", name),
            status: output.status.code(),
            stderr: output.stderr,
        })
    }

    async fn stop(&self, name: &str, timeout_secs: u32) -> Result<()> {
        self.docker()
            .subcommand("stop")
            .args(["--time".to_string(), timeout_secs.to_string(), name.to_string()])
            .execute_with_output()
            .await
            .map(|_| ())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.docker()
            .subcommand("rm")
            .args(["-f", name])
            .execute_with_output()
            .await
            .map(|_| ())
    }

    async fn close(&mut self) -> Result<()> {
        match self.tunnel.take() {
            Some(mut tunnel) => {
                debug!("Closing forwarded Docker socket");
                tunnel.close().await
            }
            None => Ok(()),
        }
    }
}
