//! Recording fakes for the runtime, session and port seams.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vm_config::{InitializeProviderRequest, ProviderConfig, ProviderTuning};
use vm_core::error::{Result, VmError};
use vm_ports::PortProbe;
use vm_provider::connector::RuntimeConnector;
use vm_provider::docker::{ContainerHandle, ContainerRuntime, ContainerSpec, RegistryAuth};
use vm_provider::log_sink::WorkspaceLog;
use vm_provider::session::{RemoteSession, SessionOpener, SessionTarget};
use vm_provider::target::TargetConnectionOptions;
use vm_provider::workspace::{TargetConfig, TargetDescriptor, WorkspaceDescriptor, WorkspaceRequest};
use vm_provider::GuestVmProvider;

pub const LOCAL_OPTIONS: &str = r#"{"Sock Path": "/var/run/docker.sock"}"#;
pub const REMOTE_OPTIONS: &str =
    r#"{"Remote Hostname": "mac.lan", "Remote User": "ops", "Remote Password": "pw"}"#;

#[derive(Debug, Default)]
pub struct RuntimeState {
    pub calls: Vec<String>,
    pub image_present: bool,
    pub exists: bool,
    pub running: bool,
    /// Inspects after a start that still report "not running".
    pub polls_before_running: usize,
    pending_polls: usize,
    pub never_runs: bool,
    pub created: Vec<(String, ContainerSpec)>,
    pub pulled_with: Vec<Option<RegistryAuth>>,
    /// Connection releases, counted apart from `calls`.
    pub closes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeRuntime {
    pub state: Arc<Mutex<RuntimeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(running: bool) -> Self {
        let runtime = Self::new();
        {
            let mut state = runtime.state.lock().unwrap();
            state.image_present = true;
            state.exists = true;
            state.running = running;
        }
        runtime
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == name).count()
    }

    pub fn created(&self) -> Vec<(String, ContainerSpec)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<()> {
        self.state.lock().unwrap().calls.push("ping".into());
        Ok(())
    }

    async fn image_exists(&self, _image: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("image_exists".into());
        Ok(state.image_present)
    }

    async fn pull(&self, _image: &str, auth: Option<&RegistryAuth>, log: &WorkspaceLog) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("pull".into());
        state.pulled_with.push(auth.cloned());
        state.image_present = true;
        log.line("latest: Pulling from dockurr/macos");
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec, name: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create".into());
        state.created.push((name.to_string(), spec.clone()));
        state.exists = true;
        state.running = false;
        Ok("cid-1".into())
    }

    async fn start(&self, _name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("start".into());
        if !state.never_runs {
            state.running = true;
            state.pending_polls = state.polls_before_running;
        }
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerHandle>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("inspect".into());
        if !state.exists {
            return Ok(None);
        }
        let running = state.running && state.pending_polls == 0;
        if state.running && state.pending_polls > 0 {
            state.pending_polls -= 1;
        }
        Ok(Some(ContainerHandle {
            id: "cid-1".into(),
            name: name.to_string(),
            running,
            status: if running { "running" } else { "created" }.into(),
        }))
    }

    async fn stop(&self, _name: &str, _timeout_secs: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("stop".into());
        state.running = false;
        Ok(())
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("remove".into());
        state.exists = false;
        state.running = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Hands out the shared fake runtime for every target.
pub struct FakeConnector {
    pub runtime: FakeRuntime,
}

#[async_trait]
impl RuntimeConnector for FakeConnector {
    async fn connect(
        &self,
        _target: &TargetConnectionOptions,
        _config: &ProviderConfig,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn ContainerRuntime>> {
        Ok(Box::new(self.runtime.clone()))
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub opened: Vec<SessionTarget>,
    /// The first `failing_opens` opens fail.
    pub failing_opens: usize,
    pub always_fail: bool,
    /// Every open fails as if `sshpass` were not installed.
    pub missing_sshpass: bool,
    pub closes: usize,
    pub commands: Vec<String>,
    /// 1-based index of the command that exits non-zero.
    pub fail_on_command: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeOpener {
    pub state: Arc<Mutex<SessionState>>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        let opener = Self::new();
        opener.state.lock().unwrap().always_fail = true;
        opener
    }

    pub fn missing_sshpass() -> Self {
        let opener = Self::new();
        opener.state.lock().unwrap().missing_sshpass = true;
        opener
    }

    pub fn failing_command(index: usize) -> Self {
        let opener = Self::new();
        opener.state.lock().unwrap().fail_on_command = Some(index);
        opener
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opened.len()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl SessionOpener for FakeOpener {
    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn RemoteSession>> {
        let mut state = self.state.lock().unwrap();
        state.opened.push(target.clone());
        if state.missing_sshpass {
            return Err(VmError::Dependency(
                "sshpass is required for password authentication".into(),
            ));
        }
        if state.always_fail || state.opened.len() <= state.failing_opens {
            return Err(VmError::Connectivity("connection refused".into()));
        }
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeSession {
    state: Arc<Mutex<SessionState>>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn execute(&self, command: &str, log: Option<&WorkspaceLog>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        if state.fail_on_command == Some(state.commands.len()) {
            return Err(VmError::Command {
                command: command.to_string(),
                status: Some(1),
                stderr: "boom".into(),
            });
        }
        if let Some(log) = log {
            log.line("ok");
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Reports the listed ports busy and hands out a fixed ephemeral port.
pub struct FakeProbe {
    pub occupied: Vec<u16>,
    pub ephemeral: Option<u16>,
}

impl PortProbe for FakeProbe {
    fn is_available(&self, port: u16) -> bool {
        !self.occupied.contains(&port)
    }

    fn ephemeral(&self) -> std::io::Result<u16> {
        self.ephemeral.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no ephemeral ports")
        })
    }
}

pub fn test_config(base: &Path) -> ProviderConfig {
    let request = InitializeProviderRequest {
        base_path: base.display().to_string(),
        workspace_logs_dir: base.join("logs").display().to_string(),
        ..Default::default()
    };
    ProviderConfig::from_request(&request, ProviderTuning::default())
        .unwrap()
        .with_remote_sock_dir(base.join("socks"))
}

pub fn workspace_request(options: &str, env: &[(&str, &str)]) -> WorkspaceRequest {
    WorkspaceRequest {
        workspace: WorkspaceDescriptor {
            id: "ws1".into(),
            name: "demo".into(),
            target_id: "t1".into(),
            env_vars: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            target: TargetDescriptor {
                id: "t1".into(),
                name: "local".into(),
                target_config: TargetConfig {
                    name: "local".into(),
                    options: options.to_string(),
                },
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn provider(base: &Path, runtime: &FakeRuntime, opener: &FakeOpener, probe: FakeProbe) -> GuestVmProvider {
    GuestVmProvider::with_parts(
        Some(test_config(base)),
        Box::new(FakeConnector {
            runtime: runtime.clone(),
        }),
        Box::new(opener.clone()),
        Box::new(probe),
    )
}

pub fn free_ports() -> FakeProbe {
    FakeProbe {
        occupied: Vec::new(),
        ephemeral: Some(45000),
    }
}

pub fn workspace_log_lines(base: &Path) -> Vec<String> {
    let path: PathBuf = base.join("logs").join("ws1.log");
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
