//! Workspace container lifecycle.
//!
//! Create: registry credentials, image pull, port plan, container create and
//! start, wait until running, operator lines, settle, wait for the guest,
//! bootstrap. Start: idempotent restart followed by an agent relaunch. Stop
//! and destroy tolerate a missing container.
//!
//! Nothing is rolled back on failure; a container can be left created but
//! unconfigured when the guest never comes up.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vm_config::ProviderConfig;
use vm_core::error::{Result, VmError};
use vm_messages::{msg, MESSAGES};
use vm_ports::{AllocationEntry, AllocationRegistry, PortProbe};

use crate::boot::BootMonitor;
use crate::bootstrap::RemoteBootstrapper;
use crate::cancel::{sleep_or_cancel, until_cancelled};
use crate::docker::{build_container_spec, find_registry_for_image, ContainerHandle, ContainerRuntime};
use crate::log_sink::WorkspaceLog;
use crate::ports::plan_port_bindings;
use crate::session::{RemoteSession, SessionOpener, SessionTarget};
use crate::target::TargetConnectionOptions;
use crate::workspace::{WorkspaceDescriptor, WorkspaceRequest};

/// Everything one lifecycle operation needs, borrowed for its duration.
pub struct ProvisionContext<'a> {
    pub config: &'a ProviderConfig,
    pub runtime: &'a dyn ContainerRuntime,
    pub opener: &'a dyn SessionOpener,
    pub probe: &'a dyn PortProbe,
    pub target: &'a TargetConnectionOptions,
    pub log: &'a WorkspaceLog,
    pub cancel: &'a CancellationToken,
}

/// Reported by `get-workspace-metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMetadata {
    pub container_name: String,
    pub container_id: Option<String>,
    pub running: bool,
    pub status: String,
    pub ui_url: Option<String>,
    pub ui_port: Option<u16>,
    pub api_port: Option<u16>,
}

pub struct ContainerProvisioner<'a> {
    ctx: ProvisionContext<'a>,
}

impl<'a> ContainerProvisioner<'a> {
    pub fn new(ctx: ProvisionContext<'a>) -> Self {
        Self { ctx }
    }

    fn monitor(&self) -> BootMonitor<'a> {
        BootMonitor::new(
            self.ctx.runtime,
            self.ctx.opener,
            self.ctx.cancel,
            self.ctx.config.timing.container_poll(),
            self.ctx.config.timing.guest_boot(),
        )
    }

    fn guest_target(&self) -> SessionTarget {
        let config = self.ctx.config;
        self.ctx.target.guest_session_target(
            config.ports.ssh_host_port,
            &config.guest.user,
            &config.guest.password,
            config.timing.ssh_connect_timeout(),
        )
    }

    /// Run `access` against the allocation registry on the blocking pool;
    /// updates wait on a file lock held by other provider processes.
    async fn with_registry<T, F>(&self, access: F) -> Result<T>
    where
        F: FnOnce(&mut AllocationRegistry) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.ctx.config.allocation_registry_path();
        tokio::task::spawn_blocking(move || {
            let mut registry = AllocationRegistry::open(&path)?;
            access(&mut registry)
        })
        .await
        .map_err(|e| VmError::Internal(format!("allocation registry task failed: {}", e)))?
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerHandle>> {
        until_cancelled(self.ctx.cancel, self.ctx.runtime.inspect(name))
            .await
            .map_err(|e| e.in_stage("inspecting container"))
    }

    pub async fn create_workspace(&self, request: &WorkspaceRequest) -> Result<()> {
        let workspace = &request.workspace;
        let name = workspace.container_name();
        let cancel = self.ctx.cancel;
        let runtime = self.ctx.runtime;
        let log = self.ctx.log;

        let ui_port = match self.inspect(&name).await? {
            Some(existing) => {
                log.line(&msg!(MESSAGES.workspace.reusing_container, name = name.as_str()));
                if !existing.running {
                    until_cancelled(cancel, runtime.start(&name))
                        .await
                        .map_err(|e| e.in_stage("starting container"))?;
                }
                let id = workspace.id.clone();
                self.with_registry(move |registry| Ok(registry.get(&id).map(|entry| entry.ui_port)))
                    .await?
            }
            None => Some(self.create_container(request, &name).await?),
        };

        let mut monitor = self.monitor();
        monitor.wait_until_running(&name).await?;

        if let Some(port) = ui_port {
            log.line(&msg!(
                MESSAGES.workspace.ui_visit,
                host = self.ctx.target.ui_host(),
                port = port.to_string()
            ));
        }
        let guest = &self.ctx.config.guest;
        log.line(&msg!(
            MESSAGES.workspace.default_credentials,
            user = guest.user.as_str(),
            password = guest.password.as_str()
        ));
        log.line(MESSAGES.workspace.remote_login_reminder);

        sleep_or_cancel(cancel, self.ctx.config.timing.settle_delay()).await?;

        let session = monitor.wait_for_guest(&self.guest_target()).await?;
        let result = RemoteBootstrapper::new(session.as_ref(), log, cancel)
            .configure(guest, &workspace.env_vars)
            .await;
        close_session(session).await;
        result
    }

    /// Pull, plan ports, create and start. Returns the UI host port.
    async fn create_container(&self, request: &WorkspaceRequest, name: &str) -> Result<u16> {
        let workspace = &request.workspace;
        let config = self.ctx.config;
        let cancel = self.ctx.cancel;
        let runtime = self.ctx.runtime;
        let log = self.ctx.log;
        let image = config.guest.image.as_str();

        let present = until_cancelled(cancel, runtime.image_exists(image))
            .await
            .map_err(|e| e.in_stage("checking image"))?;
        if present {
            log.line(&msg!(MESSAGES.workspace.image_present, image = image));
        } else {
            log.line(&msg!(MESSAGES.workspace.pulling_image, image = image));
            let auth = find_registry_for_image(&request.container_registries, image);
            until_cancelled(cancel, runtime.pull(image, auth.as_ref(), log))
                .await
                .map_err(|e| e.in_stage("pulling image"))?;
        }

        let id = workspace.id.clone();
        let reserved = self
            .with_registry(move |registry| Ok(registry.reserved_ports(Some(&id))))
            .await?;
        let probe = self.ctx.probe;
        let planned = plan_port_bindings(
            &config.ports,
            self.ctx.target.is_local(),
            probe,
            &reserved,
            || probe.ephemeral(),
        )?;

        let spec = build_container_spec(
            workspace,
            &planned.bindings,
            planned.api_port,
            &config.guest,
            config.timing.stop_timeout_secs,
        );
        let id = until_cancelled(cancel, runtime.create(&spec, name))
            .await
            .map_err(|e| e.in_stage("creating container"))?;
        debug!("Created container {} ({})", name, id);

        let workspace_id = workspace.id.clone();
        let entry = AllocationEntry::new(planned.ui_port, planned.api_port);
        self.with_registry(move |registry| Ok(registry.record(&workspace_id, entry)?))
            .await?;

        until_cancelled(cancel, runtime.start(name))
            .await
            .map_err(|e| e.in_stage("starting container"))?;
        Ok(planned.ui_port)
    }

    pub async fn start_workspace(&self, workspace: &WorkspaceDescriptor) -> Result<()> {
        let name = workspace.container_name();
        let log = self.ctx.log;
        let existing = self
            .inspect(&name)
            .await?
            .ok_or_else(|| VmError::runtime("starting workspace", format!("container {} not found", name)))?;

        let session = if existing.running {
            log.line(&msg!(MESSAGES.workspace.already_running, name = name.as_str()));
            match until_cancelled(self.ctx.cancel, self.ctx.opener.open(&self.guest_target())).await {
                Ok(session) => session,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("Could not reach guest to relaunch the agent: {}", e);
                    log.line(&msg!(
                        MESSAGES.workspace.command_failed,
                        command = "ssh",
                        error = e.to_string()
                    ));
                    return Ok(());
                }
            }
        } else {
            until_cancelled(self.ctx.cancel, self.ctx.runtime.start(&name))
                .await
                .map_err(|e| e.in_stage("starting container"))?;
            let confirmed = self.inspect(&name).await?;
            if !confirmed.map(|h| h.running).unwrap_or(false) {
                return Err(VmError::runtime(
                    "starting container",
                    format!("container {} is not running after start", name),
                ));
            }
            self.monitor().wait_for_guest(&self.guest_target()).await?
        };

        let result = RemoteBootstrapper::new(session.as_ref(), log, self.ctx.cancel)
            .launch_agent(&self.ctx.config.guest)
            .await;
        close_session(session).await;
        result.map(|_| ())
    }

    pub async fn stop_workspace(&self, workspace: &WorkspaceDescriptor) -> Result<()> {
        let name = workspace.container_name();
        let Some(handle) = self.inspect(&name).await? else {
            self.ctx.log.line(&msg!(MESSAGES.workspace.not_found, name = name.as_str()));
            return Ok(());
        };
        if handle.running {
            until_cancelled(
                self.ctx.cancel,
                self.ctx
                    .runtime
                    .stop(&name, self.ctx.config.timing.stop_timeout_secs),
            )
            .await
            .map_err(|e| e.in_stage("stopping container"))?;
        }
        self.ctx.log.line(&msg!(MESSAGES.workspace.stopped, name = name.as_str()));
        Ok(())
    }

    pub async fn destroy_workspace(&self, workspace: &WorkspaceDescriptor) -> Result<()> {
        let name = workspace.container_name();
        match self.inspect(&name).await? {
            Some(_) => {
                until_cancelled(self.ctx.cancel, self.ctx.runtime.remove(&name))
                    .await
                    .map_err(|e| e.in_stage("removing container"))?;
                self.ctx.log.line(&msg!(MESSAGES.workspace.destroyed, name = name.as_str()));
            }
            None => {
                self.ctx.log.line(&msg!(MESSAGES.workspace.not_found, name = name.as_str()));
            }
        }

        let id = workspace.id.clone();
        if let Some(entry) = self
            .with_registry(move |registry| Ok(registry.release(&id)?))
            .await?
        {
            info!("Released host ports of {} (UI {})", workspace.id, entry.ui_port);
        }
        Ok(())
    }

    pub async fn metadata(&self, workspace: &WorkspaceDescriptor) -> Result<WorkspaceMetadata> {
        let name = workspace.container_name();
        let handle = self.inspect(&name).await?;
        let id = workspace.id.clone();
        let entry = self
            .with_registry(move |registry| Ok(registry.get(&id).cloned()))
            .await?;
        let ui_port = entry.as_ref().map(|e| e.ui_port);

        Ok(WorkspaceMetadata {
            container_name: name,
            container_id: handle.as_ref().map(|h| h.id.clone()),
            running: handle.as_ref().map(|h| h.running).unwrap_or(false),
            status: handle
                .map(|h| h.status)
                .unwrap_or_else(|| "not-found".to_string()),
            ui_url: ui_port.map(|port| format!("http://{}:{}", self.ctx.target.ui_host(), port)),
            ui_port,
            api_port: entry.and_then(|e| e.api_port),
        })
    }
}

async fn close_session(mut session: Box<dyn RemoteSession>) {
    if let Err(e) = session.close().await {
        warn!("Failed to close session: {}", e);
    }
}
