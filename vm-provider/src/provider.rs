//! [`Provider`] implementation for guest VM workspaces.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use vm_config::{InitializeProviderRequest, ProviderConfig};
use vm_core::error::{Result, VmError};
use vm_messages::categories::WORKSPACE_OPS;
use vm_messages::{msg, MESSAGES};
use vm_ports::{PortProbe, TcpProbe};

use crate::connector::{DockerConnector, RuntimeConnector};
use crate::docker::ContainerRuntime;
use crate::log_sink::WorkspaceLog;
use crate::provisioner::{ContainerProvisioner, ProvisionContext, WorkspaceMetadata};
use crate::requirements::{self, RequirementStatus};
use crate::session::{OpenSshOpener, SessionOpener};
use crate::target::{target_config_manifest, TargetConfigManifest, TargetConnectionOptions, DEFAULT_SOCK_PATH};
use crate::workspace::{TargetConfig, TargetRequest, WorkspaceDescriptor, WorkspaceRequest};
use crate::Provider;

pub const PROVIDER_NAME: &str = "guest-vm-provider";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub name: String,
    pub label: String,
    pub version: String,
    pub agentless_target: bool,
    pub target_config_manifest: TargetConfigManifest,
}

pub struct GuestVmProvider {
    config: Option<ProviderConfig>,
    connector: Box<dyn RuntimeConnector>,
    opener: Box<dyn SessionOpener>,
    probe: Box<dyn PortProbe>,
}

impl Default for GuestVmProvider {
    fn default() -> Self {
        Self {
            config: None,
            connector: Box::new(DockerConnector::default()),
            opener: Box::new(OpenSshOpener),
            probe: Box::new(TcpProbe),
        }
    }
}

impl GuestVmProvider {
    /// Provider for a configuration saved by an earlier `initialize`.
    pub fn from_config(config: ProviderConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    /// Swap the runtime, session and port seams; used by tests and embedders.
    pub fn with_parts(
        config: Option<ProviderConfig>,
        connector: Box<dyn RuntimeConnector>,
        opener: Box<dyn SessionOpener>,
        probe: Box<dyn PortProbe>,
    ) -> Self {
        Self {
            config,
            connector,
            opener,
            probe,
        }
    }

    pub fn config(&self) -> Result<&ProviderConfig> {
        self.config.as_ref().ok_or_else(|| {
            VmError::Config("Provider is not initialized. Run 'vm-guest initialize' first.".into())
        })
    }

    fn workspace_log(&self, config: &ProviderConfig, workspace: &WorkspaceDescriptor) -> Result<WorkspaceLog> {
        WorkspaceLog::open(
            workspace.id.as_str(),
            config.workspace_log_path(&workspace.id).as_deref(),
        )
    }

    /// Open the workspace log and connect to the target's runtime.
    async fn connect(&self, workspace: &WorkspaceDescriptor, cancel: &CancellationToken) -> Result<Connected> {
        let config = self.config()?;
        let target = TargetConnectionOptions::parse(&workspace.target.target_config.options)?;
        let log = self.workspace_log(config, workspace)?;
        let runtime = self.connector.connect(&target, config, cancel).await?;
        Ok(Connected { runtime, target, log })
    }

    fn provisioner<'a>(
        &'a self,
        connected: &'a Connected,
        cancel: &'a CancellationToken,
    ) -> Result<ContainerProvisioner<'a>> {
        Ok(ContainerProvisioner::new(ProvisionContext {
            config: self.config()?,
            runtime: connected.runtime.as_ref(),
            opener: self.opener.as_ref(),
            probe: self.probe.as_ref(),
            target: &connected.target,
            log: &connected.log,
            cancel,
        }))
    }
}

/// What one workspace operation holds while it runs.
struct Connected {
    runtime: Box<dyn ContainerRuntime>,
    target: TargetConnectionOptions,
    log: WorkspaceLog,
}

/// Release the runtime connection on every exit path of an operation.
async fn disconnect(connected: Connected) {
    let Connected { mut runtime, .. } = connected;
    if let Err(e) = runtime.close().await {
        warn!("Failed to close the container runtime connection: {}", e);
    }
}

fn preset_local_target() -> TargetConfig {
    TargetConfig {
        name: "local".to_string(),
        options: format!("{{\n\t\"Sock Path\": \"{}\"\n}}", DEFAULT_SOCK_PATH),
    }
}

#[async_trait]
impl Provider for GuestVmProvider {
    async fn initialize(&mut self, request: InitializeProviderRequest) -> Result<()> {
        let config = ProviderConfig::from_request_with_overrides(&request)?;

        // Sockets forwarded by an earlier process are stale.
        if config.remote_sock_dir.exists() {
            std::fs::remove_dir_all(&config.remote_sock_dir)?;
        }
        std::fs::create_dir_all(&config.remote_sock_dir)?;

        info!("Provider initialized with base path {}", config.base_path.display());
        self.config = Some(config);
        Ok(())
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: PROVIDER_NAME.to_string(),
            label: MESSAGES.provider.label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            agentless_target: false,
            target_config_manifest: target_config_manifest(),
        }
    }

    fn preset_target_configs(&self) -> Vec<TargetConfig> {
        vec![preset_local_target()]
    }

    async fn check_requirements(&self) -> Result<Vec<RequirementStatus>> {
        requirements::check_requirements().await
    }

    async fn create_target(&self, _request: &TargetRequest) -> Result<()> {
        Ok(())
    }

    async fn start_target(&self, _request: &TargetRequest) -> Result<()> {
        Ok(())
    }

    async fn stop_target(&self, _request: &TargetRequest) -> Result<()> {
        Ok(())
    }

    async fn destroy_target(&self, _request: &TargetRequest) -> Result<()> {
        Ok(())
    }

    async fn create_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()> {
        let workspace = &request.workspace;
        let span = info_span!("create_workspace", workspace = %workspace.id);
        async {
            info!("{}", msg!(WORKSPACE_OPS.create.starting, name = workspace.display_name()));
            let connected = self.connect(workspace, cancel).await?;
            let result = async {
                self.provisioner(&connected, cancel)?
                    .create_workspace(request)
                    .await
            }
            .await;
            disconnect(connected).await;
            result?;
            info!("{}", msg!(WORKSPACE_OPS.create.success, name = workspace.display_name()));
            Ok::<(), VmError>(())
        }
        .instrument(span)
        .await
    }

    async fn start_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()> {
        let workspace = &request.workspace;
        let span = info_span!("start_workspace", workspace = %workspace.id);
        async {
            info!("{}", msg!(WORKSPACE_OPS.start.starting, name = workspace.display_name()));
            let connected = self.connect(workspace, cancel).await?;
            let result = async {
                self.provisioner(&connected, cancel)?
                    .start_workspace(workspace)
                    .await
            }
            .await;
            disconnect(connected).await;
            result?;
            info!("{}", msg!(WORKSPACE_OPS.start.success, name = workspace.display_name()));
            Ok::<(), VmError>(())
        }
        .instrument(span)
        .await
    }

    async fn stop_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()> {
        let workspace = &request.workspace;
        let span = info_span!("stop_workspace", workspace = %workspace.id);
        async {
            info!("{}", msg!(WORKSPACE_OPS.stop.starting, name = workspace.display_name()));
            let connected = self.connect(workspace, cancel).await?;
            let result = async {
                self.provisioner(&connected, cancel)?
                    .stop_workspace(workspace)
                    .await
            }
            .await;
            disconnect(connected).await;
            result?;
            info!("{}", msg!(WORKSPACE_OPS.stop.success, name = workspace.display_name()));
            Ok::<(), VmError>(())
        }
        .instrument(span)
        .await
    }

    async fn destroy_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()> {
        let workspace = &request.workspace;
        let span = info_span!("destroy_workspace", workspace = %workspace.id);
        async {
            info!("{}", msg!(WORKSPACE_OPS.destroy.starting, name = workspace.display_name()));
            let connected = self.connect(workspace, cancel).await?;
            let result = async {
                self.provisioner(&connected, cancel)?
                    .destroy_workspace(workspace)
                    .await
            }
            .await;
            disconnect(connected).await;
            result?;
            info!("{}", msg!(WORKSPACE_OPS.destroy.success, name = workspace.display_name()));
            Ok::<(), VmError>(())
        }
        .instrument(span)
        .await
    }

    async fn target_metadata(&self, request: &TargetRequest) -> Result<String> {
        let target = TargetConnectionOptions::parse(&request.target.target_config.options)?;
        let metadata = json!({
            "targetId": request.target.id,
            "local": target.is_local(),
            "host": target.ui_host(),
            "sockPath": target.sock_path(),
        });
        Ok(serde_json::to_string(&metadata)?)
    }

    async fn workspace_metadata(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<String> {
        let connected = self.connect(&request.workspace, cancel).await?;
        let result = async {
            self.provisioner(&connected, cancel)?
                .metadata(&request.workspace)
                .await
        }
        .await;
        disconnect(connected).await;
        let metadata: WorkspaceMetadata = result?;
        Ok(serde_json::to_string(&metadata)?)
    }
}
