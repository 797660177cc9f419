// Command handlers: one per plugin operation

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vm_config::InitializeProviderRequest;
use vm_core::error::{Result, VmError};
use vm_provider::{GuestVmProvider, Provider, TargetRequest, WorkspaceRequest};

use crate::cli::{Args, Command};
use crate::state::ProviderState;

/// Parse a request body from `path`, or from stdin when no path is given.
pub fn read_request<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    parse_request(&raw)
}

pub fn parse_request<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| VmError::Serialization(format!("invalid request: {}", e)))
}

fn ack() -> Value {
    json!({})
}

/// Workspace id for error headlines, when the request names one.
pub fn workspace_id_of(raw: &Value) -> Option<String> {
    raw.pointer("/workspace/id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Run one operation and return the JSON to print.
#[must_use = "command execution results should be handled"]
pub async fn execute_command(args: &Args, request: Option<Value>, cancel: &CancellationToken) -> Result<Value> {
    let state = ProviderState::new(args.state_dir.as_deref());
    let body = || -> Result<Value> {
        request
            .clone()
            .ok_or_else(|| VmError::Internal("request body missing".into()))
    };
    let workspace = || -> Result<WorkspaceRequest> { Ok(serde_json::from_value(body()?)?) };
    let target = || -> Result<TargetRequest> { Ok(serde_json::from_value(body()?)?) };

    debug!("Handling {:?}", args.command);
    match args.command {
        Command::Initialize => {
            let request: InitializeProviderRequest = serde_json::from_value(body()?)?;
            let mut provider = GuestVmProvider::default();
            provider.initialize(request).await?;
            state.save(provider.config()?)?;
            Ok(ack())
        }
        Command::GetInfo => Ok(serde_json::to_value(GuestVmProvider::default().info())?),
        Command::GetPresetTargetConfigs => Ok(serde_json::to_value(
            GuestVmProvider::default().preset_target_configs(),
        )?),
        Command::CheckRequirements => Ok(serde_json::to_value(
            GuestVmProvider::default().check_requirements().await?,
        )?),
        command => {
            let provider = GuestVmProvider::from_config(state.load()?);
            match command {
                Command::CreateTarget => provider.create_target(&target()?).await.map(|_| ack()),
                Command::StartTarget => provider.start_target(&target()?).await.map(|_| ack()),
                Command::StopTarget => provider.stop_target(&target()?).await.map(|_| ack()),
                Command::DestroyTarget => provider.destroy_target(&target()?).await.map(|_| ack()),
                Command::CreateWorkspace => provider
                    .create_workspace(&workspace()?, cancel)
                    .await
                    .map(|_| ack()),
                Command::StartWorkspace => provider
                    .start_workspace(&workspace()?, cancel)
                    .await
                    .map(|_| ack()),
                Command::StopWorkspace => provider
                    .stop_workspace(&workspace()?, cancel)
                    .await
                    .map(|_| ack()),
                Command::DestroyWorkspace => provider
                    .destroy_workspace(&workspace()?, cancel)
                    .await
                    .map(|_| ack()),
                Command::GetTargetMetadata => {
                    let metadata = provider.target_metadata(&target()?).await?;
                    Ok(serde_json::from_str(&metadata)?)
                }
                Command::GetWorkspaceMetadata => {
                    let metadata = provider.workspace_metadata(&workspace()?, cancel).await?;
                    Ok(serde_json::from_str(&metadata)?)
                }
                Command::Initialize
                | Command::GetInfo
                | Command::GetPresetTargetConfigs
                | Command::CheckRequirements => Err(VmError::Internal(format!(
                    "{:?} does not use a stored configuration",
                    command
                ))),
            }
        }
    }
}
