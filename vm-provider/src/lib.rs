//! Guest VM workspace provider.
//!
//! Provisions a container that runs a virtual machine, waits for the guest
//! OS to boot, and configures it over SSH. [`Provider`] is the full operation
//! set a host plugin adapter exposes; [`GuestVmProvider`] implements it on
//! top of the Docker CLI and the system OpenSSH client.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vm_config::InitializeProviderRequest;
use vm_core::error::Result;

pub mod boot;
pub mod bootstrap;
pub mod cancel;
pub mod connector;
pub mod docker;
pub mod error;
pub mod log_sink;
pub mod ports;
pub mod provider;
pub mod provisioner;
pub mod requirements;
pub mod security;
pub mod session;
pub mod target;
pub mod workspace;

pub use provider::{GuestVmProvider, ProviderInfo, PROVIDER_NAME};
pub use requirements::RequirementStatus;
pub use vm_core::error::{Result as VmResult, VmError};
pub use workspace::{TargetConfig, TargetRequest, WorkspaceRequest};

/// Every operation the host can ask of a provider.
///
/// Target operations are acknowledgements only for providers whose targets
/// need no lifecycle of their own.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Build and store the configuration. Must run before workspace operations.
    async fn initialize(&mut self, request: InitializeProviderRequest) -> Result<()>;

    fn info(&self) -> ProviderInfo;

    fn preset_target_configs(&self) -> Vec<TargetConfig>;

    async fn check_requirements(&self) -> Result<Vec<RequirementStatus>>;

    async fn create_target(&self, request: &TargetRequest) -> Result<()>;
    async fn start_target(&self, request: &TargetRequest) -> Result<()>;
    async fn stop_target(&self, request: &TargetRequest) -> Result<()>;
    async fn destroy_target(&self, request: &TargetRequest) -> Result<()>;

    async fn create_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()>;
    async fn start_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()>;
    async fn stop_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()>;
    async fn destroy_workspace(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<()>;

    /// JSON describing the target.
    async fn target_metadata(&self, request: &TargetRequest) -> Result<String>;

    /// JSON describing the workspace's container and ports.
    async fn workspace_metadata(&self, request: &WorkspaceRequest, cancel: &CancellationToken) -> Result<String>;
}
