use async_trait::async_trait;
use vm_core::error::Result;

use super::registry::RegistryAuth;
use super::spec::ContainerSpec;
use crate::log_sink::WorkspaceLog;

/// Last observed state of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub status: String,
}

/// The container runtime operations the provider needs.
///
/// `inspect` returns `Ok(None)` for a container that does not exist, so
/// callers can tell "missing" apart from "runtime unreachable".
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<()>;
    async fn image_exists(&self, image: &str) -> Result<bool>;
    async fn pull(&self, image: &str, auth: Option<&RegistryAuth>, log: &WorkspaceLog) -> Result<()>;
    /// Create (not start) a container; returns its id.
    async fn create(&self, spec: &ContainerSpec, name: &str) -> Result<String>;
    async fn start(&self, name: &str) -> Result<()>;
    async fn inspect(&self, name: &str) -> Result<Option<ContainerHandle>>;
    async fn stop(&self, name: &str, timeout_secs: u32) -> Result<()>;
    /// Force-remove a container.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Release whatever connects this client to the daemon.
    ///
    /// Called once after every workspace operation. Clients that hold nothing
    /// keep the default.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
