//! Guest boot detection.
//!
//! Two bounded polls: container state until the runtime reports it running,
//! then session opens into the guest until one succeeds. The session from
//! the successful probe is handed back so the caller does not connect twice.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vm_config::RetryPolicy;
use vm_core::error::{Result, VmError};

use crate::cancel::{sleep_or_cancel, until_cancelled};
use crate::docker::{ContainerHandle, ContainerRuntime};
use crate::session::{RemoteSession, SessionOpener, SessionTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    ContainerStarting,
    ContainerRunning,
    GuestReady,
    Failed,
}

pub struct BootMonitor<'a> {
    runtime: &'a dyn ContainerRuntime,
    opener: &'a dyn SessionOpener,
    cancel: &'a CancellationToken,
    container_poll: RetryPolicy,
    guest_boot: RetryPolicy,
    state: BootState,
}

impl<'a> BootMonitor<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        opener: &'a dyn SessionOpener,
        cancel: &'a CancellationToken,
        container_poll: RetryPolicy,
        guest_boot: RetryPolicy,
    ) -> Self {
        Self {
            runtime,
            opener,
            cancel,
            container_poll,
            guest_boot,
            state: BootState::ContainerStarting,
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    fn fail(&mut self, err: VmError) -> VmError {
        self.state = BootState::Failed;
        err
    }

    /// Poll `name` until it is running. Inspect errors abort immediately.
    pub async fn wait_until_running(&mut self, name: &str) -> Result<ContainerHandle> {
        let started = Instant::now();
        loop {
            let inspected = until_cancelled(self.cancel, self.runtime.inspect(name))
                .await
                .map_err(|e| e.in_stage("inspecting container"));
            match inspected {
                Ok(Some(handle)) if handle.running => {
                    debug!("Container {} is running", name);
                    self.state = BootState::ContainerRunning;
                    return Ok(handle);
                }
                Ok(Some(handle)) => {
                    debug!("Container {} is {}, waiting", name, handle.status);
                }
                Ok(None) => {
                    let err = VmError::runtime(
                        "waiting for container",
                        format!("container {} no longer exists", name),
                    );
                    return Err(self.fail(err));
                }
                Err(e) => return Err(self.fail(e)),
            }

            if !self.container_poll.allows(started.elapsed()) {
                let err = VmError::Timeout(format!(
                    "container {} was not running after {}",
                    name,
                    self.container_poll.describe()
                ));
                return Err(self.fail(err));
            }
            if let Err(e) = sleep_or_cancel(self.cancel, self.container_poll.interval).await {
                return Err(self.fail(e));
            }
        }
    }

    /// Keep opening sessions to the guest until one succeeds.
    ///
    /// Probe errors are retried; when the policy gives up the last one is
    /// reported as a connectivity error. Dependency and configuration errors
    /// are returned as they are on the first attempt.
    pub async fn wait_for_guest(&mut self, target: &SessionTarget) -> Result<Box<dyn RemoteSession>> {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let last_error = match until_cancelled(self.cancel, self.opener.open(target)).await {
                Ok(session) => {
                    info!("Guest reachable after {} attempt(s)", attempt);
                    self.state = BootState::GuestReady;
                    return Ok(session);
                }
                Err(VmError::Cancelled) => return Err(self.fail(VmError::Cancelled)),
                // No amount of waiting fixes a missing tool or bad settings.
                Err(e @ (VmError::Dependency(_) | VmError::Config(_))) => return Err(self.fail(e)),
                Err(e) => {
                    debug!("Guest not reachable yet (attempt {}): {}", attempt, e);
                    e
                }
            };

            if !self.guest_boot.allows(started.elapsed()) {
                let err = VmError::Connectivity(format!(
                    "guest did not accept a session within {} ({} attempts): {}",
                    self.guest_boot.describe(),
                    attempt,
                    last_error
                ));
                return Err(self.fail(err));
            }
            if let Err(e) = sleep_or_cancel(self.cancel, self.guest_boot.interval).await {
                return Err(self.fail(e));
            }
        }
    }
}
