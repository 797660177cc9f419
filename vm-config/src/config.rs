//! Provider configuration.
//!
//! The host-supplied values come from [`InitializeProviderRequest`]; guest
//! defaults, host port choices and polling bounds come from
//! [`ProviderTuning`], which can be overridden per installation through
//! `<base_path>/provider.yaml`. Every field of the tuning file is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use vm_core::error::{Result, VmError};

use crate::paths;
use crate::request::InitializeProviderRequest;
use crate::retry::{RetryPolicy, RetrySettings};

/// Immutable provider configuration, built once per initialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub base_path: PathBuf,
    pub download_url: String,
    pub agent_version: String,
    pub server_url: String,
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_logs_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_logs_dir: Option<PathBuf>,
    pub api_port: u32,
    pub server_port: u32,
    pub remote_sock_dir: PathBuf,

    #[serde(default)]
    pub guest: GuestSettings,
    #[serde(default)]
    pub ports: PortSettings,
    #[serde(default)]
    pub timing: TimingSettings,
}

/// Sections that may be tuned from `provider.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderTuning {
    #[serde(default)]
    pub guest: GuestSettings,
    #[serde(default)]
    pub ports: PortSettings,
    #[serde(default)]
    pub timing: TimingSettings,
}

/// Guest image and login details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestSettings {
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_guest_user")]
    pub user: String,
    #[serde(default = "default_guest_password")]
    pub password: String,
    /// Shell profile the bootstrap writes exports into.
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_agent_log")]
    pub agent_log: String,
    #[serde(default = "default_agent_installer_url")]
    pub agent_installer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortSettings {
    #[serde(default = "default_ssh_host_port")]
    pub ssh_host_port: u16,
    #[serde(default = "default_control_host_port")]
    pub control_host_port: u16,
    #[serde(default = "default_ui_base_port")]
    pub ui_base_port: u16,
    /// How many candidates the UI port scan tries before giving up.
    #[serde(default = "default_ui_scan_limit")]
    pub ui_scan_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSettings {
    #[serde(default = "default_container_poll")]
    pub container_poll: RetrySettings,
    #[serde(default = "default_guest_boot")]
    pub guest_boot: RetrySettings,
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_ssh_connect_timeout_secs")]
    pub ssh_connect_timeout_secs: u64,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u32,
}

fn default_image() -> String {
    "dockurr/macos:latest".to_string()
}

fn default_guest_user() -> String {
    "daytona".to_string()
}

fn default_guest_password() -> String {
    "daytona".to_string()
}

fn default_profile() -> String {
    "~/.zshrc".to_string()
}

fn default_agent_log() -> String {
    "/Users/daytona/.daytona-agent.log".to_string()
}

fn default_agent_installer_url() -> String {
    "https://download.daytona.io/daytona/install.sh".to_string()
}

fn default_ssh_host_port() -> u16 {
    10022
}

fn default_control_host_port() -> u16 {
    2222
}

fn default_ui_base_port() -> u16 {
    8006
}

fn default_ui_scan_limit() -> u32 {
    1000
}

fn default_container_poll() -> RetrySettings {
    RetrySettings {
        interval_secs: 1,
        max_elapsed_secs: Some(300),
    }
}

fn default_guest_boot() -> RetrySettings {
    RetrySettings {
        interval_secs: 10,
        max_elapsed_secs: Some(3600),
    }
}

fn default_settle_delay_secs() -> u64 {
    15
}

fn default_ssh_connect_timeout_secs() -> u64 {
    10
}

fn default_stop_timeout_secs() -> u32 {
    120
}

impl Default for GuestSettings {
    fn default() -> Self {
        Self {
            image: default_image(),
            user: default_guest_user(),
            password: default_guest_password(),
            profile: default_profile(),
            agent_log: default_agent_log(),
            agent_installer_url: default_agent_installer_url(),
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            ssh_host_port: default_ssh_host_port(),
            control_host_port: default_control_host_port(),
            ui_base_port: default_ui_base_port(),
            ui_scan_limit: default_ui_scan_limit(),
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            container_poll: default_container_poll(),
            guest_boot: default_guest_boot(),
            settle_delay_secs: default_settle_delay_secs(),
            ssh_connect_timeout_secs: default_ssh_connect_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

impl TimingSettings {
    pub fn container_poll(&self) -> RetryPolicy {
        self.container_poll.policy()
    }

    pub fn guest_boot(&self) -> RetryPolicy {
        self.guest_boot.policy()
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn ssh_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_connect_timeout_secs)
    }
}

impl ProviderTuning {
    /// Load `<base_path>/provider.yaml`, or defaults when the file is absent.
    pub fn load_or_default(base_path: &Path) -> Result<Self> {
        let path = paths::tuning_file(base_path);
        if !path.exists() {
            return Ok(Self::default());
        }

        debug!("Loading provider tuning from {}", path.display());
        let contents = std::fs::read_to_string(&path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(&contents).map_err(|e| {
            VmError::Config(format!("Invalid tuning file {}: {}", path.display(), e))
        })
    }
}

impl ProviderConfig {
    /// Build the configuration from the host's initialize request.
    pub fn from_request(req: &InitializeProviderRequest, tuning: ProviderTuning) -> Result<Self> {
        if req.base_path.trim().is_empty() {
            return Err(VmError::Config("basePath must not be empty".into()));
        }

        let config = Self {
            base_path: PathBuf::from(&req.base_path),
            download_url: req.daytona_download_url.clone(),
            agent_version: req.daytona_version.clone(),
            server_url: req.server_url.clone(),
            api_url: req.api_url.clone(),
            api_key: req.api_key.clone(),
            target_logs_dir: non_empty_path(&req.target_logs_dir),
            workspace_logs_dir: non_empty_path(&req.workspace_logs_dir),
            api_port: req.api_port,
            server_port: req.server_port,
            remote_sock_dir: paths::default_remote_sock_dir(),
            guest: tuning.guest,
            ports: tuning.ports,
            timing: tuning.timing,
        };
        config.validate()?;
        Ok(config)
    }

    /// Same as [`from_request`](Self::from_request), reading the tuning file from the base path.
    pub fn from_request_with_overrides(req: &InitializeProviderRequest) -> Result<Self> {
        let tuning = ProviderTuning::load_or_default(Path::new(&req.base_path))?;
        Self::from_request(req, tuning)
    }

    pub fn with_remote_sock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.remote_sock_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ports = &self.ports;
        if ports.ssh_host_port == 0 || ports.control_host_port == 0 || ports.ui_base_port == 0 {
            return Err(VmError::Config("host ports must be non-zero".into()));
        }
        if ports.ssh_host_port == ports.control_host_port {
            return Err(VmError::Config(format!(
                "ssh_host_port and control_host_port are both {}",
                ports.ssh_host_port
            )));
        }
        if ports.ui_scan_limit == 0 {
            return Err(VmError::Config("ui_scan_limit must be at least 1".into()));
        }
        for (name, retry) in [
            ("container_poll", &self.timing.container_poll),
            ("guest_boot", &self.timing.guest_boot),
        ] {
            if retry.interval_secs == 0 {
                return Err(VmError::Config(format!(
                    "timing.{}.interval_secs must be at least 1",
                    name
                )));
            }
        }
        if self.guest.user.trim().is_empty() {
            return Err(VmError::Config("guest.user must not be empty".into()));
        }
        Ok(())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VmError::Config(format!(
                    "Provider is not initialized (no config at {}). Run 'vm-guest initialize' first.",
                    path.display()
                ))
            } else {
                VmError::Io(e)
            }
        })?;
        let config: Self = serde_yaml_ng::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self)?;
        std::fs::write(path, yaml)?;

        Ok(())
    }

    /// Log file for one workspace, when the host asked for workspace logs.
    pub fn workspace_log_path(&self, workspace_id: &str) -> Option<PathBuf> {
        self.workspace_logs_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", workspace_id)))
    }

    pub fn allocation_registry_path(&self) -> PathBuf {
        self.base_path.join("port-allocations.json")
    }
}

fn non_empty_path(raw: &str) -> Option<PathBuf> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(raw))
    }
}
