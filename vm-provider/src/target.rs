//! Target connection options and the manifest the host renders for them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vm_core::error::{Result, VmError};

use crate::session::{SessionTarget, SshAuth, SshTarget};

pub const DEFAULT_SOCK_PATH: &str = "/var/run/docker.sock";
const DEFAULT_REMOTE_PORT: u16 = 22;

#[derive(Debug, Default, Deserialize)]
struct RawTargetOptions {
    #[serde(rename = "Sock Path", default)]
    sock_path: Option<String>,
    #[serde(rename = "Remote Hostname", default)]
    remote_hostname: Option<String>,
    #[serde(rename = "Remote Port", default)]
    remote_port: Option<u16>,
    #[serde(rename = "Remote User", default)]
    remote_user: Option<String>,
    #[serde(rename = "Remote Password", default)]
    remote_password: Option<String>,
    #[serde(rename = "Remote Private Key Path", default)]
    remote_private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTarget {
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    /// Docker socket path on the remote host.
    pub sock_path: PathBuf,
}

/// Where the container runtime lives and how to reach that host.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetConnectionOptions {
    Local { sock_path: PathBuf },
    Remote(RemoteTarget),
}

impl TargetConnectionOptions {
    /// Parse the JSON options string attached to a target config.
    ///
    /// A target is remote exactly when `Remote Hostname` is set. Remote targets
    /// need a user and one credential; with both a key and a password given,
    /// the key is used.
    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawTargetOptions = if json.trim().is_empty() {
            RawTargetOptions::default()
        } else {
            serde_json::from_str(json)
                .map_err(|e| VmError::Config(format!("invalid target options: {}", e)))?
        };

        let sock_path = PathBuf::from(
            raw.sock_path
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOCK_PATH.to_string()),
        );

        let Some(hostname) = raw.remote_hostname.filter(|h| !h.trim().is_empty()) else {
            return Ok(Self::Local { sock_path });
        };

        let user = raw
            .remote_user
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| VmError::Config("Remote User is required for remote targets".into()))?;

        let auth = match (raw.remote_private_key, raw.remote_password) {
            (Some(key), _) if !key.trim().is_empty() => SshAuth::PrivateKey(expand_home(&key)),
            (_, Some(password)) if !password.is_empty() => SshAuth::Password(password),
            _ => {
                return Err(VmError::Config(
                    "remote targets need either Remote Password or Remote Private Key Path".into(),
                ))
            }
        };

        Ok(Self::Remote(RemoteTarget {
            hostname,
            port: raw.remote_port.unwrap_or(DEFAULT_REMOTE_PORT),
            user,
            auth,
            sock_path,
        }))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Host the operator's browser should use for the web UI.
    pub fn ui_host(&self) -> &str {
        match self {
            Self::Local { .. } => "localhost",
            Self::Remote(remote) => &remote.hostname,
        }
    }

    pub fn sock_path(&self) -> &Path {
        match self {
            Self::Local { sock_path } => sock_path,
            Self::Remote(remote) => &remote.sock_path,
        }
    }

    /// Session onto the machine running the container runtime.
    pub fn host_session_target(&self, connect_timeout: Duration) -> SessionTarget {
        match self {
            Self::Local { .. } => SessionTarget::Local,
            Self::Remote(remote) => SessionTarget::Ssh(SshTarget {
                host: remote.hostname.clone(),
                port: remote.port,
                user: remote.user.clone(),
                auth: remote.auth.clone(),
                connect_timeout,
            }),
        }
    }

    /// Session into the guest OS, through the container's forwarded SSH port.
    pub fn guest_session_target(
        &self,
        guest_ssh_port: u16,
        user: &str,
        password: &str,
        connect_timeout: Duration,
    ) -> SessionTarget {
        SessionTarget::Ssh(SshTarget {
            host: self.ui_host().to_string(),
            port: guest_ssh_port,
            user: user.to_string(),
            auth: SshAuth::Password(password.to_string()),
            connect_timeout,
        })
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    String,
    Int,
    FilePath,
}

/// One entry of the target-config form the host renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfigProperty {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub input_masked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Regex over the target name; matching targets get the field disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_predicate: Option<String>,
}

impl TargetConfigProperty {
    fn new(kind: PropertyType, description: &str) -> Self {
        Self {
            kind,
            input_masked: false,
            default_value: None,
            description: description.to_string(),
            disabled_predicate: Some("^local$".to_string()),
        }
    }
}

pub type TargetConfigManifest = BTreeMap<String, TargetConfigProperty>;

pub fn target_config_manifest() -> TargetConfigManifest {
    let mut manifest = BTreeMap::new();
    manifest.insert(
        "Sock Path".to_string(),
        TargetConfigProperty {
            default_value: Some(DEFAULT_SOCK_PATH.to_string()),
            disabled_predicate: None,
            ..TargetConfigProperty::new(
                PropertyType::FilePath,
                "Docker socket path on the target host",
            )
        },
    );
    manifest.insert(
        "Remote Hostname".to_string(),
        TargetConfigProperty::new(
            PropertyType::String,
            "Leave empty to run on this machine",
        ),
    );
    manifest.insert(
        "Remote Port".to_string(),
        TargetConfigProperty {
            default_value: Some(DEFAULT_REMOTE_PORT.to_string()),
            ..TargetConfigProperty::new(PropertyType::Int, "SSH port of the remote host")
        },
    );
    manifest.insert(
        "Remote User".to_string(),
        TargetConfigProperty::new(PropertyType::String, "SSH user on the remote host"),
    );
    manifest.insert(
        "Remote Password".to_string(),
        TargetConfigProperty {
            input_masked: true,
            ..TargetConfigProperty::new(PropertyType::String, "SSH password")
        },
    );
    manifest.insert(
        "Remote Private Key Path".to_string(),
        TargetConfigProperty::new(
            PropertyType::FilePath,
            "SSH private key; used instead of the password when both are set",
        ),
    );
    manifest
}
