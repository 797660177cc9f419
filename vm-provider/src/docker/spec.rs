//! Container launch specification for a guest VM.

use std::collections::{BTreeMap, BTreeSet};

use vm_config::GuestSettings;
use vm_ports::{PortBinding, PortBindingSet};

use crate::workspace::WorkspaceDescriptor;

/// Guest SSH.
pub const GUEST_SSH_PORT: u16 = 22;
/// Second guest control port, forwarded one-to-one.
pub const GUEST_CONTROL_PORT: u16 = 2222;
/// Web viewer for the guest display.
pub const GUEST_UI_PORT: u16 = 8006;
/// Agent toolbox API inside the guest.
pub const GUEST_TOOLBOX_PORT: u16 = 2280;

pub const LABEL_TARGET_ID: &str = "vm.target.id";
pub const LABEL_WORKSPACE_ID: &str = "vm.workspace.id";
pub const LABEL_REPOSITORY_URL: &str = "vm.workspace.repository.url";
pub const LABEL_TOOLBOX_HOST_PORT: &str = "vm.toolbox.api.hostPort";

const ENTRYPOINT: [&str; 3] = ["/usr/bin/tini", "-s", "/run/entry.sh"];
const DEVICES: [&str; 2] = ["/dev/kvm", "/dev/net/tun"];
const CAPABILITIES: [&str; 2] = ["NET_ADMIN", "SYS_ADMIN"];
const EXTRA_HOSTS: [&str; 1] = ["host.docker.internal:host-gateway"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub hostname: String,
    pub user: String,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    pub exposed_ports: BTreeSet<u16>,
    pub port_bindings: Vec<PortBinding>,
    pub entrypoint: Vec<String>,
    pub devices: Vec<String>,
    pub cap_add: Vec<String>,
    pub extra_hosts: Vec<String>,
    pub privileged: bool,
    pub stop_timeout_secs: u32,
}

/// Network arguments for the VM: user-mode NIC with guest ports forwarded.
pub fn guest_network_arguments(with_toolbox: bool) -> String {
    let mut forwards = vec![
        format!("hostfwd=tcp::{0}-:{0}", GUEST_SSH_PORT),
        format!("hostfwd=tcp::{0}-:{0}", GUEST_CONTROL_PORT),
    ];
    if with_toolbox {
        forwards.push(format!("hostfwd=tcp::{0}-:{0}", GUEST_TOOLBOX_PORT));
    }
    format!(
        "-device e1000,netdev=net0 -netdev user,id=net0,{}",
        forwards.join(",")
    )
}

/// Derive the launch spec. Same inputs, same output: environment entries
/// are emitted sorted by key.
pub fn build_container_spec(
    workspace: &WorkspaceDescriptor,
    bindings: &PortBindingSet,
    toolbox_host_port: Option<u16>,
    guest: &GuestSettings,
    stop_timeout_secs: u32,
) -> ContainerSpec {
    let mut env = vec![format!(
        "ARGUMENTS={}",
        guest_network_arguments(toolbox_host_port.is_some())
    )];
    let mut vars: Vec<(&String, &String)> = workspace.env_vars.iter().collect();
    vars.sort();
    env.extend(vars.into_iter().map(|(k, v)| format!("{}={}", k, v)));

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_TARGET_ID.to_string(), workspace.target_id.clone());
    labels.insert(LABEL_WORKSPACE_ID.to_string(), workspace.id.clone());
    labels.insert(
        LABEL_REPOSITORY_URL.to_string(),
        workspace.repository.url.clone(),
    );

    let mut exposed_ports: BTreeSet<u16> = [GUEST_SSH_PORT, GUEST_CONTROL_PORT].into();
    if let Some(port) = toolbox_host_port {
        labels.insert(LABEL_TOOLBOX_HOST_PORT.to_string(), port.to_string());
        exposed_ports.insert(GUEST_TOOLBOX_PORT);
    }

    ContainerSpec {
        image: guest.image.clone(),
        hostname: workspace.id.clone(),
        user: "root".to_string(),
        labels,
        env,
        exposed_ports,
        port_bindings: bindings.iter().collect(),
        entrypoint: ENTRYPOINT.iter().map(|s| s.to_string()).collect(),
        devices: DEVICES.iter().map(|s| s.to_string()).collect(),
        cap_add: CAPABILITIES.iter().map(|s| s.to_string()).collect(),
        extra_hosts: EXTRA_HOSTS.iter().map(|s| s.to_string()).collect(),
        privileged: true,
        stop_timeout_secs,
    }
}
