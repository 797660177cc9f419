//! Host port planning for one provisioning pass.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use vm_config::PortSettings;
use vm_core::error::Result;
use vm_ports::{scan_free_port, PortBindingSet, PortProbe};

use crate::docker::spec::{GUEST_CONTROL_PORT, GUEST_SSH_PORT, GUEST_TOOLBOX_PORT, GUEST_UI_PORT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPorts {
    pub bindings: PortBindingSet,
    pub ui_port: u16,
    /// Host port for the agent toolbox API; local targets only.
    pub api_port: Option<u16>,
}

/// Build the binding set: two fixed control ports, the first free UI port at
/// or above the base, and (local targets only) an ephemeral API port.
///
/// `reserved` holds host ports other workspaces already own. A failed
/// ephemeral request is logged and the API binding is left out.
pub fn plan_port_bindings<E>(
    ports: &PortSettings,
    is_local: bool,
    probe: &dyn PortProbe,
    reserved: &BTreeSet<u16>,
    ephemeral: E,
) -> Result<PlannedPorts>
where
    E: FnOnce() -> std::io::Result<u16>,
{
    let mut bindings = PortBindingSet::new();
    bindings.bind(GUEST_SSH_PORT, ports.ssh_host_port)?;
    bindings.bind(GUEST_CONTROL_PORT, ports.control_host_port)?;

    let ui_port = scan_free_port(ports.ui_base_port, ports.ui_scan_limit, probe, |port| {
        bindings.uses_host_port(port) || reserved.contains(&port)
    })?;
    bindings.bind(GUEST_UI_PORT, ui_port)?;
    debug!("UI port {} selected", ui_port);

    let api_port = if is_local {
        match ephemeral() {
            Ok(port) if !bindings.uses_host_port(port) => {
                bindings.bind(GUEST_TOOLBOX_PORT, port)?;
                Some(port)
            }
            Ok(port) => {
                warn!("Ephemeral port {} collides with a fixed binding, skipping toolbox API", port);
                None
            }
            Err(e) => {
                warn!("Could not reserve a toolbox API port: {}", e);
                None
            }
        }
    } else {
        None
    };

    Ok(PlannedPorts {
        bindings,
        ui_port,
        api_port,
    })
}
