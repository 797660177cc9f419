//! Container-port to host-port map for one provisioning pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vm_core::error::{Result, VmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub container_port: u16,
    pub host_port: u16,
}

impl PortBinding {
    /// Docker `-p` form, published on all interfaces.
    pub fn publish_arg(&self) -> String {
        format!("0.0.0.0:{}:{}/tcp", self.host_port, self.container_port)
    }
}

/// Built incrementally; a host port is never handed to two container ports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortBindingSet {
    bindings: BTreeMap<u16, u16>,
}

impl PortBindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, container_port: u16, host_port: u16) -> Result<()> {
        if let Some(existing) = self.bindings.get(&container_port) {
            return Err(VmError::ResourceExhausted(format!(
                "container port {} is already bound to host port {}",
                container_port, existing
            )));
        }
        if let Some(owner) = self.container_port_for(host_port) {
            return Err(VmError::ResourceExhausted(format!(
                "host port {} is already bound to container port {}",
                host_port, owner
            )));
        }
        self.bindings.insert(container_port, host_port);
        Ok(())
    }

    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.bindings.get(&container_port).copied()
    }

    pub fn uses_host_port(&self, host_port: u16) -> bool {
        self.container_port_for(host_port).is_some()
    }

    fn container_port_for(&self, host_port: u16) -> Option<u16> {
        self.bindings
            .iter()
            .find(|(_, host)| **host == host_port)
            .map(|(container, _)| *container)
    }

    /// Bindings ordered by container port.
    pub fn iter(&self) -> impl Iterator<Item = PortBinding> + '_ {
        self.bindings.iter().map(|(c, h)| PortBinding {
            container_port: *c,
            host_port: *h,
        })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
