//! Host port management for workspace containers.
//!
//! - [`allocator`] finds free host ports (linear scan, OS ephemeral range)
//! - [`bindings`] holds the container-port to host-port map of one provisioning pass
//! - [`registry`] persists which host ports each workspace was given

pub mod allocator;
pub mod bindings;
pub mod registry;

pub use allocator::{ephemeral_port, scan_free_port, PortProbe, TcpProbe};
pub use bindings::{PortBinding, PortBindingSet};
pub use registry::{AllocationEntry, AllocationRegistry};
