//! Container runtime access.
//!
//! [`ContainerRuntime`] is the seam the provisioner works against;
//! [`DockerCli`] implements it with the `docker` client, pointed either at a
//! local socket or at a remote daemon's socket forwarded over SSH.

pub mod cli;
pub mod command;
pub mod registry;
pub mod runtime;
pub mod spec;

pub use cli::DockerCli;
pub use command::DockerCommand;
pub use registry::{find_registry_for_image, RegistryAuth};
pub use runtime::{ContainerHandle, ContainerRuntime};
pub use spec::{build_container_spec, ContainerSpec};
