//! Central registry for all operator-facing message templates.
//!
//! - `workspace` - lines written to a workspace's log sink during create/start
//! - `provider` - requirement checks and plugin-level status text
//!
//! ```rust
//! use vm_messages::MESSAGES;
//!
//! let line = MESSAGES.workspace.remote_login_reminder;
//! let name = MESSAGES.provider.req_docker_installed;
//! ```

mod provider;
mod workspace;

pub use provider::{ProviderMessages, PROVIDER_MESSAGES};
pub use workspace::{WorkspaceMessages, WORKSPACE_MESSAGES};

pub struct Messages {
    pub workspace: WorkspaceMessages,
    pub provider: ProviderMessages,
}

pub const MESSAGES: Messages = Messages {
    workspace: WORKSPACE_MESSAGES,
    provider: PROVIDER_MESSAGES,
};
