//! Workspace lifecycle lines (create, start, stop, destroy).

pub struct WorkspaceMessages {
    // ============================================================================
    // Create
    // ============================================================================
    pub pulling_image: &'static str,
    pub image_present: &'static str,
    pub reusing_container: &'static str,
    pub ui_visit: &'static str,
    pub default_credentials: &'static str,
    pub remote_login_reminder: &'static str,
    pub configuring_guest: &'static str,
    pub setting_env_vars: &'static str,

    // ============================================================================
    // Start
    // ============================================================================
    pub already_running: &'static str,
    pub agent_started: &'static str,
    pub command_failed: &'static str,

    // ============================================================================
    // Stop / Destroy
    // ============================================================================
    pub stopped: &'static str,
    pub destroyed: &'static str,
    pub not_found: &'static str,
}

pub const WORKSPACE_MESSAGES: WorkspaceMessages = WorkspaceMessages {
    pulling_image: "Pulling image {image}...",
    image_present: "Image {image} already present",
    reusing_container: "Reusing existing container {name}",
    ui_visit: "Visit http://{host}:{port} and Set up MacOS",
    default_credentials: "Set USERNAME \"{user}\" and PASSWORD \"{password}\"",
    remote_login_reminder: "Please turn on Remote Login to continue.....",
    configuring_guest: "Configuring MacOS",
    setting_env_vars: "Setting up environment variables",

    already_running: "Container {name} is already running",
    agent_started: "Daytona agent started",
    command_failed: "failed to execute command {command}: {error}",

    stopped: "Container {name} stopped",
    destroyed: "Container {name} removed",
    not_found: "Container {name} not found, nothing to do",
};
