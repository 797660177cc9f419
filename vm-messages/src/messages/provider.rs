//! Provider-level text: requirement checks and info labels.

pub struct ProviderMessages {
    pub label: &'static str,
    pub req_docker_installed: &'static str,
    pub req_docker_running: &'static str,
    pub docker_installed: &'static str,
    pub docker_not_installed: &'static str,
    pub docker_running: &'static str,
    pub docker_not_running: &'static str,
    pub req_sshpass_installed: &'static str,
    pub sshpass_installed: &'static str,
    pub sshpass_not_installed: &'static str,
}

pub const PROVIDER_MESSAGES: ProviderMessages = ProviderMessages {
    label: "macOS",
    req_docker_installed: "Docker installed",
    req_docker_running: "Docker running",
    docker_installed: "Docker is installed",
    docker_not_installed: "Docker is not installed",
    docker_running: "Docker is running",
    docker_not_running: "Docker is not running. Error: {error}",
    req_sshpass_installed: "sshpass installed",
    sshpass_installed: "sshpass is installed",
    sshpass_not_installed: "sshpass is not installed; it is needed for the guest's password login",
};
