//! Operator-facing rendering of provider errors.

use vm_core::error::VmError;
use vm_messages::errors::ErrorContext;

fn suggestions(error: &VmError) -> Vec<String> {
    let hints: &[&str] = match error {
        VmError::DockerNotRunning => &["Check the target's 'Sock Path'"],
        VmError::Dependency(dep) if dep.contains("sshpass") => {
            &["Install sshpass, or use 'Remote Private Key Path' instead of a password"]
        }
        VmError::Dependency(_) => &["Install Docker and make sure 'docker' is on PATH"],
        VmError::Connectivity(_) => &[
            "Check that Remote Login is enabled in the guest",
            "Check the target's hostname, port and credentials",
        ],
        VmError::ResourceExhausted(_) => &[
            "Free a port at or above the UI base port",
            "Raise ports.ui_scan_limit in provider.yaml",
        ],
        VmError::Timeout(_) => &["Inspect the container with 'docker ps -a' and 'docker logs'"],
        VmError::Config(msg) if msg.contains("not initialized") => &["Run 'vm-guest initialize' first"],
        VmError::Config(_) => &["Check the target options and provider.yaml"],
        VmError::Runtime { .. } => &["Inspect the container with 'docker ps -a' and 'docker logs'"],
        _ => &[],
    };
    hints.iter().map(|s| s.to_string()).collect()
}

/// `error` plus a short hint block, for stderr.
pub fn user_friendly(operation: &'static str, workspace: Option<&str>, error: &VmError) -> String {
    let context = ErrorContext {
        operation,
        workspace: workspace.map(str::to_string),
        suggestions: suggestions(error),
    };
    format!("{}: {}", context.display_headline(), error) + &context.display_hints()
}
