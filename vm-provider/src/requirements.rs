//! Host requirement checks reported by `check-requirements`.

use serde::Serialize;
use vm_core::command_stream::is_tool_installed;
use vm_core::error::{Result, VmError};
use vm_messages::{msg, MESSAGES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementStatus {
    pub name: String,
    pub met: bool,
    pub reason: String,
}

impl RequirementStatus {
    fn new(name: &str, met: bool, reason: String) -> Self {
        Self {
            name: name.to_string(),
            met,
            reason,
        }
    }
}

/// `docker info`; the error carries Docker's own explanation.
fn docker_info() -> std::result::Result<(), String> {
    duct::cmd("docker", ["info", "--format", "{{.ServerVersion}}"])
        .stdout_null()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| e.to_string())
        .and_then(|output| {
            if output.status.success() {
                Ok(())
            } else {
                Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
            }
        })
}

/// Build the report from the probe results.
///
/// Guest logins always use a password, so `sshpass` is checked even for
/// local targets.
pub fn requirement_report(
    installed: bool,
    running: std::result::Result<(), String>,
    sshpass: bool,
) -> Vec<RequirementStatus> {
    let provider = &MESSAGES.provider;
    let mut report = vec![RequirementStatus::new(
        provider.req_docker_installed,
        installed,
        if installed {
            provider.docker_installed.to_string()
        } else {
            provider.docker_not_installed.to_string()
        },
    )];
    let running = if installed {
        running
    } else {
        Err(provider.docker_not_installed.to_string())
    };
    report.push(match running {
        Ok(()) => RequirementStatus::new(
            provider.req_docker_running,
            true,
            provider.docker_running.to_string(),
        ),
        Err(error) => RequirementStatus::new(
            provider.req_docker_running,
            false,
            msg!(provider.docker_not_running, error = error),
        ),
    });
    report.push(RequirementStatus::new(
        provider.req_sshpass_installed,
        sshpass,
        if sshpass {
            provider.sshpass_installed.to_string()
        } else {
            provider.sshpass_not_installed.to_string()
        },
    ));
    report
}

pub async fn check_requirements() -> Result<Vec<RequirementStatus>> {
    let installed = is_tool_installed("docker");
    let running = if installed {
        tokio::task::spawn_blocking(docker_info)
            .await
            .map_err(|e| VmError::Internal(format!("requirement check panicked: {}", e)))?
    } else {
        Err(String::new())
    };
    Ok(requirement_report(installed, running, is_tool_installed("sshpass")))
}
