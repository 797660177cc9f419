//! In-guest configuration over a [`RemoteSession`].

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use vm_config::GuestSettings;
use vm_core::error::Result;
use vm_messages::{msg, MESSAGES};

use crate::cancel::until_cancelled;
use crate::log_sink::WorkspaceLog;
use crate::security::{shell_quote, validate_env_name};
use crate::session::RemoteSession;

const HOMEBREW_INSTALLER: &str =
    "https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh";

/// What a command sequence does when one command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first failure and return it.
    FailFast,
    /// Log the failure and carry on.
    BestEffort,
}

/// The fixed setup sequence, in order.
pub fn bootstrap_commands(guest: &GuestSettings) -> Vec<String> {
    vec![
        format!(
            r#"echo {} | sudo -S bash -c 'echo "{} ALL=(ALL) NOPASSWD:ALL" | sudo EDITOR="tee -a" visudo'"#,
            shell_quote(&guest.password),
            guest.user
        ),
        format!(
            r#"NONINTERACTIVE=1 /bin/bash -c "$(curl -fsSL {})" -y"#,
            HOMEBREW_INSTALLER
        ),
        format!(
            r#"echo 'eval "$(/usr/local/bin/brew shellenv)"' >> {}"#,
            guest.profile
        ),
        reload_profile(guest),
        format!("(curl -sf -L {} | sudo bash)", guest.agent_installer_url),
    ]
}

fn reload_profile(guest: &GuestSettings) -> String {
    format!("source {}", guest.profile)
}

/// One line per variable appending an `export` to the profile.
///
/// Names are validated before any line is produced; output is sorted by name.
pub fn export_commands(env: &HashMap<String, String>, profile: &str) -> Result<Vec<String>> {
    let mut vars: Vec<(&String, &String)> = env.iter().collect();
    vars.sort();
    for (name, _) in &vars {
        validate_env_name(name)?;
    }
    Ok(vars
        .into_iter()
        .map(|(name, value)| {
            let export = format!("export {}={}", name, shell_quote(value));
            format!("echo {} >> {}", shell_quote(&export), profile)
        })
        .collect())
}

/// Reload the profile and start the agent detached from the session.
pub fn agent_launch_command(guest: &GuestSettings) -> String {
    format!(
        r#"{} && osascript -e 'do shell script "daytona agent > {} 2>&1 &"'"#,
        reload_profile(guest),
        guest.agent_log
    )
}

pub struct RemoteBootstrapper<'a> {
    session: &'a dyn RemoteSession,
    log: &'a WorkspaceLog,
    cancel: &'a CancellationToken,
}

impl<'a> RemoteBootstrapper<'a> {
    pub fn new(session: &'a dyn RemoteSession, log: &'a WorkspaceLog, cancel: &'a CancellationToken) -> Self {
        Self { session, log, cancel }
    }

    /// Run `commands` in order; returns how many succeeded.
    pub async fn run_sequence(&self, commands: &[String], policy: ErrorPolicy) -> Result<usize> {
        let mut succeeded = 0;
        for command in commands {
            let result = until_cancelled(self.cancel, self.session.execute(command, Some(self.log))).await;
            match result {
                Ok(()) => succeeded += 1,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    self.log.line(&msg!(
                        MESSAGES.workspace.command_failed,
                        command = first_line(command),
                        error = e.to_string()
                    ));
                    match policy {
                        ErrorPolicy::FailFast => return Err(e),
                        ErrorPolicy::BestEffort => warn!("Continuing after failed command: {}", e),
                    }
                }
            }
        }
        Ok(succeeded)
    }

    /// Full first-boot setup: base tooling, agent install, then the
    /// workspace's environment variables.
    pub async fn configure(&self, guest: &GuestSettings, env: &HashMap<String, String>) -> Result<()> {
        // Reject bad names before touching the guest.
        let exports = export_commands(env, &guest.profile)?;

        self.log.line(MESSAGES.workspace.configuring_guest);
        self.run_sequence(&bootstrap_commands(guest), ErrorPolicy::FailFast)
            .await?;

        self.log.line(MESSAGES.workspace.setting_env_vars);
        self.run_sequence(&exports, ErrorPolicy::FailFast).await?;
        self.run_sequence(&[reload_profile(guest)], ErrorPolicy::FailFast)
            .await?;
        Ok(())
    }

    /// Best effort: a failed launch is logged, not returned.
    pub async fn launch_agent(&self, guest: &GuestSettings) -> Result<bool> {
        let launched = self
            .run_sequence(&[agent_launch_command(guest)], ErrorPolicy::BestEffort)
            .await?;
        if launched == 1 {
            self.log.line(MESSAGES.workspace.agent_started);
        }
        Ok(launched == 1)
    }
}

fn first_line(command: &str) -> &str {
    command.lines().next().unwrap_or(command)
}
