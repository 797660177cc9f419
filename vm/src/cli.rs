// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "vm-guest")]
#[command(about = "Guest VM workspace provider: one subcommand per plugin operation")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Read the request JSON from this file instead of stdin
    #[arg(short, long, global = true)]
    pub request: Option<PathBuf>,

    /// Where the initialized configuration is kept (default: $VM_GUEST_STATE_DIR or the platform state dir)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Store the provider configuration from an initialize request
    Initialize,
    /// Print provider name, version and target-config manifest
    GetInfo,
    /// Print the preset target configs
    GetPresetTargetConfigs,
    /// Report whether Docker is installed and running
    CheckRequirements,
    /// Acknowledge a target (no-op)
    CreateTarget,
    /// Acknowledge a target start (no-op)
    StartTarget,
    /// Acknowledge a target stop (no-op)
    StopTarget,
    /// Acknowledge a target removal (no-op)
    DestroyTarget,
    /// Provision, boot and configure a workspace VM
    CreateWorkspace,
    /// Start a workspace VM and relaunch its agent
    StartWorkspace,
    /// Stop a workspace VM
    StopWorkspace,
    /// Remove a workspace VM and release its ports
    DestroyWorkspace,
    /// Print target metadata JSON
    GetTargetMetadata,
    /// Print workspace metadata JSON
    GetWorkspaceMetadata,
}

impl Command {
    /// Verb used in error headlines.
    pub fn operation(self) -> &'static str {
        match self {
            Command::Initialize => "initialize",
            Command::GetInfo => "get info",
            Command::GetPresetTargetConfigs => "get preset target configs",
            Command::CheckRequirements => "check requirements",
            Command::CreateTarget => "create target",
            Command::StartTarget => "start target",
            Command::StopTarget => "stop target",
            Command::DestroyTarget => "destroy target",
            Command::CreateWorkspace => "create workspace",
            Command::StartWorkspace => "start workspace",
            Command::StopWorkspace => "stop workspace",
            Command::DestroyWorkspace => "destroy workspace",
            Command::GetTargetMetadata => "get target metadata",
            Command::GetWorkspaceMetadata => "get workspace metadata",
        }
    }

    /// Whether the command reads a request body.
    pub fn takes_request(self) -> bool {
        !matches!(
            self,
            Command::GetInfo | Command::GetPresetTargetConfigs | Command::CheckRequirements
        )
    }
}
