use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VmError {
    Config(String),
    Io(#[from] std::io::Error),
    /// A container runtime call failed. `stage` names the step that was running.
    Runtime {
        stage: String,
        message: String,
    },
    Connectivity(String),
    /// A command ran to completion but exited unsuccessfully.
    Command {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    Timeout(String),
    Cancelled,
    ResourceExhausted(String),
    Dependency(String),
    Serialization(String),
    Internal(String),
    DockerNotRunning,
    Other(#[from] anyhow::Error),
}

impl VmError {
    pub fn runtime(stage: impl Into<String>, message: impl Display) -> Self {
        VmError::Runtime {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Re-wrap an error with the stage that was running when it happened.
    ///
    /// Cancellation and timeouts pass through untouched so callers can still
    /// tell them apart from ordinary runtime failures.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            VmError::Cancelled | VmError::Timeout(_) | VmError::Runtime { .. } => self,
            other => VmError::runtime(stage, other),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VmError::Cancelled)
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            VmError::Config(s) => write!(f, "Configuration error: {}", s),
            VmError::Io(e) => write!(f, "I/O error: {}", e),
            VmError::Runtime { stage, message } => {
                write!(f, "Container runtime error while {}: {}", stage, message)
            }
            VmError::Connectivity(s) => write!(f, "Connection error: {}", s),
            VmError::Command {
                command,
                status,
                stderr,
            } => {
                match status {
                    Some(code) => write!(f, "Command exited with status {}: {}", code, command)?,
                    None => write!(f, "Command terminated by signal: {}", command)?,
                }
                if !stderr.trim().is_empty() {
                    write!(f, "\n\nOutput (last 50 lines):\n{}", stderr.trim_end())?;
                }
                Ok(())
            }
            VmError::Timeout(s) => write!(f, "Timed out: {}", s),
            VmError::Cancelled => write!(f, "Operation cancelled"),
            VmError::ResourceExhausted(s) => write!(f, "Resource allocation failed: {}", s),
            VmError::Dependency(s) => write!(f, "Dependency not found: {}", s),
            VmError::Serialization(s) => write!(f, "Serialization error: {}", s),
            VmError::Internal(s) => write!(f, "Internal error: {}", s),
            VmError::DockerNotRunning => {
                write!(f, "Docker daemon is not running\n\n")?;
                write!(f, "Fix:\n")?;
                write!(f, "  • Start Docker Desktop, or\n")?;
                write!(f, "  • Run: sudo systemctl start docker\n")?;
                write!(f, "  • Verify: docker ps")
            }
            VmError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl From<serde_yaml_ng::Error> for VmError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        VmError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for VmError {
    fn from(err: serde_json::Error) -> Self {
        VmError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VmError>;
