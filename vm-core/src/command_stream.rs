// Standard library
use std::process::{ExitStatus, Stdio};

// External crates
use crate::error::{Result, VmError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;
use which::which;

/// Number of trailing output lines kept in command error reports.
const ERROR_CONTEXT_LINES: usize = 50;

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Turn a non-zero exit into `VmError::Command`, keeping the tail of the output.
    pub fn into_result(self, full_command: &str) -> Result<CommandOutput> {
        if self.status.success() {
            return Ok(self);
        }

        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        Err(VmError::Command {
            command: full_command.to_string(),
            status: self.status.code(),
            stderr: tail_lines(source, ERROR_CONTEXT_LINES),
        })
    }
}

/// Render a command the way a user would type it, for logs and error messages.
pub fn describe(command: &Command) -> String {
    let std_cmd = command.as_std();
    let mut parts = vec![std_cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(
        std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned()),
    );
    parts.join(" ")
}

/// Run a command to completion, handing every stdout/stderr line to `on_line`
/// as it arrives. The exit status is returned, not checked.
pub async fn stream_command<F>(mut command: Command, mut on_line: F) -> Result<CommandOutput>
where
    F: FnMut(&str) + Send,
{
    let full_command = describe(&command);
    debug!("Executing: {}", full_command);

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VmError::Dependency(format!("'{}' is not installed", full_command))
            } else {
                VmError::Internal(format!("Failed to start command '{}': {}", full_command, e))
            }
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| VmError::Internal("child stdout was not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| VmError::Internal("child stderr was not captured".into()))?;

    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut captured_out = String::new();
    let mut captured_err = String::new();
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => match line? {
                Some(line) => {
                    on_line(&line);
                    captured_out.push_str(&line);
                    captured_out.push('\n');
                }
                None => out_done = true,
            },
            line = err_lines.next_line(), if !err_done => match line? {
                Some(line) => {
                    on_line(&line);
                    captured_err.push_str(&line);
                    captured_err.push('\n');
                }
                None => err_done = true,
            },
        }
    }

    let status = child.wait().await?;
    Ok(CommandOutput {
        status,
        stdout: captured_out,
        stderr: captured_err,
    })
}

/// Checks if a command-line tool is available in the system's PATH.
pub fn is_tool_installed(tool_name: &str) -> bool {
    which(tool_name).is_ok()
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines_keeps_last_lines() {
        let text = (1..=60).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 50);
        assert_eq!(tail.lines().count(), 50);
        assert!(tail.starts_with("11"));
        assert!(tail.ends_with("60"));
    }

    #[test]
    fn test_describe_joins_program_and_args() {
        let mut cmd = Command::new("docker");
        cmd.args(["inspect", "--format", "{{json .State}}", "box"]);
        assert_eq!(describe(&cmd), "docker inspect --format {{json .State}} box");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_command_collects_both_streams() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2"]);
        let mut seen = Vec::new();
        let output = stream_command(cmd, |line| seen.push(line.to_string()))
            .await
            .expect("sh should run");

        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(seen.len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_becomes_command_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo nope 1>&2; exit 3"]);
        let full_command = describe(&cmd);
        let output = stream_command(cmd, |_| {}).await.expect("sh should run");
        match output.into_result(&full_command) {
            Err(VmError::Command { status, stderr, .. }) => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("expected command error, got {:?}", other),
        }
    }

    #[test]
    fn test_is_tool_installed_rejects_missing_tool() {
        assert!(!is_tool_installed("definitely-not-a-real-tool-1234"));
    }
}
