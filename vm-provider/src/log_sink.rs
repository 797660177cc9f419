//! Append-only progress log for one workspace.
//!
//! Every line goes to `tracing`; the host may additionally ask for a
//! per-workspace log file. Only progress lines are written here, never
//! request payloads or credentials.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use vm_core::error::Result;

#[derive(Debug)]
enum Sink {
    File(Mutex<File>),
    Memory(Arc<Mutex<Vec<String>>>),
}

#[derive(Debug)]
pub struct WorkspaceLog {
    workspace_id: String,
    sinks: Vec<Sink>,
}

impl WorkspaceLog {
    /// Log only through `tracing`.
    pub fn tracing_only(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            sinks: Vec::new(),
        }
    }

    /// Also append to `path`, creating parent directories as needed.
    pub fn open(workspace_id: impl Into<String>, path: Option<&Path>) -> Result<Self> {
        let mut log = Self::tracing_only(workspace_id);
        if let Some(path) = path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            log.sinks.push(Sink::File(Mutex::new(file)));
        }
        Ok(log)
    }

    /// Keep lines in memory; the returned handle reads them back.
    pub fn in_memory(workspace_id: impl Into<String>) -> (Self, LogCapture) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let mut log = Self::tracing_only(workspace_id);
        log.sinks.push(Sink::Memory(Arc::clone(&lines)));
        (log, LogCapture { lines })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn line(&self, text: &str) {
        let text = text.trim_end();
        info!(workspace = %self.workspace_id, "{}", text);

        for sink in &self.sinks {
            match sink {
                Sink::File(file) => {
                    let Ok(mut file) = file.lock() else { continue };
                    if let Err(e) = writeln!(file, "{}", text) {
                        warn!("Failed to write workspace log: {}", e);
                    }
                }
                Sink::Memory(lines) => {
                    if let Ok(mut lines) = lines.lock() {
                        lines.push(text.to_string());
                    }
                }
            }
        }
    }
}

/// Read side of [`WorkspaceLog::in_memory`].
#[derive(Debug, Clone)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogCapture {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}
