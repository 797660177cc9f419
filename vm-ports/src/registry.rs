//! Persisted host-port allocations per workspace.
//!
//! Stopped workspaces keep their container (and its port bindings), so the
//! UI port scan has to know about them even though nothing is listening.

// Standard library
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// External crates
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub ui_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_port: Option<u16>,
    pub allocated_at: DateTime<Utc>,
}

impl AllocationEntry {
    pub fn new(ui_port: u16, api_port: Option<u16>) -> Self {
        Self {
            ui_port,
            api_port,
            allocated_at: Utc::now(),
        }
    }

    fn ports(&self) -> impl Iterator<Item = u16> {
        std::iter::once(self.ui_port).chain(self.api_port)
    }
}

/// JSON file mapping workspace id to its allocated host ports.
#[derive(Debug, Default)]
pub struct AllocationRegistry {
    entries: HashMap<String, AllocationEntry>,
    registry_path: PathBuf,
}

impl AllocationRegistry {
    /// Load the registry at `path`, starting empty when the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read allocation registry: {:?}", path))?;
            parse_entries(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            entries,
            registry_path: path.to_path_buf(),
        })
    }

    pub fn get(&self, workspace_id: &str) -> Option<&AllocationEntry> {
        self.entries.get(workspace_id)
    }

    /// Host ports held by every workspace except `exclude`.
    pub fn reserved_ports(&self, exclude: Option<&str>) -> BTreeSet<u16> {
        self.entries
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != exclude)
            .flat_map(|(_, entry)| entry.ports())
            .collect()
    }

    pub fn record(&mut self, workspace_id: &str, entry: AllocationEntry) -> Result<()> {
        self.atomic_update(|entries| {
            entries.insert(workspace_id.to_string(), entry);
            Ok(())
        })
    }

    /// Drop a workspace's entry. Returns what was removed, if anything.
    pub fn release(&mut self, workspace_id: &str) -> Result<Option<AllocationEntry>> {
        let mut removed = None;
        self.atomic_update(|entries| {
            removed = entries.remove(workspace_id);
            Ok(())
        })?;
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-modify-write under an exclusive file lock, so concurrent
    /// provider processes never lose each other's entries.
    fn atomic_update<F>(&mut self, update_fn: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, AllocationEntry>) -> Result<()>,
    {
        if let Some(parent) = self.registry_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create registry directory: {:?}", parent))?;
            }
        }

        // Lock a sidecar file: the registry itself is replaced by rename.
        let lock_path = self.registry_path.with_extension("json.lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open registry lock file: {:?}", lock_path))?;

        const RETRY_DELAY: Duration = Duration::from_millis(10);
        const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

        let lock_start = Instant::now();
        let mut attempts = 0;
        loop {
            match lock_file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) => {
                    attempts += 1;
                    if lock_start.elapsed() > LOCK_TIMEOUT {
                        return Err(anyhow::anyhow!(
                            "Timeout waiting for exclusive lock on allocation registry after {} attempts: {}",
                            attempts,
                            e
                        ));
                    }
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }

        let _guard = scopeguard::guard((), |_| {
            let _ = lock_file.unlock();
        });

        let content = match fs::read_to_string(&self.registry_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read allocation registry: {:?}", self.registry_path)
                })
            }
        };
        let mut entries = parse_entries(&content)?;

        update_fn(&mut entries)?;

        let json_content = serde_json::to_string_pretty(&entries)
            .with_context(|| "Failed to serialize allocation registry")?;

        let temp_path = self
            .registry_path
            .with_extension(format!("json.tmp.{}", std::process::id()));
        fs::write(&temp_path, &json_content)
            .with_context(|| format!("Failed to write temporary file: {:?}", temp_path))?;
        fs::rename(&temp_path, &self.registry_path)
            .with_context(|| "Failed to atomically rename temporary file")?;

        debug!(
            "Allocation registry updated ({} entries) at {:?}",
            entries.len(),
            self.registry_path
        );
        self.entries = entries;
        Ok(())
    }
}

fn parse_entries(content: &str) -> Result<HashMap<String, AllocationEntry>> {
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_json::from_str(content).with_context(|| "Failed to parse allocation registry JSON")
}
