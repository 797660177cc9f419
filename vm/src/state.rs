//! The configuration `initialize` stores for later invocations.

use std::path::{Path, PathBuf};

use tracing::debug;
use vm_config::{paths, ProviderConfig};
use vm_core::error::Result;

pub struct ProviderState {
    state_dir: PathBuf,
}

impl ProviderState {
    pub fn new(state_dir: Option<&Path>) -> Self {
        Self {
            state_dir: state_dir.map(Path::to_path_buf).unwrap_or_else(paths::state_dir),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        paths::state_file(&self.state_dir)
    }

    pub fn load(&self) -> Result<ProviderConfig> {
        let path = self.config_path();
        debug!("Loading provider config from {}", path.display());
        ProviderConfig::load_from_path(&path)
    }

    pub fn save(&self, config: &ProviderConfig) -> Result<()> {
        config.save_to_path(&self.config_path())
    }
}
