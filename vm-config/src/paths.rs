use std::env;
use std::path::{Path, PathBuf};

/// Name of the optional tuning file looked up under the base path.
pub const TUNING_FILE: &str = "provider.yaml";
/// Name of the persisted provider configuration in the state directory.
pub const STATE_FILE: &str = "provider-config.yaml";

/// Directory where the host adapter keeps the initialized configuration.
/// Priority order:
/// 1. VM_GUEST_STATE_DIR environment variable
/// 2. The platform state directory (falling back to local data dir)
/// 3. A directory under the system temp dir
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = env::var("VM_GUEST_STATE_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|d| d.join("vm-guest"))
        .unwrap_or_else(|| env::temp_dir().join("vm-guest"))
}

pub fn state_file(state_dir: &Path) -> PathBuf {
    state_dir.join(STATE_FILE)
}

pub fn tuning_file(base_path: &Path) -> PathBuf {
    base_path.join(TUNING_FILE)
}

/// Where forwarded remote Docker sockets live. Cleared on every initialize.
pub fn default_remote_sock_dir() -> PathBuf {
    env::temp_dir().join("target-socks")
}
