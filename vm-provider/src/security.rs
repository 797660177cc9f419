//! Shell safety helpers for commands sent into the guest.

use once_cell::sync::Lazy;
use regex::Regex;
use vm_core::error::{Result, VmError};

static ENV_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .expect("Env name regex should compile - this is a static pattern")
});

/// Reject names that are not valid shell variable identifiers.
pub fn validate_env_name(name: &str) -> Result<()> {
    if ENV_NAME.is_match(name) {
        Ok(())
    } else {
        Err(VmError::Config(format!(
            "invalid environment variable name {:?}: use letters, digits and underscores, not starting with a digit",
            name
        )))
    }
}

/// Single-quote a value for POSIX shells.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
