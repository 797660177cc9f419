use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-interval polling bound.
///
/// `max_elapsed: None` polls until the condition holds or the operation is
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_elapsed: Option<Duration>) -> Self {
        Self {
            interval,
            max_elapsed,
        }
    }

    /// Whether another attempt may start after `elapsed` has passed.
    pub fn allows(&self, elapsed: Duration) -> bool {
        match self.max_elapsed {
            Some(limit) => elapsed < limit,
            None => true,
        }
    }

    /// Human-readable bound, for error messages.
    pub fn describe(&self) -> String {
        match self.max_elapsed {
            Some(limit) => format!("{}s", limit.as_secs()),
            None => "no limit".to_string(),
        }
    }
}

/// On-disk form of a [`RetryPolicy`], in whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    pub interval_secs: u64,
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.interval_secs),
            self.max_elapsed_secs.map(Duration::from_secs),
        )
    }
}
