use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vm_core::error::{Result, VmError};

/// Race `fut` against the token. Dropping the losing future kills any child
/// process it spawned.
pub async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VmError::Cancelled),
        result = fut => result,
    }
}

pub async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(VmError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(VmError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
