use crate::cancel::{sleep_cancellable, CancelToken};
use crate::error::{Result, SyncError};
use std::future::Future;
use std::time::Duration;

/// Backoff policy for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn from_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Exponential delay for the given attempt, except that a wait the
    /// remote asked for wins. Capped at `max_delay_ms` either way.
    fn delay_for(&self, err: &SyncError, attempt: u32) -> Duration {
        let ms = match err.retry_after() {
            Some(secs) => secs.saturating_mul(1000),
            None => self.base_delay_ms.saturating_mul(1u64 << attempt.min(16)),
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

/// Run an idempotent operation, retrying transient failures with backoff.
/// Anything non-transient, and cancellation, pass straight through. Only
/// idempotent requests belong here; a replayed mutation can double-apply.
pub async fn retry_transient<T, F, Fut>(
    cfg: &RetryConfig,
    cancel: &CancelToken,
    op_name: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        cancel.check()?;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < cfg.max_retries => {
                let delay = cfg.delay_for(&e, attempt);
                attempt += 1;
                log::warn!(
                    "{} failed ({}); retry {}/{} in {:?}",
                    op_name,
                    e,
                    attempt,
                    cfg.max_retries,
                    delay
                );
                sleep_cancellable(cancel, delay).await?;
            }
            Err(e) => return Err(e),
        }
    }
}
