use crate::error::{Result, SyncError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation for a running sync. `cancel()` flips a flag
/// and wakes anything waiting in a poll or backoff sleep; the pipeline
/// checks the flag before issuing further remote calls.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Err(Cancelled) once the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep that returns early with `Cancelled` when the token fires.
pub async fn sleep_cancellable(token: &CancelToken, duration: Duration) -> Result<()> {
    let mut rx = token.watch();
    if *rx.borrow() {
        return Err(SyncError::Cancelled);
    }
    let sleeper = tokio::time::sleep(duration);
    tokio::pin!(sleeper);
    tokio::select! {
        _ = &mut sleeper => Ok(()),
        _ = wait_for_cancel(&mut rx) => Err(SyncError::Cancelled),
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        // changed() can only fail when every sender is gone, and the token
        // we borrowed still holds one
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if *rx.borrow() {
            return;
        }
    }
}
