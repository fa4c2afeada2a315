use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs at most one delayed task. Scheduling a new task cancels the one still
/// waiting, so only the last call within the delay window does any work.
pub struct Debouncer {
    delay: Duration,
    pending: Option<CancellationToken>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let delay = self.delay;
        self.pending = Some(token);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => task.await,
            }
        })
    }

    /// Drop the waiting task, if any. A task already past its delay finishes.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
