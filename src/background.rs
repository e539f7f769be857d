use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::{debug, error};

/// Fire-and-forget work detached from the request that started it.
#[derive(Clone, Default)]
pub struct Background {
    tracker: TaskTracker,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures are logged, never returned to the caller.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            match task.await {
                Ok(()) => debug!(task = name, "background task finished"),
                Err(e) => error!(task = name, error = ?e, "background task failed"),
            }
        });
    }

    /// Waits for every task spawned so far.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }
}
