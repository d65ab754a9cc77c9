use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

/// Handle to a spawned background loop and its live status
pub struct TaskHandle<S> {
    status: Arc<RwLock<S>>,
    join: JoinHandle<()>,
}

impl<S: Clone> TaskHandle<S> {
    pub(crate) fn new(status: Arc<RwLock<S>>, join: JoinHandle<()>) -> Self {
        Self { status, join }
    }

    /// Snapshot of the task's status
    pub fn status(&self) -> S {
        self.status.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to stop and return its final status
    pub async fn join(self) -> S {
        if let Err(e) = self.join.await {
            tracing::error!("Background task ended abnormally: {}", e);
        }
        self.status.read().clone()
    }
}
