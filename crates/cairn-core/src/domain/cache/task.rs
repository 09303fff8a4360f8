//! Handles for cache background tasks

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// A spawned background task with cancellation and completion signaling
#[derive(Debug)]
pub struct TaskHandle<T = ()> {
    cancel: CancellationToken,
    join: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(cancel: CancellationToken, join: JoinHandle<T>) -> Self {
        Self { cancel, join }
    }

    /// Ask the task to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task to complete on its own
    pub async fn wait(self) -> Result<T> {
        self.join
            .await
            .map_err(|e| Error::Other(format!("Background task failed: {}", e)))
    }

    /// Cancel the task and wait for it to stop
    pub async fn shutdown(self) -> Result<T> {
        self.cancel.cancel();
        self.wait().await
    }
}

/// Handle for the periodic expiry sweep
pub type SweeperHandle = TaskHandle<()>;

/// Handle for the event-driven invalidation task
pub type InvalidatorHandle = TaskHandle<()>;
