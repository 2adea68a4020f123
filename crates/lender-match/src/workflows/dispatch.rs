use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bounded pool for background workflows.
///
/// Each spawned workflow waits for a permit before it runs, so at most
/// `limit` workflows execute at once. Work that has not started yet is not
/// durable; callers persist a `Processing` record before dispatching and
/// re-dispatch those records on startup.
#[derive(Debug, Clone)]
pub struct WorkflowDispatcher {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl WorkflowDispatcher {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn spawn<F>(&self, workflow: &'static str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(workflow, "dispatcher closed before workflow started");
                return;
            };
            debug!(workflow, "workflow started");
            future.await;
        })
    }
}

impl Default for WorkflowDispatcher {
    fn default() -> Self {
        Self::new(4)
    }
}
