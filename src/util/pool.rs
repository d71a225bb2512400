use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::{Error, Result};

/// Bounded set of workers on the shared tokio runtime: every submitted job runs as its own task,
///  but at most `size` of them execute at the same time.
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
}
impl WorkerPool {
    pub fn new(name: &'static str, size: usize) -> WorkerPool {
        let size = size.max(1);
        WorkerPool {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// number of jobs currently executing
    pub fn busy(&self) -> usize {
        self.size - self.permits.available_permits().min(self.size)
    }

    pub fn submit<T, F>(&self, job: F) -> JoinHandle<Result<T>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = self.permits.clone();
        let name = self.name;
        tokio::spawn(async move {
            let _permit = permits.acquire_owned()
                .await
                .map_err(|_| Error::PoolClosed(name))?;
            trace!("running job in pool {}", name);
            job.await
        })
    }

    /// Jobs submitted or still waiting for a worker after shutdown fail with `PoolClosed`; running
    ///  jobs are not interrupted.
    pub fn shutdown(&self) {
        self.permits.close();
    }
}
