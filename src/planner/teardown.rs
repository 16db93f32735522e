//! Per-query worker pool
//!
//! Jobs that release query resources run on a small tokio runtime owned by
//! the query. Shutdown waits for submitted jobs up to a timeout; jobs still
//! running after that are abandoned to the background.
//!
//! `shutdown` blocks the calling thread and must not be called from inside
//! an async runtime.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;

use super::errors::{PlannerError, PlannerResult};

pub struct TeardownPool {
    runtime: Option<Runtime>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl TeardownPool {
    pub fn new(workers: usize) -> PlannerResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name("scan-teardown")
            .enable_time()
            .build()
            .map_err(PlannerError::worker_pool)?;
        Ok(Self {
            runtime: Some(runtime),
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Runs a blocking job on the pool
    pub fn submit<F>(&self, job: F) -> PlannerResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| PlannerError::teardown("Worker pool already shut down"))?;
        let handle = runtime.spawn_blocking(job);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }

    /// Jobs submitted and not yet awaited by `shutdown`
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.is_none()
    }

    /// Waits up to `timeout` for every submitted job, then stops the pool.
    ///
    /// A second call is a no-op.
    pub fn shutdown(&mut self, timeout: Duration) -> PlannerResult<()> {
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };
        let pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        let job_count = pending.len();

        let outcome = runtime.block_on(async move { tokio::time::timeout(timeout, join_all(pending)).await });
        runtime.shutdown_background();

        match outcome {
            Err(_) => Err(PlannerError::teardown(format!(
                "{} teardown jobs did not finish within {} ms",
                job_count,
                timeout.as_millis()
            ))),
            Ok(results) => match results.into_iter().find_map(Result::err) {
                Some(err) => Err(PlannerError::teardown(format!("Teardown job failed: {}", err))),
                None => Ok(()),
            },
        }
    }
}

impl Drop for TeardownPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
