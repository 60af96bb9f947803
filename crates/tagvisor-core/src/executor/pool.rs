use tagvisor_model::ExecutorConfig;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::CoreError;

/// Blocking worker pool backed by a tokio runtime.
///
/// Units are queued FIFO on the runtime's blocking pool. An owned runtime
/// caps that pool at `workers` threads and keeps one async worker to drive
/// timers and futures passed to `TaskContext::block_on`.
pub(crate) struct WorkerPool {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl WorkerPool {
    pub(crate) fn owned(config: &ExecutorConfig) -> Result<Self, CoreError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.workers)
            .thread_name(config.thread_name.clone())
            .thread_keep_alive(config.keep_alive())
            .enable_all()
            .build()?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Run units on a runtime owned by the caller.
    pub(crate) fn shared(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
        }
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn submit<F>(&self, unit: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The join handle is not needed: units report through their handler.
        drop(self.handle.spawn_blocking(unit));
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn owned_pool_runs_units_on_named_threads() {
        let config = ExecutorConfig::default()
            .with_workers(2)
            .with_thread_name("pool-test");
        let pool = WorkerPool::owned(&config).unwrap();

        let (tx, rx) = mpsc::channel();
        pool.submit(move || {
            tx.send(std::thread::current().name().map(str::to_string))
                .unwrap();
        });

        let name = rx.recv().unwrap();
        assert_eq!(name.as_deref(), Some("pool-test"));
    }

    #[test]
    fn single_worker_runs_units_in_order() {
        let pool = WorkerPool::owned(&ExecutorConfig::default().with_workers(1)).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..4 {
            let tx = tx.clone();
            pool.submit(move || tx.send(i).unwrap());
        }
        let got: Vec<i32> = (0..4).map(|_| rx.recv().unwrap()).collect();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }
}
