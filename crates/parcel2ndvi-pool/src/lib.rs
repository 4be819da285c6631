// parcel2ndvi-pool - bounded-concurrency batch distribution
//
// Splits a collection into fixed-size batches and distributes the batch
// indices to a fixed set of workers over a shared work queue, tolerating
// per-batch failures without aborting the run.
//
// Two queues, both flume MPMC channels: a work queue carrying batch
// indices plus one terminal marker per worker, and a results queue
// carrying acknowledged batch indices. The coordinator blocks on a join
// barrier that releases only once every enqueued item has been
// acknowledged; after that the results queue cannot grow further.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

mod queue;
mod worker;

pub use queue::WorkItem;

/// One batch's view of the shared collection: 1-based ordinal plus the
/// slice `[(index-1)*batch_size, index*batch_size)` it covers.
#[derive(Debug)]
pub struct BatchSlice<'a, T> {
    pub index: usize,
    pub items: &'a [T],
}

/// Work done per batch. Implementations catch their own per-item
/// failures; an `Err` here skips the whole batch (logged by the worker,
/// never propagated to the coordinator's caller).
#[async_trait]
pub trait BatchProcessor<T>: Send + Sync {
    async fn process(&self, batch: BatchSlice<'_, T>) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum PoolError {
    /// The join barrier did not release within the configured timeout.
    /// Usually a worker died without acknowledging its batch.
    #[error("join barrier timed out with {outstanding} unacknowledged items")]
    JoinTimeout { outstanding: usize },
}

/// Fixed-size worker pool over a shared work queue.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    batch_size: usize,
    startup_stagger: Duration,
    join_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            workers,
            batch_size,
            startup_stagger: Duration::ZERO,
            join_timeout: None,
        }
    }

    /// Pause between worker launches, so the remote API does not see
    /// simultaneous connection setup from every worker. Not a
    /// correctness requirement.
    pub fn with_startup_stagger(mut self, stagger: Duration) -> Self {
        self.startup_stagger = stagger;
        self
    }

    /// Bound the join wait. Without a timeout, a worker crashing without
    /// acknowledging its batch hangs the run indefinitely.
    pub fn with_join_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Distribute `items` across the worker set and block until every
    /// batch index and every terminal marker has been acknowledged.
    /// Returns the acknowledged batch indices in completion order.
    pub async fn run<T, P>(
        &self,
        items: Arc<Vec<T>>,
        processor: Arc<P>,
    ) -> Result<Vec<usize>, PoolError>
    where
        T: Send + Sync + 'static,
        P: BatchProcessor<T> + 'static,
    {
        let batch_count = items.len().div_ceil(self.batch_size);

        let (work_tx, work_rx) = flume::unbounded();
        let (results_tx, results_rx) = flume::unbounded();
        let barrier = Arc::new(queue::JoinBarrier::new(batch_count + self.workers));

        for index in 1..=batch_count {
            let _ = work_tx.send(WorkItem::Batch(index));
        }
        for _ in 0..self.workers {
            let _ = work_tx.send(WorkItem::Stop);
        }
        drop(work_tx);

        info!(
            batches = batch_count,
            workers = self.workers,
            batch_size = self.batch_size,
            "dispatching batches"
        );

        let mut handles = Vec::with_capacity(self.workers);
        for worker_index in 0..self.workers {
            handles.push(tokio::spawn(worker::worker_loop(
                worker_index,
                Arc::clone(&items),
                self.batch_size,
                work_rx.clone(),
                results_tx.clone(),
                Arc::clone(&barrier),
                Arc::clone(&processor),
            )));
            if !self.startup_stagger.is_zero() && worker_index + 1 < self.workers {
                tokio::time::sleep(self.startup_stagger).await;
            }
        }
        drop(work_rx);
        drop(results_tx);

        info!("waiting for all batches to be acknowledged");
        match self.join_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, barrier.wait()).await.is_err() {
                    for handle in &handles {
                        handle.abort();
                    }
                    return Err(PoolError::JoinTimeout {
                        outstanding: barrier.outstanding(),
                    });
                }
            }
            None => barrier.wait().await,
        }
        info!("all batches acknowledged");

        let mut completed = Vec::with_capacity(batch_count);
        while let Ok(index) = results_rx.try_recv() {
            completed.push(index);
        }
        Ok(completed)
    }
}
