//! Worker lifecycle: dequeue, process, acknowledge

use std::sync::Arc;

use flume::{Receiver, Sender};
use tracing::{error, info};

use crate::queue::{JoinBarrier, WorkItem};
use crate::{BatchProcessor, BatchSlice};

/// One worker's loop. Blocks only on the work queue; stops on the first
/// terminal marker it dequeues. Results are pushed before the work item
/// is acknowledged, so the barrier releasing implies the results queue is
/// complete.
pub(crate) async fn worker_loop<T, P>(
    worker: usize,
    items: Arc<Vec<T>>,
    batch_size: usize,
    work_rx: Receiver<WorkItem>,
    results_tx: Sender<usize>,
    barrier: Arc<JoinBarrier>,
    processor: Arc<P>,
) where
    T: Send + Sync + 'static,
    P: BatchProcessor<T> + 'static,
{
    info!(worker, "worker started");

    while let Ok(item) = work_rx.recv_async().await {
        match item {
            WorkItem::Stop => {
                barrier.acknowledge();
                break;
            }
            WorkItem::Batch(index) => {
                let start = (index - 1) * batch_size;
                let end = (start + batch_size).min(items.len());
                info!(worker, batch = index, parcels = end - start, "processing batch");

                let slice = BatchSlice {
                    index,
                    items: &items[start..end],
                };
                if let Err(err) = processor.process(slice).await {
                    error!(
                        worker,
                        batch = index,
                        error = format!("{err:#}"),
                        "batch failed, skipping"
                    );
                }

                let _ = results_tx.send(index);
                barrier.acknowledge();
            }
        }
    }

    info!(worker, "worker stopped");
}
