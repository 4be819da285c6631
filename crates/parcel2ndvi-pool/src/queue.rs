//! Work-queue items and the join barrier

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// A unit of work: a 1-based batch ordinal, or the terminal marker that
/// tells one worker to stop. One `Stop` is enqueued per worker at setup,
/// so each worker detects end-of-work on its own without a shared flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    Batch(usize),
    Stop,
}

/// Counts outstanding queue items; releases waiters once every enqueued
/// item has been acknowledged exactly once.
#[derive(Debug)]
pub(crate) struct JoinBarrier {
    outstanding: AtomicUsize,
    notify: Notify,
}

impl JoinBarrier {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            outstanding: AtomicUsize::new(count),
            notify: Notify::new(),
        }
    }

    /// Mark one item done. Must be called exactly once per enqueued item.
    pub(crate) fn acknowledge(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Resolves once the outstanding count reaches zero.
    pub(crate) async fn wait(&self) {
        loop {
            let mut notified = std::pin::pin!(self.notify.notified());
            // register before re-checking, so an acknowledge landing
            // between the check and the await cannot be missed
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
