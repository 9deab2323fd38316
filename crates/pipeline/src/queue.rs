//! Bounded task queue with completion tracking
//!
//! An empty queue does not mean the work is done: a worker may hold a task it
//! has dequeued but not finished. Every dequeued task therefore travels with a
//! [`QueuedTask`] guard, and [`QueueTracker::join`] waits until every enqueued
//! task's guard has been dropped.

use crate::task::Task;
use ferry_errors::Error;
use ferry_types::CrateId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicUsize,
    peak: AtomicUsize,
    enqueued: AtomicU64,
    idle: Notify,
}

impl Shared {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Create a queue holding at most `capacity` tasks
///
/// A capacity of zero is raised to one.
#[must_use]
pub fn task_queue(capacity: usize) -> (QueueSender, QueueReceiver, QueueTracker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared::default());
    (
        QueueSender {
            tx,
            shared: Arc::clone(&shared),
            keys: HashSet::new(),
        },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
            shared: Arc::clone(&shared),
        },
        QueueTracker { shared },
    )
}

/// Result of offering a task to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Already enqueued earlier in this run; dropped
    Duplicate,
}

/// Producer half. Suspends when the queue is full.
#[derive(Debug)]
pub struct QueueSender {
    tx: mpsc::Sender<Task>,
    shared: Arc<Shared>,
    keys: HashSet<CrateId>,
}

impl QueueSender {
    /// Whether `id` was already enqueued by this sender
    #[must_use]
    pub fn contains(&self, id: &CrateId) -> bool {
        self.keys.contains(id)
    }

    /// Enqueue a task, waiting for room
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if every receiver is gone.
    pub async fn enqueue(&mut self, task: Task) -> Result<Enqueued, Error> {
        if !self.begin(&task.id) {
            return Ok(Enqueued::Duplicate);
        }
        let sent = self.tx.send(task).await.is_ok();
        self.settle(sent)
    }

    /// Blocking variant of [`enqueue`](Self::enqueue) for producers running
    /// on a blocking thread
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if every receiver is gone.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_enqueue(&mut self, task: Task) -> Result<Enqueued, Error> {
        if !self.begin(&task.id) {
            return Ok(Enqueued::Duplicate);
        }
        let sent = self.tx.blocking_send(task).is_ok();
        self.settle(sent)
    }

    fn begin(&mut self, id: &CrateId) -> bool {
        if !self.keys.insert(id.clone()) {
            return false;
        }
        // Counted before the send so join never observes zero with a task in flight.
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn settle(&self, sent: bool) -> Result<Enqueued, Error> {
        if !sent {
            self.shared.finish_one();
            return Err(Error::Cancelled);
        }
        self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
        let occupied = self.tx.max_capacity() - self.tx.capacity();
        self.shared.peak.fetch_max(occupied, Ordering::Relaxed);
        Ok(Enqueued::Queued)
    }
}

/// Consumer half, shared by all workers
#[derive(Debug, Clone)]
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    shared: Arc<Shared>,
}

impl QueueReceiver {
    /// Next task, or `None` once the sender is dropped and the queue is empty
    pub async fn recv(&self) -> Option<QueuedTask> {
        let task = self.rx.lock().await.recv().await?;
        Some(QueuedTask {
            task,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// A dequeued task
///
/// Dropping it marks the task as processed, whether or not an outcome was
/// produced, so an aborted worker cannot wedge [`QueueTracker::join`].
#[derive(Debug)]
pub struct QueuedTask {
    task: Task,
    shared: Arc<Shared>,
}

impl QueuedTask {
    #[must_use]
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Mark the task as processed
    pub fn complete(self) {
        drop(self);
    }
}

impl Drop for QueuedTask {
    fn drop(&mut self) {
        self.shared.finish_one();
    }
}

/// Observes queue progress
#[derive(Debug, Clone)]
pub struct QueueTracker {
    shared: Arc<Shared>,
}

impl QueueTracker {
    /// Tasks enqueued but not yet processed
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Tasks accepted by the queue so far
    #[must_use]
    pub fn enqueued(&self) -> u64 {
        self.shared.enqueued.load(Ordering::Relaxed)
    }

    /// Highest number of tasks ever buffered at once
    #[must_use]
    pub fn peak_occupancy(&self) -> usize {
        self.shared.peak.load(Ordering::Relaxed)
    }

    /// Wait until every enqueued task has been processed
    ///
    /// Only meaningful once the producer has stopped enqueuing.
    pub async fn join(&self) {
        loop {
            let idle = self.shared.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}
