//! Worker pool

use crate::queue::QueueReceiver;
use crate::task::{Failure, FailureReason, Success, Task};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Performs one unit of work
///
/// Implementations report every per-task problem as a [`FailureReason`];
/// nothing a single crate version does may end the run.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &Task) -> Result<(), FailureReason>;
}

/// The two result channels workers route outcomes into
#[derive(Debug, Clone)]
pub struct OutcomeSenders {
    pub success: mpsc::Sender<Success>,
    pub failure: mpsc::Sender<Failure>,
}

/// Fixed-size set of workers draining one queue
pub struct WorkerPool {
    workers: JoinSet<()>,
    size: usize,
}

impl WorkerPool {
    /// Start `size` workers
    ///
    /// Each worker stops taking tasks once `cancel` fires, finishing the task
    /// it holds first.
    #[must_use]
    pub fn spawn(
        size: usize,
        receiver: &QueueReceiver,
        runner: &Arc<dyn TaskRunner>,
        outcomes: &OutcomeSenders,
        cancel: &CancellationToken,
    ) -> Self {
        let mut workers = JoinSet::new();
        for _ in 0..size {
            workers.spawn(worker_loop(
                receiver.clone(),
                Arc::clone(runner),
                outcomes.clone(),
                cancel.clone(),
            ));
        }
        Self { workers, size }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for every worker to exit on its own
    pub async fn join(mut self) {
        while self.workers.join_next().await.is_some() {}
    }

    /// Give workers `grace` to finish, then abort the rest
    ///
    /// Returns how many workers had to be aborted. An aborted worker drops
    /// its task without an outcome; partial archives are cleaned up by the
    /// download's drop guard.
    pub async fn shutdown(mut self, grace: Duration) -> usize {
        let finished = tokio::time::timeout(grace, async {
            while self.workers.join_next().await.is_some() {}
        })
        .await;
        if finished.is_ok() {
            return 0;
        }

        let aborted = self.workers.len();
        self.workers.abort_all();
        while self.workers.join_next().await.is_some() {}
        aborted
    }
}

async fn worker_loop(
    receiver: QueueReceiver,
    runner: Arc<dyn TaskRunner>,
    outcomes: OutcomeSenders,
    cancel: CancellationToken,
) {
    loop {
        let queued = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            queued = receiver.recv() => queued,
        };
        let Some(queued) = queued else {
            break;
        };

        let task = queued.task();
        let routed = match runner.run(task).await {
            Ok(()) => outcomes
                .success
                .send(Success {
                    id: task.id.clone(),
                })
                .await
                .is_ok(),
            Err(reason) => outcomes
                .failure
                .send(Failure {
                    id: task.id.clone(),
                    reason,
                })
                .await
                .is_ok(),
        };
        queued.complete();

        // A closed result channel means its consumer has stopped; stop with it.
        if !routed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::task_queue;
    use ferry_types::CrateId;

    struct EvenOdd;

    #[async_trait]
    impl TaskRunner for EvenOdd {
        async fn run(&self, task: &Task) -> Result<(), FailureReason> {
            let n: usize = task.id.version.parse().unwrap();
            if n % 2 == 0 {
                Ok(())
            } else {
                Err(FailureReason::Storage {
                    message: "odd".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_each_task_yields_exactly_one_outcome() {
        let (mut tx, rx, tracker) = task_queue(4);
        let (success_tx, mut success_rx) = mpsc::channel(4);
        let (failure_tx, mut failure_rx) = mpsc::channel(4);
        let outcomes = OutcomeSenders {
            success: success_tx,
            failure: failure_tx,
        };
        let runner: Arc<dyn TaskRunner> = Arc::new(EvenOdd);
        let cancel = CancellationToken::new();

        let pool = WorkerPool::spawn(3, &rx, &runner, &outcomes, &cancel);
        drop(outcomes);
        drop(rx);

        let successes = tokio::spawn(async move {
            let mut n = 0;
            while success_rx.recv().await.is_some() {
                n += 1;
            }
            n
        });
        let failures = tokio::spawn(async move {
            let mut n = 0;
            while failure_rx.recv().await.is_some() {
                n += 1;
            }
            n
        });

        for n in 0..20 {
            tx.enqueue(Task::fetch(CrateId::new("c", n.to_string())))
                .await
                .unwrap();
        }
        drop(tx);
        tracker.join().await;
        pool.join().await;

        assert_eq!(successes.await.unwrap(), 10);
        assert_eq!(failures.await.unwrap(), 10);
    }

    struct Stall;

    #[async_trait]
    impl TaskRunner for Stall {
        async fn run(&self, _task: &Task) -> Result<(), FailureReason> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_aborts_stalled_workers() {
        let (mut tx, rx, tracker) = task_queue(4);
        let (success_tx, _success_rx) = mpsc::channel(4);
        let (failure_tx, _failure_rx) = mpsc::channel(4);
        let outcomes = OutcomeSenders {
            success: success_tx,
            failure: failure_tx,
        };
        let runner: Arc<dyn TaskRunner> = Arc::new(Stall);
        let cancel = CancellationToken::new();

        let pool = WorkerPool::spawn(2, &rx, &runner, &outcomes, &cancel);
        for n in 0..2 {
            tx.enqueue(Task::fetch(CrateId::new("c", n.to_string())))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        cancel.cancel();
        let aborted = pool.shutdown(Duration::from_millis(50)).await;
        assert_eq!(aborted, 2);
        // Aborted tasks count as processed so join cannot hang
        assert_eq!(tracker.pending(), 0);
    }
}
