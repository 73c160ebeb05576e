//! Bounded worker pool for fan-out/fan-in work
//!
//! This module handles:
//! - Concurrency limiting via a semaphore (sliding window, not batches)
//! - Capturing task errors and panics as per-task outcomes
//! - Returning outcomes in task order regardless of completion order
//!
//! The pool itself never fails. One task failing, or panicking, has no
//! effect on its siblings.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Why a pool task did not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure<E> {
    /// The task ran to completion and returned an error
    #[error("{0}")]
    Failed(E),

    /// The task panicked; the payload message is kept
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was cancelled by the runtime before it finished
    #[error("task was cancelled before completing")]
    Cancelled,
}

/// Per-task result, aligned with the task's position in the input
pub type Outcome<T, E> = Result<T, TaskFailure<E>>;

/// Runs futures with at most `limit` of them in flight at once
///
/// As soon as one task finishes, the next queued task is admitted. A limit
/// of 1 runs tasks strictly one after another; a limit at or above the task
/// count runs them all at once.
#[derive(Debug, Clone, Copy)]
pub struct BoundedWorkerPool {
    limit: usize,
}

impl BoundedWorkerPool {
    /// Creates a pool; a limit of 0 is treated as 1
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Maximum number of tasks in flight
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs every task and returns one outcome per task, in input order
    ///
    /// Tasks are spawned onto the tokio runtime. A permit is acquired before
    /// each spawn and released when the task ends, so no more than `limit`
    /// tasks exist at any time and admission follows input order.
    ///
    /// # Example
    ///
    /// ```
    /// use product_archiver::crawler::BoundedWorkerPool;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let pool = BoundedWorkerPool::new(2);
    /// let tasks = (0..4).map(|i| async move {
    ///     if i == 2 { Err("boom") } else { Ok(i * 10) }
    /// });
    ///
    /// let outcomes = pool.run(tasks).await;
    /// assert_eq!(outcomes.len(), 4);
    /// assert_eq!(outcomes[1].as_ref().ok(), Some(&10));
    /// assert!(outcomes[2].is_err());
    /// # }
    /// ```
    pub async fn run<I, Fut, T, E>(&self, tasks: I) -> Vec<Outcome<T, E>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut set = JoinSet::new();
        let mut slots: Vec<Option<Outcome<T, E>>> = Vec::new();

        for (index, task) in tasks.into_iter().enumerate() {
            slots.push(None);

            // The semaphore is never closed, so acquire only fails if that changes
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    slots[index] = Some(Err(TaskFailure::Cancelled));
                    continue;
                }
            };

            set.spawn(async move {
                let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(error)) => Err(TaskFailure::Failed(error)),
                    Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
                };
                drop(permit);
                (index, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            store(&mut slots, joined);
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(TaskFailure::Cancelled)))
            .collect()
    }
}

type Joined<T, E> = Result<(usize, Outcome<T, E>), tokio::task::JoinError>;

fn store<T, E>(slots: &mut [Option<Outcome<T, E>>], joined: Joined<T, E>) {
    match joined {
        Ok((index, outcome)) => slots[index] = Some(outcome),
        // Panics are caught inside the task, so this is runtime shutdown
        Err(e) => tracing::warn!("Pool task did not complete: {}", e),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
