//! FIFO task queue with an outstanding-work barrier.
//!
//! The queue counts every task from `put` until its matching `ack`.
//! [`TaskQueue::join`] resolves when that count reaches zero, and
//! [`TaskQueue::close`] is the stop signal workers observe at their next
//! [`TaskQueue::get`].
//!
//! # Capacity
//!
//! A bounded queue suspends `put` while the FIFO is full. Workers are both
//! consumers and producers (a feed task enqueues episodes), so a strict bound
//! could leave every worker parked in `put` with nobody left to drain. The
//! bound is therefore soft: a `put` that would park the last free consumer is
//! admitted over capacity.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{trace, warn};

use crate::model::Task;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Task>,
    /// Tasks put but not yet acked.
    outstanding: usize,
    /// Worker producers currently parked in `put`.
    blocked_producers: usize,
    closed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Producer {
    Worker { registered: bool },
    External,
}

/// Shared work queue drained by the worker pool.
#[derive(Debug)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    changed: Notify,
    capacity: Option<usize>,
    consumers: usize,
}

impl TaskQueue {
    /// Creates a queue without a capacity limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Notify::new(),
            capacity: None,
            consumers: 1,
        }
    }

    /// Creates a queue holding at most `capacity` pending tasks (soft bound),
    /// drained by `consumers` workers.
    #[must_use]
    pub fn bounded(capacity: usize, consumers: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            changed: Notify::new(),
            capacity: Some(capacity.max(1)),
            consumers: consumers.max(1),
        }
    }

    /// Configured capacity, `None` when unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a `put` must park. Only worker producers count against
    /// `consumers`; an external producer waits for room unconditionally.
    fn must_wait(&self, state: &QueueState, producer: Producer) -> bool {
        let Some(capacity) = self.capacity else {
            return false;
        };
        if state.closed || state.pending.len() < capacity {
            return false;
        }
        match producer {
            Producer::External => true,
            Producer::Worker { registered } => {
                state.blocked_producers + usize::from(!registered) < self.consumers
            }
        }
    }

    /// Appends a task from a worker, suspending while a bounded queue is full.
    ///
    /// A worker that would be the last free consumer is admitted over capacity.
    pub async fn put(&self, task: Task) {
        self.enqueue(task, false).await;
    }

    /// Appends a task from outside the worker pool, such as the seeding driver.
    ///
    /// Waits for room without counting as a parked consumer.
    pub async fn seed(&self, task: Task) {
        self.enqueue(task, true).await;
    }

    async fn enqueue(&self, task: Task, external: bool) {
        let mut registered = false;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    if registered {
                        state.blocked_producers -= 1;
                    }
                    warn!(task = %task, "queue closed, dropping task");
                    return;
                }
                let producer = if external {
                    Producer::External
                } else {
                    Producer::Worker { registered }
                };
                if !self.must_wait(&state, producer) {
                    if registered {
                        state.blocked_producers -= 1;
                    }
                    trace!(task = %task, pending = state.pending.len(), "enqueued");
                    state.pending.push_back(task);
                    state.outstanding += 1;
                    drop(state);
                    self.changed.notify_waiters();
                    return;
                }
                if !external && !registered {
                    state.blocked_producers += 1;
                    registered = true;
                    drop(state);
                    // Other parked producers re-check whether they are now the last free consumer.
                    self.changed.notify_waiters();
                }
            }

            notified.await;
        }
    }

    /// Takes the next task, suspending until one is available.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn get(&self) -> Option<Task> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(task) = state.pending.pop_front() {
                    drop(state);
                    self.changed.notify_waiters();
                    return Some(task);
                }
            }

            notified.await;
        }
    }

    /// Marks one previously taken task as finished.
    pub fn ack(&self) {
        let mut state = self.lock();
        match state.outstanding.checked_sub(1) {
            Some(remaining) => state.outstanding = remaining,
            None => warn!("ack without outstanding task"),
        }
        drop(state);
        self.changed.notify_waiters();
    }

    /// Suspends until every task put so far has been acked.
    pub async fn join(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.lock().outstanding == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Signals workers to stop; pending and future `get` calls return `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Tasks waiting to be taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether no task is waiting to be taken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks put but not yet acked.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }
}
