//! Locked task queue with a guard API.
//!
//! The deferred-local step has to hold two queues at once (the engine's
//! deferred queue and the caller's worker queue) while it moves tasks
//! between them. Exposing an explicit guard keeps that two-lock section
//! visible at the call site instead of hiding it behind per-op locking.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::types::TaskId;

/// FIFO of task ids behind a mutex.
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<VecDeque<TaskId>>,
}

/// Exclusive access to a [`TaskQueue`].
pub struct TaskQueueGuard<'a> {
    inner: MutexGuard<'a, VecDeque<TaskId>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Locks the queue.
    pub fn lock(&self) -> TaskQueueGuard<'_> {
        TaskQueueGuard {
            inner: self.inner.lock().expect("task queue lock poisoned"),
        }
    }

    /// Enqueues under a transient lock.
    pub fn push(&self, task: TaskId) {
        self.lock().push(task);
    }

    /// Dequeues under a transient lock.
    pub fn pop(&self) -> Option<TaskId> {
        self.lock().pop()
    }

    /// Queue length under a transient lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskQueueGuard<'_> {
    /// Enqueues at the back.
    pub fn push(&mut self, task: TaskId) {
        self.inner.push_back(task);
    }

    /// Dequeues from the front.
    pub fn pop(&mut self) -> Option<TaskId> {
        self.inner.pop_front()
    }

    /// Queue length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u32) -> TaskId {
        TaskId::new_for_test(n, 0)
    }

    #[test]
    fn fifo_order() {
        let q = TaskQueue::new();
        q.push(tid(1));
        q.push(tid(2));
        assert_eq!(q.pop(), Some(tid(1)));
        assert_eq!(q.pop(), Some(tid(2)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn guard_batches_operations() {
        let q = TaskQueue::new();
        {
            let mut guard = q.lock();
            guard.push(tid(1));
            guard.push(tid(2));
            assert_eq!(guard.len(), 2);
        }
        assert_eq!(q.len(), 2);
    }
}
