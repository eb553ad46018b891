//! Ordered list of task ids with head insertion and membership checks.
//!
//! Successor lists and the remote-blocked list share this shape: new tasks
//! are prepended, the release cascade pops from the head (newest first), and
//! edge creation needs a membership check so a producer never records the
//! same successor twice.

use std::collections::VecDeque;

use crate::types::TaskId;

/// Deque of task ids used for successor and blocked-task bookkeeping.
#[derive(Debug, Default, Clone)]
pub struct TaskList {
    inner: VecDeque<TaskId>,
}

impl TaskList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: VecDeque::new(),
        }
    }

    /// Number of tasks in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Inserts `task` at the head.
    pub fn prepend(&mut self, task: TaskId) {
        self.inner.push_front(task);
    }

    /// Removes and returns the head task.
    pub fn pop(&mut self) -> Option<TaskId> {
        self.inner.pop_front()
    }

    /// Whether `task` is present.
    #[must_use]
    pub fn contains(&self, task: TaskId) -> bool {
        self.inner.contains(&task)
    }

    /// Removes the first occurrence of `task`; returns whether it was found.
    pub fn remove(&mut self, task: TaskId) -> bool {
        if let Some(pos) = self.inner.iter().position(|t| *t == task) {
            self.inner.remove(pos);
            true
        } else {
            false
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Visits the tasks front to back.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.inner.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;

    fn tid(n: u32) -> TaskId {
        TaskId::new_for_test(n, 0)
    }

    #[test]
    fn prepend_pop_is_lifo() {
        let mut list = TaskList::new();
        list.prepend(tid(1));
        list.prepend(tid(2));
        list.prepend(tid(3));

        assert_eq!(list.pop(), Some(tid(3)));
        assert_eq!(list.pop(), Some(tid(2)));
        assert_eq!(list.pop(), Some(tid(1)));
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn contains_and_remove() {
        let mut list = TaskList::new();
        list.prepend(tid(1));
        list.prepend(tid(2));

        assert!(list.contains(tid(1)));
        assert!(list.remove(tid(1)));
        assert!(!list.contains(tid(1)));
        assert!(!list.remove(tid(1)));
        assert_eq!(list.len(), 1);
    }
}
