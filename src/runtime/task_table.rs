//! Task table: the arena of live task records.
//!
//! Hands out `Arc<Task>` handles so matchers and release paths can work on
//! a task after dropping the table lock. The table mutex is a leaf lock:
//! taken only to insert, resolve, or retire a record, never held across
//! calls into matching or release code.

use std::sync::{Arc, Mutex};

use crate::record::{Task, TaskState};
use crate::types::{Phase, RemoteTaskId, TaskId};
use crate::util::Arena;

/// Arena of live tasks behind one mutex.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: Mutex<Arena<Arc<Task>>>,
}

impl TaskTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Arena::new()),
        }
    }

    /// Creates a task record and returns its id.
    pub fn create(&self, parent: Option<TaskId>, phase: Phase, state: TaskState) -> TaskId {
        let mut tasks = self.tasks.lock().expect("task table lock poisoned");
        let idx = tasks.insert_with(|idx| {
            let id = TaskId::from_arena(idx);
            Arc::new(Task::new(id, parent, phase, state))
        });
        TaskId::from_arena(idx)
    }

    /// Resolves an id to its record.
    #[must_use]
    pub fn resolve(&self, id: TaskId) -> Option<Arc<Task>> {
        let tasks = self.tasks.lock().expect("task table lock poisoned");
        tasks.get(id.arena_index()).cloned()
    }

    /// Resolves a wire id from another unit back to the local record.
    ///
    /// Misses when the id is stale (the slot was recycled since the wire id
    /// was issued); the protocol handlers turn that into a dropped message.
    #[must_use]
    pub fn resolve_wire(&self, id: RemoteTaskId) -> Option<Arc<Task>> {
        let tasks = self.tasks.lock().expect("task table lock poisoned");
        tasks.get(id.to_arena_index()).cloned()
    }

    /// Retires a record, recycling its slot.
    ///
    /// Outstanding `Arc` handles stay valid; the id stops resolving.
    pub fn remove(&self, id: TaskId) -> Option<Arc<Task>> {
        let mut tasks = self.tasks.lock().expect("task table lock poisoned");
        tasks.remove(id.arena_index())
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("task table lock poisoned").len()
    }

    /// Whether the table holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
