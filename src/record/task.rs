//! Task records: lifecycle state, dependency counters, and the per-task
//! lock guarding successor bookkeeping.
//!
//! A task record is shared (`Arc`) between the task table, matchers, and
//! the release cascade. Two atomic counters track how many local and remote
//! dependencies are still unresolved; everything else that can change after
//! creation (state, successor lists) sits behind the per-task mutex.
//!
//! # Counter discipline
//!
//! Counters move only through the methods here. Decrements return a typed
//! [`DepWait`] computed from the decremented value, so "reached zero" is
//! decided exactly once per transition and two releases can never both see
//! the same zero crossing. Underflow means a matcher filed an edge it never
//! created, and aborts.

use core::fmt;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::types::task_ref::RemoteTaskRef;
use crate::types::{Phase, TaskId, WireDep};
use crate::util::TaskList;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// The top-level group task; owns a dependency table, never runs.
    Root,
    /// Created and filed; not yet handed to a worker.
    Created,
    /// Currently executing.
    Running,
    /// Finished normally; its outputs are final.
    Done,
    /// Abandoned by cancellation; skipped as a producer.
    Cancelled,
}

impl TaskState {
    /// Whether the task can still serve as a producer for new consumers.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }

    /// Whether the task will never run (again).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Root => "root",
            Self::Created => "created",
            Self::Running => "running",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of releasing one dependency of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepWait {
    /// At least one dependency is still unresolved.
    StillWaiting,
    /// Both counters reached zero with this release.
    Runnable,
}

/// Outcome of releasing one remote dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteDepRelease {
    /// Whether the task became runnable.
    pub wait: DepWait,
    /// Whether this release drained the last remote dependency; the caller
    /// removes the task from the remote-blocked list exactly then.
    pub remote_clear: bool,
}

/// A release owed to a task on another unit once this task completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteSuccessor {
    /// The waiting remote task.
    pub task: RemoteTaskRef,
    /// The dependency the release answers.
    pub dep: WireDep,
}

/// Mutable task bookkeeping, guarded by the per-task mutex.
#[derive(Debug)]
pub struct TaskSync {
    owner: TaskId,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Local tasks to release when this task completes.
    pub successors: TaskList,
    /// Remote releases owed on completion.
    pub remote_successors: SmallVec<[RemoteSuccessor; 2]>,
}

impl TaskSync {
    /// Records `successor` for release on completion.
    ///
    /// Returns `false` (and records nothing) when the successor is already
    /// present, keeping repeated matches on one region idempotent.
    ///
    /// # Panics
    ///
    /// A task must never wait on itself; that edge is a matcher bug.
    pub fn add_successor(&mut self, successor: TaskId) -> bool {
        assert_ne!(
            successor, self.owner,
            "task {successor} cannot be its own successor"
        );
        if self.successors.contains(successor) {
            return false;
        }
        self.successors.prepend(successor);
        true
    }

    /// Records a remote release owed on completion.
    pub fn add_remote_successor(&mut self, succ: RemoteSuccessor) {
        self.remote_successors.push(succ);
    }
}

/// A task known to the dependency engine.
///
/// Created through the task table; immutable identity up front, counters
/// and sync state behind their own synchronization.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    parent: Option<TaskId>,
    phase: Phase,
    unresolved_local: AtomicI32,
    unresolved_remote: AtomicI32,
    sync: Mutex<TaskSync>,
}

impl Task {
    /// Creates a record in the given initial state.
    pub(crate) fn new(id: TaskId, parent: Option<TaskId>, phase: Phase, state: TaskState) -> Self {
        Self {
            id,
            parent,
            phase,
            unresolved_local: AtomicI32::new(0),
            unresolved_remote: AtomicI32::new(0),
            sync: Mutex::new(TaskSync {
                owner: id,
                state,
                successors: TaskList::new(),
                remote_successors: SmallVec::new(),
            }),
        }
    }

    /// Task id.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Parent (group) task; `None` only for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    /// Creation phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Current state (takes the per-task lock briefly).
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.lock_sync().state
    }

    /// Whether the task can still serve as a producer.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Locks the per-task sync state.
    ///
    /// Lock order: a group-table lock may be held while taking this; never
    /// the reverse, and never two task locks at once.
    pub(crate) fn lock_sync(&self) -> MutexGuard<'_, TaskSync> {
        self.sync.lock().expect("task sync lock poisoned")
    }

    /// Unresolved local dependency count.
    #[must_use]
    pub fn unresolved_local(&self) -> i32 {
        self.unresolved_local.load(Ordering::Acquire)
    }

    /// Unresolved remote dependency count.
    #[must_use]
    pub fn unresolved_remote(&self) -> i32 {
        self.unresolved_remote.load(Ordering::Acquire)
    }

    /// Accounts one more unfinished local producer; returns the new count.
    pub(crate) fn add_local_dep(&self) -> i32 {
        self.unresolved_local.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Accounts one more outstanding remote dependency; returns the new
    /// count. The caller adds the task to the remote-blocked list when the
    /// returned value is 1.
    pub(crate) fn add_remote_dep(&self) -> i32 {
        self.unresolved_remote.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Releases one local dependency.
    ///
    /// # Panics
    ///
    /// On counter underflow (a release without a matching edge).
    pub(crate) fn release_local_dep(&self) -> DepWait {
        let local = self.unresolved_local.fetch_sub(1, Ordering::AcqRel) - 1;
        assert!(
            local >= 0,
            "local dependency counter underflow on {}",
            self.id
        );
        if local == 0 && self.unresolved_remote.load(Ordering::Acquire) == 0 {
            DepWait::Runnable
        } else {
            DepWait::StillWaiting
        }
    }

    /// Releases one remote dependency.
    ///
    /// # Panics
    ///
    /// On counter underflow (a release without a matching request or edge).
    pub(crate) fn release_remote_dep(&self) -> RemoteDepRelease {
        let remote = self.unresolved_remote.fetch_sub(1, Ordering::AcqRel) - 1;
        assert!(
            remote >= 0,
            "remote dependency counter underflow on {}",
            self.id
        );
        let wait = if remote == 0 && self.unresolved_local.load(Ordering::Acquire) == 0 {
            DepWait::Runnable
        } else {
            DepWait::StillWaiting
        };
        RemoteDepRelease {
            wait,
            remote_clear: remote == 0,
        }
    }

    /// Forces the remote counter to zero during cancellation teardown.
    pub(crate) fn clear_remote_deps(&self) -> DepWait {
        self.unresolved_remote.store(0, Ordering::Release);
        if self.unresolved_local.load(Ordering::Acquire) == 0 {
            DepWait::Runnable
        } else {
            DepWait::StillWaiting
        }
    }

    /// Zeroes both counters (group reset).
    pub(crate) fn reset_counters(&self) {
        self.unresolved_local.store(0, Ordering::Release);
        self.unresolved_remote.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RemoteTaskId, UnitId};

    fn task(n: u32) -> Task {
        Task::new(
            TaskId::new_for_test(n, 0),
            Some(TaskId::new_for_test(0, 0)),
            Phase::FIRST,
            TaskState::Created,
        )
    }

    #[test]
    fn active_and_terminal_states() {
        assert!(TaskState::Created.is_active());
        assert!(TaskState::Running.is_active());
        assert!(!TaskState::Root.is_active());
        assert!(!TaskState::Done.is_active());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn local_release_reaches_runnable_once() {
        let t = task(1);
        assert_eq!(t.add_local_dep(), 1);
        assert_eq!(t.add_local_dep(), 2);

        assert_eq!(t.release_local_dep(), DepWait::StillWaiting);
        assert_eq!(t.release_local_dep(), DepWait::Runnable);
        assert_eq!(t.unresolved_local(), 0);
    }

    #[test]
    fn remote_release_reports_drain() {
        let t = task(1);
        t.add_local_dep();
        t.add_remote_dep();
        t.add_remote_dep();

        let first = t.release_remote_dep();
        assert_eq!(first.wait, DepWait::StillWaiting);
        assert!(!first.remote_clear);

        // Last remote release drains the remote side but the local
        // dependency still holds the task back.
        let second = t.release_remote_dep();
        assert_eq!(second.wait, DepWait::StillWaiting);
        assert!(second.remote_clear);

        assert_eq!(t.release_local_dep(), DepWait::Runnable);
    }

    #[test]
    fn runnable_requires_both_counters_zero() {
        let t = task(1);
        t.add_local_dep();
        t.add_remote_dep();

        assert_eq!(t.release_local_dep(), DepWait::StillWaiting);
        let rel = t.release_remote_dep();
        assert_eq!(rel.wait, DepWait::Runnable);
        assert!(rel.remote_clear);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn local_underflow_aborts() {
        let t = task(1);
        let _ = t.release_local_dep();
    }

    #[test]
    #[should_panic(expected = "own successor")]
    fn self_successor_aborts() {
        let t = task(1);
        let id = t.id();
        t.lock_sync().add_successor(id);
    }

    #[test]
    fn successor_dedup() {
        let t = task(1);
        let succ = TaskId::new_for_test(2, 0);
        let mut sync = t.lock_sync();
        assert!(sync.add_successor(succ));
        assert!(!sync.add_successor(succ));
        assert_eq!(sync.successors.len(), 1);
    }

    #[test]
    fn clear_remote_deps_forces_runnable_when_local_clear() {
        let t = task(1);
        t.add_remote_dep();
        t.add_remote_dep();
        assert_eq!(t.clear_remote_deps(), DepWait::Runnable);
        assert_eq!(t.unresolved_remote(), 0);
    }

    #[test]
    fn remote_successor_records_kept_in_order() {
        let t = task(1);
        let remote = RemoteTaskRef::new(UnitId(3), RemoteTaskId::from_raw(0x42));
        let mut sync = t.lock_sync();
        sync.add_remote_successor(RemoteSuccessor {
            task: remote,
            dep: WireDep::direct(),
        });
        assert_eq!(sync.remote_successors.len(), 1);
        assert_eq!(sync.remote_successors[0].task, remote);
    }
}
