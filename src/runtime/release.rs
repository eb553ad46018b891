//! The release cascade.
//!
//! When a task finishes, everything recorded against it is answered: one
//! release message per remote successor, one counter decrement per local
//! successor. A successor whose decrement drains its last dependency is
//! handed to the [`RunnableSink`](crate::runtime::RunnableSink) exactly
//! once; the typed decrement result makes a second enqueue for the same
//! zero crossing impossible.
//!
//! Cancellation short-circuits the remote half: a cancelled task sends no
//! releases (the whole protocol is being torn down), but its local
//! successors are still walked so no task on this unit stays blocked on a
//! corpse.

use std::mem;

use crate::error::{Error, Result};
use crate::record::{DepWait, TaskState};
use crate::runtime::engine::DepRuntime;
use crate::tracing_compat::{debug, trace, warn};
use crate::types::TaskId;

impl DepRuntime {
    /// Releases all successors of `task` after it reached a terminal
    /// state.
    ///
    /// Send failures do not stop the cascade; the first one is returned
    /// after every successor has been handled.
    pub fn release_task(&self, task: TaskId) -> Result<()> {
        let Some(record) = self.tasks.resolve(task) else {
            return Err(Error::no_such_task(task));
        };

        let (state, remote, mut local) = {
            let mut sync = record.lock_sync();
            let remote = mem::take(&mut sync.remote_successors);
            let local = mem::take(&mut sync.successors);
            (sync.state, remote, local)
        };
        debug!(
            task = %task,
            %state,
            remote = remote.len(),
            local = local.len(),
            "releasing successors"
        );

        let mut first_err: Option<Error> = None;
        if state == TaskState::Cancelled {
            if !remote.is_empty() {
                trace!(task = %task, dropped = remote.len(), "cancelled task sends no releases");
            }
        } else {
            for rs in remote {
                if let Err(err) = self.send_release(rs.task.origin, rs.task.id, rs.dep) {
                    warn!(task = %task, remote = ?rs.task, %err, "failed to send release");
                    first_err.get_or_insert(err);
                }
            }
        }

        while let Some(succ_id) = local.pop() {
            let Some(succ) = self.tasks.resolve(succ_id) else {
                warn!(successor = %succ_id, "successor retired while still recorded");
                continue;
            };
            let wait = succ.release_local_dep();
            if wait == DepWait::Runnable && succ.state() == TaskState::Created {
                trace!(successor = %succ_id, "successor became runnable");
                self.sink.enqueue_runnable(succ_id);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Answers one inbound release for `task`.
    ///
    /// Draining the last remote dependency also removes the task from the
    /// remote-blocked list. The decision to enqueue uses only the
    /// decremented value, so two releases can never both enqueue.
    pub fn release_remote_dep(&self, task: TaskId) -> Result<()> {
        let Some(record) = self.tasks.resolve(task) else {
            return Err(Error::no_such_task(task));
        };
        let release = record.release_remote_dep();
        if release.remote_clear {
            self.remote_blocked
                .lock()
                .expect("remote-blocked list lock poisoned")
                .remove(task);
        }
        if release.wait == DepWait::Runnable {
            trace!(task = %task, "last dependency released remotely");
            self.sink.enqueue_runnable(task);
        }
        Ok(())
    }

    /// Forgets every outstanding remote dependency (teardown).
    ///
    /// Drains the remote-blocked list; each task's remote counter is
    /// forced to zero and tasks with no local dependencies left are
    /// enqueued. Callers must stop pumping the transport first: a release
    /// arriving after the counter was cleared would underflow.
    pub fn cancel_remote_deps(&self) {
        let drained: Vec<TaskId> = {
            let mut blocked = self
                .remote_blocked
                .lock()
                .expect("remote-blocked list lock poisoned");
            let mut tasks = Vec::with_capacity(blocked.len());
            while let Some(id) = blocked.pop() {
                tasks.push(id);
            }
            tasks
        };
        if drained.is_empty() {
            return;
        }
        debug!(tasks = drained.len(), "cancelling outstanding remote dependencies");
        for id in drained {
            let Some(task) = self.tasks.resolve(id) else {
                continue;
            };
            if task.clear_remote_deps() == DepWait::Runnable {
                self.sink.enqueue_runnable(id);
            }
        }
    }

    /// Marks `task` running.
    pub fn start_task(&self, task: TaskId) -> Result<()> {
        let Some(record) = self.tasks.resolve(task) else {
            return Err(Error::no_such_task(task));
        };
        let mut sync = record.lock_sync();
        if sync.state != TaskState::Created {
            return Err(Error::internal(format!(
                "task {task} cannot start from state {}",
                sync.state
            )));
        }
        sync.state = TaskState::Running;
        Ok(())
    }

    /// Marks `task` done (unless it was cancelled) and runs the release
    /// cascade.
    pub fn complete_task(&self, task: TaskId) -> Result<()> {
        let Some(record) = self.tasks.resolve(task) else {
            return Err(Error::no_such_task(task));
        };
        {
            let mut sync = record.lock_sync();
            if sync.state != TaskState::Cancelled {
                sync.state = TaskState::Done;
            }
        }
        self.release_task(task)
    }

    /// Marks `task` cancelled and releases its local successors.
    ///
    /// No release messages are sent for it; remote teardown is handled by
    /// [`cancel_remote_deps`](DepRuntime::cancel_remote_deps).
    pub fn cancel_task(&self, task: TaskId) -> Result<()> {
        let Some(record) = self.tasks.resolve(task) else {
            return Err(Error::no_such_task(task));
        };
        record.lock_sync().state = TaskState::Cancelled;
        self.release_task(task)
    }
}
