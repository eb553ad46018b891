//! The dependency runtime.
//!
//! [`DepRuntime`] is the context object tying the pieces together: the task
//! table, the per-group dependency tables, the deferred queues, and the
//! collaborator seams (transport, runnable sink, address resolver, copy-in
//! spawner). Construction goes through [`DepRuntimeBuilder`].
//!
//! [`handle_task`](DepRuntime::handle_task) is the entry point: it
//! classifies each declared dependency into a local match, a remote
//! request, a direct edge, or a copy-in, in declaration order.
//! [`deliver`](DepRuntime::deliver) and [`progress`](DepRuntime::progress)
//! are the inbound side, dispatching wire messages to the protocol
//! handlers.
//!
//! The matching, remote, release, and copy-in operations live in their own
//! modules as further `impl DepRuntime` blocks.

use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::DepConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::record::{Task, TaskState};
use crate::runtime::copyin::{CopyinSpawner, NoCopyin};
use crate::runtime::dep_table::{DepEntry, DepTable};
use crate::runtime::matcher::{self, MatchOutcome};
use crate::runtime::remote::RemoteRequest;
use crate::runtime::task_queue::TaskQueue;
use crate::runtime::task_table::TaskTable;
use crate::tracing_compat::{debug, trace, warn};
use crate::transport::{Envelope, Message, Transport};
use crate::types::task_ref::RemoteTaskRef;
use crate::types::{
    DepKind, Dependency, Phase, RegionKey, RemoteTaskId, TaskId, TeamId, UnitId, WireDep,
};
use crate::util::TaskList;

/// Receives tasks whose last unresolved dependency was released.
///
/// The engine guarantees at most one call per dependency-set completion;
/// the sink decides where the task runs.
pub trait RunnableSink: Send + Sync {
    /// Hands a runnable task to the embedding scheduler.
    fn enqueue_runnable(&self, task: TaskId);
}

/// Translates team-relative units and region keys.
pub trait AddressResolver: Send + Sync {
    /// Global unit id for `unit` within `team`; `None` when the unit is
    /// not a member of the team.
    fn global_unit(&self, team: TeamId, unit: UnitId) -> Option<UnitId>;

    /// Rewrites a key that targets this unit into local terms.
    fn localize(&self, key: RegionKey) -> RegionKey;
}

/// Resolver for flat address spaces: unit ids are already global and keys
/// need no rewriting.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityAddressSpace;

impl AddressResolver for IdentityAddressSpace {
    fn global_unit(&self, _team: TeamId, unit: UnitId) -> Option<UnitId> {
        Some(unit)
    }

    fn localize(&self, key: RegionKey) -> RegionKey {
        key
    }
}

/// Builder for a [`DepRuntime`].
///
/// Transport and sink are required; the resolver defaults to
/// [`IdentityAddressSpace`] and the copy-in spawner to [`NoCopyin`].
pub struct DepRuntimeBuilder {
    me: UnitId,
    config: DepConfig,
    transport: Option<Arc<dyn Transport>>,
    sink: Option<Arc<dyn RunnableSink>>,
    resolver: Arc<dyn AddressResolver>,
    copyin: Arc<dyn CopyinSpawner>,
}

impl DepRuntimeBuilder {
    /// Creates a builder for the engine of unit `me`.
    #[must_use]
    pub fn new(me: UnitId) -> Self {
        Self {
            me,
            config: DepConfig::default(),
            transport: None,
            sink: None,
            resolver: Arc::new(IdentityAddressSpace),
            copyin: Arc::new(NoCopyin),
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: DepConfig) -> Self {
        self.config = config;
        self
    }

    /// Wires the interconnect transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wires the runnable-task sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn RunnableSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Wires the address resolver.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Wires the copy-in task spawner.
    #[must_use]
    pub fn copyin(mut self, copyin: Arc<dyn CopyinSpawner>) -> Self {
        self.copyin = copyin;
        self
    }

    /// Builds the runtime, creating the root group task.
    pub fn build(self) -> Result<DepRuntime> {
        self.config.validate()?;
        let Some(transport) = self.transport else {
            return Err(Error::new(ErrorKind::InvalidConfig).with_message("no transport wired"));
        };
        let Some(sink) = self.sink else {
            return Err(
                Error::new(ErrorKind::InvalidConfig).with_message("no runnable sink wired")
            );
        };
        let tasks = TaskTable::new();
        let root = tasks.create(None, Phase::FIRST, TaskState::Root);
        debug!(me = %self.me, root = %root, "dependency runtime ready");
        Ok(DepRuntime {
            me: self.me,
            config: self.config,
            tasks,
            root,
            group_tables: Mutex::new(HashMap::new()),
            deferred_remote: Mutex::new(Vec::new()),
            remote_blocked: Mutex::new(TaskList::new()),
            deferred_local: TaskQueue::new(),
            transport,
            sink,
            resolver: self.resolver,
            copyin: self.copyin,
        })
    }
}

/// The dependency engine of one execution unit.
pub struct DepRuntime {
    pub(crate) me: UnitId,
    pub(crate) config: DepConfig,
    pub(crate) tasks: TaskTable,
    pub(crate) root: TaskId,
    pub(crate) group_tables: Mutex<HashMap<TaskId, Arc<Mutex<DepTable>>>>,
    pub(crate) deferred_remote: Mutex<Vec<RemoteRequest>>,
    pub(crate) remote_blocked: Mutex<TaskList>,
    pub(crate) deferred_local: TaskQueue,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) sink: Arc<dyn RunnableSink>,
    pub(crate) resolver: Arc<dyn AddressResolver>,
    pub(crate) copyin: Arc<dyn CopyinSpawner>,
}

impl fmt::Debug for DepRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepRuntime")
            .field("me", &self.me)
            .field("root", &self.root)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl DepRuntime {
    /// Starts a builder for the engine of unit `me`.
    #[must_use]
    pub fn builder(me: UnitId) -> DepRuntimeBuilder {
        DepRuntimeBuilder::new(me)
    }

    /// This engine's unit id.
    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.me
    }

    /// The root group task.
    #[must_use]
    pub fn root(&self) -> TaskId {
        self.root
    }

    /// Creates a task under `parent` in the given phase.
    pub fn create_task(&self, parent: TaskId, phase: Phase) -> TaskId {
        self.tasks.create(Some(parent), phase, TaskState::Created)
    }

    /// Resolves a task id to its record.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks.resolve(id)
    }

    /// Retires a task record, recycling its slot and its group table.
    ///
    /// Wire ids issued for the task stop resolving; late messages naming it
    /// are dropped.
    pub fn retire_task(&self, id: TaskId) {
        self.group_tables
            .lock()
            .expect("group table map lock poisoned")
            .remove(&id);
        self.tasks.remove(id);
    }

    /// The dependency table of `group`, created on first use.
    pub(crate) fn table_for(&self, group: TaskId) -> Arc<Mutex<DepTable>> {
        let mut tables = self
            .group_tables
            .lock()
            .expect("group table map lock poisoned");
        Arc::clone(tables.entry(group).or_insert_with(|| {
            Arc::new(Mutex::new(DepTable::new(
                self.config.bucket_count,
                self.config.entry_pool_capacity,
            )))
        }))
    }

    /// Classifies and files the dependencies of a newly created task.
    ///
    /// Dependencies are processed in declaration order: local ones are
    /// matched against the parent group's table and filed, dependencies on
    /// regions owned by another unit become wire requests (top-level tasks
    /// only), direct edges and copy-ins take their own paths.
    pub fn handle_task(&self, task: TaskId, deps: &[Dependency]) -> Result<()> {
        let Some(record) = self.tasks.resolve(task) else {
            return Err(Error::no_such_task(task));
        };
        let Some(parent) = record.parent() else {
            return Err(Error::internal(format!(
                "root task {task} cannot declare dependencies"
            )));
        };
        debug!(
            task = %task,
            deps = deps.len(),
            phase = %record.phase(),
            "classifying dependencies"
        );
        let parent_is_root = self
            .tasks
            .resolve(parent)
            .map_or(false, |p| p.state() == TaskState::Root);

        for dep in deps {
            if dep.kind == DepKind::Ignore {
                continue;
            }
            let phase = dep.phase.unwrap_or_else(|| record.phase());
            if dep.kind == DepKind::Direct {
                self.handle_local_direct(dep, &record);
                continue;
            }
            if dep.kind == DepKind::CopyIn {
                self.handle_copyin(dep, phase, &record)?;
                continue;
            }
            let unit = if dep.key.team.is_all() {
                Some(dep.key.unit)
            } else {
                self.resolver.global_unit(dep.key.team, dep.key.unit)
            };
            let Some(unit) = unit else {
                warn!(
                    task = %task,
                    key = ?dep.key,
                    "dependency names a unit outside its team, ignored"
                );
                continue;
            };
            trace!(
                task = %task,
                kind = ?dep.kind,
                unit = %unit,
                segment = ?dep.key.segment,
                addr = ?dep.key.addr,
                phase = %phase,
                "classifying dependency"
            );
            let key = RegionKey {
                team: TeamId::ALL,
                unit,
                segment: dep.key.segment,
                addr: dep.key.addr,
            };
            if unit == self.me {
                self.match_local_dep(&record, parent, dep.kind, self.resolver.localize(key), phase);
            } else if parent_is_root {
                self.send_dependency_request(unit, WireDep { kind: dep.kind, key, phase }, task)?;
                self.account_remote_dep(&record);
            } else {
                warn!(task = %task, unit = %unit, "ignoring remote dependency in nested task");
            }
        }
        Ok(())
    }

    /// Matches one local dependency under the parent group's table lock and
    /// files it when the matcher asks for that.
    fn match_local_dep(
        &self,
        record: &Arc<Task>,
        parent: TaskId,
        kind: DepKind,
        key: RegionKey,
        phase: Phase,
    ) {
        let table = self.table_for(parent);
        let mut table = table.lock().expect("dependency table lock poisoned");
        let outcome = if kind == DepKind::DelayedIn {
            matcher::match_delayed_local(&table, &self.tasks, record, key, phase)
        } else {
            matcher::match_local(&mut table, &self.tasks, record, kind, key)
        };
        if outcome == MatchOutcome::File {
            table.insert(DepEntry::new(kind, key, phase, record.id()));
        }
    }

    /// Records a direct edge from an explicitly named local producer.
    ///
    /// A missing or already-finished producer means there is nothing to
    /// wait for; the dependency dissolves silently.
    fn handle_local_direct(&self, dep: &Dependency, task: &Arc<Task>) {
        let Some(producer_id) = dep.producer else {
            return;
        };
        let Some(producer) = self.tasks.resolve(producer_id) else {
            return;
        };
        matcher::link_local(&producer, task);
    }

    /// Queues a dependency request for the owner of a remote region.
    pub(crate) fn send_dependency_request(
        &self,
        dest: UnitId,
        dep: WireDep,
        requester: TaskId,
    ) -> Result<()> {
        self.transport.send(
            dest,
            Message::DepRequest {
                dep,
                requester: RemoteTaskId::from_task(requester),
            },
        )?;
        Ok(())
    }

    /// Tells `dest` that its task `predecessor` must run before our local
    /// `successor`.
    pub(crate) fn send_direct_edge(
        &self,
        dest: UnitId,
        predecessor: RemoteTaskId,
        successor: TaskId,
    ) -> Result<()> {
        self.transport.send(
            dest,
            Message::DirectEdge {
                predecessor,
                successor: RemoteTaskId::from_task(successor),
            },
        )?;
        Ok(())
    }

    /// Answers one remote dependency of `task` on `dest`.
    pub(crate) fn send_release(
        &self,
        dest: UnitId,
        task: RemoteTaskId,
        dep: WireDep,
    ) -> Result<()> {
        self.transport.send(dest, Message::Release { task, dep })?;
        Ok(())
    }

    /// Accounts one outstanding remote dependency; the first one puts the
    /// task on the remote-blocked list.
    pub(crate) fn account_remote_dep(&self, task: &Task) {
        if task.add_remote_dep() == 1 {
            self.remote_blocked
                .lock()
                .expect("remote-blocked list lock poisoned")
                .prepend(task.id());
        }
    }

    /// Dispatches one inbound envelope to its protocol handler.
    pub fn deliver(&self, env: Envelope) -> Result<()> {
        match env.msg {
            Message::DepRequest { dep, requester } => {
                self.handle_remote_request(dep, RemoteTaskRef::new(env.from, requester))
            }
            Message::DirectEdge {
                predecessor,
                successor,
            } => self.handle_remote_direct(predecessor, RemoteTaskRef::new(env.from, successor)),
            Message::Release { task, dep } => {
                let Some(record) = self.tasks.resolve_wire(task) else {
                    return Err(Error::unknown_task(task.raw()));
                };
                trace!(
                    task = %record.id(),
                    from = %env.from,
                    key = ?dep.key,
                    "remote dependency released"
                );
                self.release_remote_dep(record.id())
            }
        }
    }

    /// Pumps the transport until its inbound queue is empty.
    ///
    /// Handler errors are logged and do not stop the pump. Returns the
    /// number of envelopes taken.
    pub fn progress(&self) -> usize {
        let mut handled = 0;
        while let Some(env) = self.transport.poll_inbound() {
            let from = env.from;
            if let Err(err) = self.deliver(env) {
                warn!(%from, %err, "dropping inbound message");
            }
            handled += 1;
        }
        handled
    }

    /// Parks a locally runnable task until the next deferred-local step.
    pub fn defer_local(&self, task: TaskId) {
        self.deferred_local.push(task);
    }

    /// Moves deferred tasks onto `worker`, dropping those that have since
    /// gained remote dependencies (their later release re-enqueues them).
    ///
    /// Both queues stay locked for the whole transfer; deferred first.
    pub fn handle_deferred_local(&self, worker: &TaskQueue) {
        let mut deferred = self.deferred_local.lock();
        let mut target = worker.lock();
        while let Some(task) = deferred.pop() {
            let Some(record) = self.tasks.resolve(task) else {
                continue;
            };
            // Local dependencies were already resolved when the task was
            // deferred; only the remote side can have changed.
            if record.unresolved_remote() == 0 {
                target.push(task);
            } else {
                trace!(task = %task, "deferred task gained remote dependencies, dropped");
            }
        }
    }

    /// Resets the dependency state of a group.
    ///
    /// Drops the group's table, discards its unsent remote releases, and
    /// zeroes its counters. Used between phases once all children of the
    /// group completed.
    pub fn reset(&self, group: TaskId) {
        let table = self
            .group_tables
            .lock()
            .expect("group table map lock poisoned")
            .remove(&group);
        if let Some(table) = table {
            table
                .lock()
                .expect("dependency table lock poisoned")
                .clear();
        }
        if let Some(record) = self.tasks.resolve(group) {
            let dropped = {
                let mut sync = record.lock_sync();
                let dropped = sync.remote_successors.len();
                sync.remote_successors.clear();
                dropped
            };
            record.reset_counters();
            if dropped > 0 {
                debug!(group = %group, dropped, "reset discarded unsent releases");
            }
        }
    }

    /// Tears the engine down: resets the root group and drains every queue.
    ///
    /// The transport must not be pumped afterwards.
    pub fn shutdown(&self) {
        self.reset(self.root);
        self.group_tables
            .lock()
            .expect("group table map lock poisoned")
            .clear();
        self.deferred_remote
            .lock()
            .expect("deferred-remote queue lock poisoned")
            .clear();
        self.remote_blocked
            .lock()
            .expect("remote-blocked list lock poisoned")
            .clear();
        let mut deferred = self.deferred_local.lock();
        while deferred.pop().is_some() {}
        debug!(me = %self.me, "dependency runtime shut down");
    }
}
