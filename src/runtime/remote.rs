//! Remote dependency resolution.
//!
//! Requests from other units are never matched on arrival; they queue on
//! the engine and a batch pass resolves them against the root group's
//! table once the local picture is complete. A request from an earlier
//! phase than every local writer attaches to the newest writer before it
//! (the release is sent when that writer completes). A local writer at or
//! after the request's phase must instead wait for the remote reader, so
//! the pass answers with a direct edge back to the origin. A request no
//! local writer can serve is released immediately: the data is assumed
//! valid on the owner.
//!
//! One request can produce both answers: a direct edge for the earliest
//! later writer and an immediate release because nothing older matched.

use std::mem;

use crate::error::{Error, Result};
use crate::record::RemoteSuccessor;
use crate::runtime::dep_table::DepTable;
use crate::runtime::engine::DepRuntime;
use crate::runtime::task_table::TaskTable;
use crate::tracing_compat::{debug, trace, warn};
use crate::types::task_ref::RemoteTaskRef;
use crate::types::{DepKind, Phase, RemoteTaskId, TaskId, WireDep};

/// A dependency request from another unit, waiting for the batch pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RemoteRequest {
    /// The requested dependency, keyed in this unit's terms.
    pub dep: WireDep,
    /// The requesting task on its origin unit.
    pub requester: RemoteTaskRef,
}

/// Result of scanning the table for one deferred request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeferredOutcome {
    /// The request was attached to an earlier active producer, which now
    /// owes it a release.
    pub attached: bool,
    /// Earliest local writer at or after the request's phase; it must wait
    /// for the remote reader before overwriting the region.
    pub direct_dep: Option<TaskId>,
}

/// Scans the table for the producer serving `req`.
///
/// Walks the request's bucket phase-descending, looking only at output
/// entries on the same region. The first active producer from an earlier
/// phase takes the request as a remote successor (recorded here, under
/// that producer's lock). Writers at or after the request's phase are
/// tracked and the earliest survives as the direct-edge candidate. A
/// producer that already finished ends the scan: nothing older can serve
/// the request either.
pub(crate) fn resolve_deferred(
    table: &DepTable,
    tasks: &TaskTable,
    req: &RemoteRequest,
) -> DeferredOutcome {
    let mut direct_dep: Option<(TaskId, Phase)> = None;
    let mut attached = false;
    let mut cur = table.head_for(&req.dep.key);
    while let Some(idx) = cur {
        let entry = *table.entry(idx);
        cur = entry.next;
        if !entry.kind.is_output() || entry.key != req.dep.key {
            continue;
        }
        let Some(producer) = tasks.resolve(entry.task) else {
            break;
        };
        let mut sync = producer.lock_sync();
        if !sync.state.is_active() {
            break;
        }
        if entry.phase < req.dep.phase {
            sync.add_remote_successor(RemoteSuccessor {
                task: req.requester,
                dep: req.dep,
            });
            trace!(
                producer = %entry.task,
                requester = ?req.requester,
                phase = %entry.phase,
                "remote request attached to local producer"
            );
            attached = true;
            break;
        }
        drop(sync);
        // Writer at or after the requested phase: it would overwrite the
        // reader's input. Only the earliest one needs the edge; later
        // writers are ordered behind it locally.
        if direct_dep.map_or(true, |(_, p)| p > entry.phase) {
            direct_dep = Some((entry.task, entry.phase));
        }
    }
    DeferredOutcome {
        attached,
        direct_dep: direct_dep.map(|(task, _)| task),
    }
}

impl DepRuntime {
    /// Accepts a dependency request from another unit.
    ///
    /// Only plain input requests are supported; anything else is rejected.
    /// Accepted requests are deferred to
    /// [`handle_deferred_remote`](DepRuntime::handle_deferred_remote),
    /// never resolved on arrival.
    pub fn handle_remote_request(&self, dep: WireDep, requester: RemoteTaskRef) -> Result<()> {
        if dep.kind != DepKind::In {
            return Err(Error::unsupported_remote_dep(format!(
                "{:?} request from {}",
                dep.kind, requester.origin
            )));
        }
        let dep = WireDep {
            key: self.resolver.localize(dep.key),
            ..dep
        };
        trace!(
            origin = %requester.origin,
            key = ?dep.key,
            phase = %dep.phase,
            "deferring remote dependency request"
        );
        self.deferred_remote
            .lock()
            .expect("deferred-remote queue lock poisoned")
            .push(RemoteRequest { dep, requester });
        Ok(())
    }

    /// Resolves every queued remote request against the root group's table.
    ///
    /// The queue is taken whole; requests arriving during the pass join
    /// the next one. A send failure does not stop the pass; the first
    /// error is returned once every request has been handled. Returns the
    /// number of requests resolved.
    pub fn handle_deferred_remote(&self) -> Result<usize> {
        let batch = mem::take(
            &mut *self
                .deferred_remote
                .lock()
                .expect("deferred-remote queue lock poisoned"),
        );
        if batch.is_empty() {
            return Ok(0);
        }
        debug!(requests = batch.len(), "resolving deferred remote requests");
        let handled = batch.len();
        let table = self.table_for(self.root);
        let mut first_err: Option<Error> = None;
        for req in batch {
            let outcome = {
                let table = table.lock().expect("dependency table lock poisoned");
                resolve_deferred(&table, &self.tasks, &req)
            };
            if let Err(err) = self.answer_deferred(&req, outcome) {
                warn!(requester = ?req.requester, %err, "failed to answer remote request");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(handled),
        }
    }

    /// Sends whatever `outcome` owes back to the request's origin.
    fn answer_deferred(&self, req: &RemoteRequest, outcome: DeferredOutcome) -> Result<()> {
        if let Some(writer) = outcome.direct_dep {
            match self.tasks.resolve(writer) {
                Some(task) => {
                    self.send_direct_edge(req.requester.origin, req.requester.id, writer)?;
                    self.account_remote_dep(&task);
                }
                None => warn!(
                    task = %writer,
                    "direct-dependency candidate retired before the edge was sent"
                ),
            }
        }
        if !outcome.attached {
            // No earlier producer: the data is assumed valid at the origin.
            trace!(requester = ?req.requester, "releasing unmatched remote request");
            self.send_release(req.requester.origin, req.requester.id, req.dep)?;
        }
        Ok(())
    }

    /// Records a remote task as waiting on a local one (inbound direct
    /// edge).
    ///
    /// If the local task already finished (or was retired), the release is
    /// sent right away instead.
    pub fn handle_remote_direct(&self, local: RemoteTaskId, dependent: RemoteTaskRef) -> Result<()> {
        let Some(task) = self.tasks.resolve_wire(local) else {
            self.send_release(dependent.origin, dependent.id, WireDep::direct())?;
            return Ok(());
        };
        let recorded = {
            let mut sync = task.lock_sync();
            if sync.state.is_active() {
                sync.add_remote_successor(RemoteSuccessor {
                    task: dependent,
                    dep: WireDep::direct(),
                });
                true
            } else {
                false
            }
        };
        if recorded {
            trace!(local = %task.id(), remote = ?dependent, "recorded direct remote successor");
        } else {
            self.send_release(dependent.origin, dependent.id, WireDep::direct())?;
        }
        Ok(())
    }
}
