//! Local dependency matching.
//!
//! Matching runs at task creation, under the group-table lock, and turns a
//! declared dependency into successor edges against the entries already
//! filed. Two walks share the bucket chains: [`match_local`] ignores phases
//! and matches against the most recent accesses, stopping at the first
//! output entry because a producer fully shadows everything older on the
//! same region. [`match_delayed_local`] honors an explicit earlier phase,
//! skipping younger entries but ordering the read before the next writer so
//! a late-filed read can never observe an overwrite.
//!
//! Edges are accounted on the producer's sync lock; the consumer's counter
//! moves inside that critical section so a completing producer can never
//! release an edge that is still being recorded.

use std::sync::Arc;

use crate::record::Task;
use crate::runtime::dep_table::DepTable;
use crate::runtime::task_table::TaskTable;
use crate::tracing_compat::{trace, warn};
use crate::types::{DepKind, Phase, RegionKey, TaskId};

/// What the caller must do with the dependency after matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchOutcome {
    /// File the dependency in the table at its phase position.
    File,
    /// The task already has an entry on this region; nothing to file.
    AlreadyFiled,
    /// Fully represented by the edges created (or by nothing at all);
    /// no entry is filed.
    Satisfied,
}

/// Records `consumer` as a successor of `producer`.
///
/// Returns `true` when a new edge was created. Skips producers that are no
/// longer active (their outputs are already final) and edges that already
/// exist. The consumer counter is incremented while the producer lock is
/// held, so the producer cannot complete between recording the edge and
/// accounting it.
pub(crate) fn link_local(producer: &Task, consumer: &Task) -> bool {
    let mut sync = producer.lock_sync();
    if !sync.state.is_active() {
        trace!(
            producer = %producer.id(),
            consumer = %consumer.id(),
            state = %sync.state,
            "producer no longer active, edge skipped"
        );
        return false;
    }
    if !sync.add_successor(consumer.id()) {
        return false;
    }
    let unresolved = consumer.add_local_dep();
    trace!(
        producer = %producer.id(),
        consumer = %consumer.id(),
        unresolved,
        "local edge recorded"
    );
    true
}

/// Orders `reader` before the later `writer` (write-after-read hazard).
///
/// The writer gains a local dependency on the reader.
///
/// # Panics
///
/// When the writer has already finished: a read pinned to an earlier phase
/// can no longer be ordered before it.
fn link_war(reader: &Task, writer: &Arc<Task>) {
    if !reader.lock_sync().add_successor(writer.id()) {
        return;
    }
    let sync = writer.lock_sync();
    assert!(
        sync.state.is_active(),
        "later writer {} is already {}; a phase-pinned read cannot be ordered before it",
        writer.id(),
        sync.state
    );
    writer.add_local_dep();
    drop(sync);
    trace!(
        reader = %reader.id(),
        writer = %writer.id(),
        "write-after-read edge recorded"
    );
}

/// Matches an immediate dependency of `task` against the filed entries.
///
/// Walks the bucket chain newest-first, creating an edge for every entry on
/// the same region that conflicts with `kind`, and stops at the first
/// output entry. An entry the task itself filed earlier is upgraded in
/// place (`In` to `InOut`) when the new declaration is an output; nothing
/// new is filed in that case.
pub(crate) fn match_local(
    table: &mut DepTable,
    tasks: &TaskTable,
    task: &Task,
    kind: DepKind,
    key: RegionKey,
) -> MatchOutcome {
    let mut found_producer = false;
    let mut cur = table.head_for(&key);
    while let Some(idx) = cur {
        let entry = *table.entry(idx);
        cur = entry.next;
        if entry.key != key {
            continue;
        }
        if entry.task == task.id() {
            if entry.kind == DepKind::In && kind.is_output() {
                table.entry_mut(idx).kind = DepKind::InOut;
                trace!(task = %task.id(), key = ?key, "upgraded filed entry to read-write");
            }
            return MatchOutcome::AlreadyFiled;
        }
        if kind.is_output() || entry.kind.is_output() {
            if let Some(producer) = tasks.resolve(entry.task) {
                link_local(&producer, task);
            }
        }
        if entry.kind.is_output() {
            found_producer = true;
            break;
        }
    }
    if !kind.is_output() && !found_producer {
        trace!(
            task = %task.id(),
            key = ?key,
            "no producer for input dependency; data assumed valid"
        );
    }
    MatchOutcome::File
}

/// Matches a read pinned to an explicit earlier `phase`.
///
/// Entries younger than `phase` are skipped, but the nearest later writer
/// on the region is remembered: if the read matches a producer, that
/// writer must additionally wait for the read to finish. When such a
/// write-after-read edge exists the dependency is fully represented and
/// nothing is filed; without one the entry is filed at its phase position.
///
/// # Panics
///
/// When the task already has an entry on the region at or before `phase`,
/// or when the tracked later writer has already finished.
pub(crate) fn match_delayed_local(
    table: &DepTable,
    tasks: &TaskTable,
    task: &Task,
    key: RegionKey,
    phase: Phase,
) -> MatchOutcome {
    let mut next_out: Option<TaskId> = None;
    let mut cur = table.head_for(&key);
    while let Some(idx) = cur {
        let entry = *table.entry(idx);
        cur = entry.next;
        if entry.key != key {
            continue;
        }
        if entry.phase > phase {
            // Chains are phase-descending, so the last writer seen here is
            // the nearest one after the pinned phase.
            if entry.kind.is_output() {
                next_out = Some(entry.task);
            }
            continue;
        }
        assert!(
            entry.task != task.id(),
            "task {} cannot re-match its own entry on {:?} through a phase-pinned read",
            task.id(),
            key
        );
        if entry.kind.is_output() {
            if let Some(producer) = tasks.resolve(entry.task) {
                link_local(&producer, task);
            }
            if let Some(next_id) = next_out {
                let Some(writer) = tasks.resolve(next_id) else {
                    panic!(
                        "later writer {next_id} on {key:?} already retired; \
                         a phase-pinned read cannot be ordered before it"
                    );
                };
                link_war(task, &writer);
                return MatchOutcome::Satisfied;
            }
            return MatchOutcome::File;
        }
    }
    warn!(
        task = %task.id(),
        key = ?key,
        phase = %phase,
        "no producer for phase-pinned read; treating it as satisfied"
    );
    MatchOutcome::Satisfied
}
