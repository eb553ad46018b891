//! Per-group dependency table.
//!
//! Each task group keeps one table of the dependencies its children have
//! filed: a fixed bucket array over a pooled entry arena, with each bucket
//! holding a singly linked chain of entries. Chains are kept in descending
//! phase order as a structural property of [`DepTable::insert`]; matchers
//! rely on it to stop scanning early and never have to re-sort.
//!
//! The table carries no lock of its own; the owner wraps it in a mutex and
//! that group-table lock is the outermost lock of the engine.

use crate::types::{DepKind, Phase, RegionKey, TaskId};
use crate::util::{Arena, ArenaIndex};

/// One filed dependency.
///
/// The owning task is always local; remote requests never enter the table
/// (they wait on the deferred queue and then on a producer's
/// remote-successor list).
#[derive(Debug, Clone, Copy)]
pub(crate) struct DepEntry {
    /// Access kind; upgraded in place from `In` to `InOut` when the owner
    /// re-declares the region as an output.
    pub kind: DepKind,
    /// Target region in local terms.
    pub key: RegionKey,
    /// Phase the dependency belongs to.
    pub phase: Phase,
    /// Task that filed the dependency.
    pub task: TaskId,
    /// Next entry in the bucket chain.
    pub next: Option<ArenaIndex>,
}

impl DepEntry {
    pub(crate) const fn new(kind: DepKind, key: RegionKey, phase: Phase, task: TaskId) -> Self {
        Self {
            kind,
            key,
            phase,
            task,
            next: None,
        }
    }
}

/// Bucketed chain store of filed dependencies for one group.
#[derive(Debug)]
pub(crate) struct DepTable {
    buckets: Box<[Option<ArenaIndex>]>,
    entries: Arena<DepEntry>,
}

impl DepTable {
    /// Creates an empty table with `bucket_count` buckets.
    pub(crate) fn new(bucket_count: usize, entry_capacity: usize) -> Self {
        Self {
            buckets: vec![None; bucket_count].into_boxed_slice(),
            entries: Arena::with_capacity(entry_capacity),
        }
    }

    /// Bucket slot for a region key.
    ///
    /// Word-aligned addresses would waste the low bits, so they are shifted
    /// out before segment and unit are folded in above them.
    pub(crate) fn slot(&self, key: &RegionKey) -> usize {
        let mut hash = key.addr.0 >> 2;
        hash ^= u64::from(key.segment.0) << 16;
        hash ^= u64::from(key.unit.0) << 32;
        usize::try_from(hash % self.buckets.len() as u64).expect("bucket slot out of range")
    }

    /// Head of the chain that would hold `key`.
    pub(crate) fn head_for(&self, key: &RegionKey) -> Option<ArenaIndex> {
        self.buckets[self.slot(key)]
    }

    /// Entry lookup; the index must be live.
    pub(crate) fn entry(&self, idx: ArenaIndex) -> &DepEntry {
        self.entries.get(idx).expect("dep entry index stale")
    }

    /// Mutable entry lookup; the index must be live.
    pub(crate) fn entry_mut(&mut self, idx: ArenaIndex) -> &mut DepEntry {
        self.entries.get_mut(idx).expect("dep entry index stale")
    }

    /// Files `entry` at its phase position.
    ///
    /// The chain stays phase-descending; an entry ties ahead of existing
    /// entries of the same phase, so within a phase the newest filing is
    /// seen first and a consumer matches the most recent producer.
    pub(crate) fn insert(&mut self, mut entry: DepEntry) -> ArenaIndex {
        let slot = self.slot(&entry.key);
        let mut prev: Option<ArenaIndex> = None;
        let mut cur = self.buckets[slot];
        while let Some(idx) = cur {
            let e = self.entry(idx);
            if e.phase <= entry.phase {
                break;
            }
            prev = Some(idx);
            cur = e.next;
        }
        entry.next = cur;
        let idx = self.entries.insert(entry);
        match prev {
            None => self.buckets[slot] = Some(idx),
            Some(p) => self.entry_mut(p).next = Some(idx),
        }
        idx
    }

    /// Number of filed entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Recycles every chain, leaving the pool capacity in place.
    pub(crate) fn clear(&mut self) {
        for i in 0..self.buckets.len() {
            let mut cur = self.buckets[i].take();
            while let Some(idx) = cur {
                cur = self.entries.remove(idx).and_then(|e| e.next);
            }
        }
        debug_assert!(self.entries.is_empty());
    }
}
