//! Identifier types for the dependency engine.
//!
//! These types give type-safe names to the entities the engine juggles:
//! execution units and teams, memory segments and addresses, synchronization
//! phases, and tasks. Task ids wrap arena indices; the wire-facing
//! [`RemoteTaskId`] packs one into a `u64` that only the issuing unit can
//! interpret.

use crate::util::ArenaIndex;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Global identifier of an execution unit (one process in the system).
///
/// Inside a [`RegionKey`](crate::types::RegionKey) the value is relative to
/// the key's team until the address resolver globalizes it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    /// Raw unit number.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitId({})", self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{}", self.0)
    }
}

/// Identifier of a team (a subgroup of units with its own numbering).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u16);

impl TeamId {
    /// The all-units team: unit ids under it are already global.
    pub const ALL: Self = Self(u16::MAX);

    /// Whether this is the all-units team.
    #[must_use]
    pub const fn is_all(self) -> bool {
        self.0 == u16::MAX
    }
}

impl fmt::Debug for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "TeamId(ALL)")
        } else {
            write!(f, "TeamId({})", self.0)
        }
    }
}

/// Identifier of a registered memory segment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u16);

impl SegmentId {
    /// Reserved segment for synthetic copy-in destination regions.
    ///
    /// Never handed out for registered allocations, so copy-in entries can
    /// share the dependency table without colliding with user regions.
    pub const COPYIN: Self = Self(u16::MAX);
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::COPYIN {
            write!(f, "SegmentId(COPYIN)")
        } else {
            write!(f, "SegmentId({})", self.0)
        }
    }
}

/// Address or offset of a memory region within its segment.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Addr(pub u64);

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr({:#x})", self.0)
    }
}

/// Synchronization phase number.
///
/// Phases advance monotonically per task group and are the only ordering
/// shared across units: a dependency in phase `p` can only be satisfied by
/// an output filed in an earlier phase (or matched as a write-after-read
/// hazard by a later one).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Phase(pub u32);

impl Phase {
    /// The first phase of a group.
    pub const FIRST: Self = Self(0);

    /// The phase after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase({})", self.0)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A unique identifier for a task known to the local task table.
///
/// Valid only on the unit that created the task; the wire form is
/// [`RemoteTaskId`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) ArenaIndex);

impl TaskId {
    /// Creates a task ID from an arena index (internal use).
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index (internal use).
    #[must_use]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a task ID for testing purposes.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }

    /// Creates a default task ID for tests that don't care about the value.
    #[doc(hidden)]
    #[must_use]
    pub const fn testing_default() -> Self {
        Self(ArenaIndex::new(0, 0))
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0.index())
    }
}

/// Opaque wire identifier for a task on its origin unit.
///
/// Other units carry it around and echo it back in direct-edge and release
/// messages; only the origin can decode it, and a stale id (the task slot
/// was recycled since) decodes to a miss rather than a wrong task.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteTaskId(u64);

impl RemoteTaskId {
    /// Wraps a raw wire value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw wire value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Packs a local task id for the wire.
    #[must_use]
    pub(crate) const fn from_task(task: TaskId) -> Self {
        let idx = task.arena_index();
        Self(((idx.index() as u64) << 32) | idx.generation() as u64)
    }

    /// Recovers the arena index this id was packed from.
    ///
    /// Meaningful only on the issuing unit; the table lookup still has to
    /// validate the generation.
    #[must_use]
    pub(crate) const fn to_arena_index(self) -> ArenaIndex {
        #[allow(clippy::cast_possible_truncation)]
        ArenaIndex::new((self.0 >> 32) as u32, self.0 as u32)
    }
}

impl fmt::Debug for RemoteTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteTaskId({:#x})", self.0)
    }
}
