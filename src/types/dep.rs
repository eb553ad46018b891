//! Dependency descriptors declared by tasks.
//!
//! A task declares, at creation time, how it accesses memory regions. Each
//! declaration carries an access kind, the region it targets, and an
//! optional explicit phase. The engine classifies these into local matches,
//! remote requests, direct edges, and copy-in synthesis.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::id::{Addr, Phase, SegmentId, TaskId, TeamId, UnitId};

/// Access kind of a declared dependency.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DepKind {
    /// Read access; waits for the newest earlier output on the region.
    In,
    /// Write access; orders after earlier accesses on the region.
    Out,
    /// Read-write access; matches like an output.
    InOut,
    /// Read access bound to an explicit earlier phase, filed late.
    DelayedIn,
    /// Edge to an explicitly named local producer task, no region.
    Direct,
    /// Read access plus prefetch of a remote region into a local buffer.
    CopyIn,
    /// No dependency; skipped during classification.
    Ignore,
}

impl DepKind {
    /// Whether this kind acts as a producer (output side) during matching.
    #[must_use]
    pub const fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// The memory region a dependency targets.
///
/// `unit` is relative to `team` until the address resolver globalizes it;
/// under [`TeamId::ALL`] it is already global. Two keys name the same region
/// only when every component matches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    /// Team the unit id is relative to.
    pub team: TeamId,
    /// Owning execution unit.
    pub unit: UnitId,
    /// Registered segment, or [`SegmentId::COPYIN`] for synthetic regions.
    pub segment: SegmentId,
    /// Address or offset within the segment.
    pub addr: Addr,
}

impl RegionKey {
    /// Placeholder key for dependencies that target no region (direct edges).
    pub const NULL: Self = Self {
        team: TeamId::ALL,
        unit: UnitId(0),
        segment: SegmentId(0),
        addr: Addr(0),
    };

    /// Builds a key on the all-units team (unit id already global).
    #[must_use]
    pub const fn global(unit: UnitId, segment: SegmentId, addr: Addr) -> Self {
        Self {
            team: TeamId::ALL,
            unit,
            segment,
            addr,
        }
    }
}

impl fmt::Debug for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegionKey({:?}/{}, {:?}, {:#x})",
            self.team, self.unit, self.segment, self.addr.0
        )
    }
}

/// A single dependency declaration.
///
/// Build one through the kind-specific constructors; `phase` defaults to
/// the declaring task's phase and can be pinned with [`Dependency::in_phase`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dependency {
    /// Access kind.
    pub kind: DepKind,
    /// Target region; [`RegionKey::NULL`] for direct edges.
    pub key: RegionKey,
    /// Explicit phase, or `None` for the declaring task's phase.
    pub phase: Option<Phase>,
    /// Producer task for [`DepKind::Direct`].
    pub producer: Option<TaskId>,
    /// Local destination buffer for [`DepKind::CopyIn`].
    pub copy_dest: Option<Addr>,
}

impl Dependency {
    const fn region(kind: DepKind, key: RegionKey) -> Self {
        Self {
            kind,
            key,
            phase: None,
            producer: None,
            copy_dest: None,
        }
    }

    /// Read dependency on `key`.
    #[must_use]
    pub const fn input(key: RegionKey) -> Self {
        Self::region(DepKind::In, key)
    }

    /// Write dependency on `key`.
    #[must_use]
    pub const fn output(key: RegionKey) -> Self {
        Self::region(DepKind::Out, key)
    }

    /// Read-write dependency on `key`.
    #[must_use]
    pub const fn input_output(key: RegionKey) -> Self {
        Self::region(DepKind::InOut, key)
    }

    /// Read dependency on `key` pinned to an explicit earlier `phase`,
    /// matched through the delayed path.
    #[must_use]
    pub const fn delayed_input(key: RegionKey, phase: Phase) -> Self {
        let mut dep = Self::region(DepKind::DelayedIn, key);
        dep.phase = Some(phase);
        dep
    }

    /// Direct edge from `producer` to the declaring task.
    #[must_use]
    pub const fn direct(producer: TaskId) -> Self {
        let mut dep = Self::region(DepKind::Direct, RegionKey::NULL);
        dep.producer = Some(producer);
        dep
    }

    /// Copy-in dependency: read `src`, prefetched into the local buffer at
    /// `dest`.
    #[must_use]
    pub const fn copy_in(src: RegionKey, dest: Addr) -> Self {
        let mut dep = Self::region(DepKind::CopyIn, src);
        dep.copy_dest = Some(dest);
        dep
    }

    /// Placeholder that the engine skips.
    #[must_use]
    pub const fn ignore() -> Self {
        Self::region(DepKind::Ignore, RegionKey::NULL)
    }

    /// Pins the dependency to an explicit phase.
    #[must_use]
    pub const fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// Dependency descriptor with its phase resolved, as carried in wire
/// messages and successor records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDep {
    /// Access kind.
    pub kind: DepKind,
    /// Target region, in the owner's local terms.
    pub key: RegionKey,
    /// Concrete phase.
    pub phase: Phase,
}

impl WireDep {
    /// Input descriptor on `key` in `phase`.
    #[must_use]
    pub const fn input(key: RegionKey, phase: Phase) -> Self {
        Self {
            kind: DepKind::In,
            key,
            phase,
        }
    }

    /// Bookkeeping descriptor for a direct edge (no region).
    #[must_use]
    pub const fn direct() -> Self {
        Self {
            kind: DepKind::Direct,
            key: RegionKey::NULL,
            phase: Phase::FIRST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(addr: u64) -> RegionKey {
        RegionKey::global(UnitId(0), SegmentId(1), Addr(addr))
    }

    #[test]
    fn output_kinds() {
        assert!(DepKind::Out.is_output());
        assert!(DepKind::InOut.is_output());
        assert!(!DepKind::In.is_output());
        assert!(!DepKind::DelayedIn.is_output());
    }

    #[test]
    fn constructors_set_kind_and_payload() {
        let d = Dependency::input(key(0x40));
        assert_eq!(d.kind, DepKind::In);
        assert_eq!(d.phase, None);

        let d = Dependency::delayed_input(key(0x40), Phase(2));
        assert_eq!(d.kind, DepKind::DelayedIn);
        assert_eq!(d.phase, Some(Phase(2)));

        let producer = TaskId::testing_default();
        let d = Dependency::direct(producer);
        assert_eq!(d.producer, Some(producer));

        let d = Dependency::copy_in(key(0x80), Addr(0x1000));
        assert_eq!(d.copy_dest, Some(Addr(0x1000)));
    }

    #[test]
    fn full_key_equality() {
        let a = RegionKey::global(UnitId(0), SegmentId(1), Addr(8));
        let mut b = a;
        b.segment = SegmentId(2);
        assert_ne!(a, b);
    }

    #[test]
    fn in_phase_overrides_default() {
        let d = Dependency::input(key(8)).in_phase(Phase(7));
        assert_eq!(d.phase, Some(Phase(7)));
    }
}
