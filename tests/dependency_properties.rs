//! Property tests over randomly generated local task programs.
//!
//! A program is a list of tasks in creation order, each with a phase and
//! a handful of region accesses. Whatever the program, three things must
//! hold after the host loop drains: every task ran exactly once, any two
//! tasks that conflict on a region (at least one writes it) ran in
//! declaration order, and the engine ends with clean counters.

#[macro_use]
mod common;

use common::{cluster, drain_run, init_test_logging, seed_runnable, test_proptest_config};
use proptest::prelude::*;
use std::collections::BTreeSet;
use taskmesh::{Addr, Dependency, Phase, RegionKey, SegmentId, TaskState, UnitId};

const ADDRS: [u64; 3] = [0x40, 0x80, 0xc0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    const fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }

    fn to_dependency(self, key: RegionKey) -> Dependency {
        match self {
            Self::Read => Dependency::input(key),
            Self::Write => Dependency::output(key),
            Self::ReadWrite => Dependency::input_output(key),
        }
    }
}

#[derive(Debug, Clone)]
struct DeclaredTask {
    phase: u32,
    accesses: Vec<(u64, Access)>,
}

impl DeclaredTask {
    fn access(&self, addr: u64) -> Option<Access> {
        self.accesses
            .iter()
            .find(|&&(a, _)| a == addr)
            .map(|&(_, access)| access)
    }
}

fn access_strategy() -> impl Strategy<Value = (u64, Access)> {
    (
        prop_oneof![Just(ADDRS[0]), Just(ADDRS[1]), Just(ADDRS[2])],
        prop_oneof![
            Just(Access::Read),
            Just(Access::Write),
            Just(Access::ReadWrite)
        ],
    )
}

fn program_strategy() -> impl Strategy<Value = Vec<DeclaredTask>> {
    prop::collection::vec(
        (1u32..=4, prop::collection::vec(access_strategy(), 0..=3)).prop_map(
            |(phase, accesses)| {
                // One access per region and task; repeats fold into the
                // first declaration.
                let mut seen = BTreeSet::new();
                let accesses = accesses
                    .into_iter()
                    .filter(|&(addr, _)| seen.insert(addr))
                    .collect();
                DeclaredTask { phase, accesses }
            },
        ),
        1..=16,
    )
    .prop_map(|mut tasks| {
        // Hosts create tasks phase by phase; the sort is stable, so
        // declaration order within a phase survives.
        tasks.sort_by_key(|t| t.phase);
        tasks
    })
}

fn region(addr: u64) -> RegionKey {
    RegionKey::global(UnitId(0), SegmentId(1), Addr(addr))
}

proptest! {
    #![proptest_config(test_proptest_config(64))]

    #[test]
    fn random_programs_run_each_task_once_in_conflict_order(program in program_strategy()) {
        init_test_logging();
        let unit = cluster(1).remove(0);
        let rt = &unit.runtime;

        let ids: Vec<_> = program
            .iter()
            .map(|task| rt.create_task(rt.root(), Phase(task.phase)))
            .collect();
        for (task, &id) in program.iter().zip(&ids) {
            let deps: Vec<Dependency> = task
                .accesses
                .iter()
                .map(|&(addr, access)| access.to_dependency(region(addr)))
                .collect();
            rt.handle_task(id, &deps).unwrap();
        }

        for &id in &ids {
            seed_runnable(&unit, id);
        }
        let order = drain_run(&unit);

        // Every task ran exactly once.
        prop_assert_eq!(order.len(), ids.len());
        let ran: BTreeSet<_> = order.iter().copied().collect();
        prop_assert_eq!(ran.len(), ids.len());

        // Conflicting pairs ran in declaration order.
        let position = |id| order.iter().position(|&t| t == id).unwrap();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                for addr in ADDRS {
                    let (Some(a), Some(b)) =
                        (program[i].access(addr), program[j].access(addr))
                    else {
                        continue;
                    };
                    if a.writes() || b.writes() {
                        prop_assert!(
                            position(ids[i]) < position(ids[j]),
                            "task {} ({:?} on {:#x}) ran after task {} ({:?})",
                            ids[i], a, addr, ids[j], b,
                        );
                    }
                }
            }
        }

        // The engine is clean: every task done, no counters left behind.
        for &id in &ids {
            let record = rt.task(id).unwrap();
            prop_assert_eq!(record.state(), TaskState::Done);
            prop_assert_eq!(record.unresolved_local(), 0);
            prop_assert_eq!(record.unresolved_remote(), 0);
        }
    }
}
