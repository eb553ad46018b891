//! Copy-in dependencies: reads of remote regions served through a local
//! prefetch buffer.
//!
//! A copy-in declaration names a remote source region and a local
//! destination buffer. The first task to declare it gets a synthesized
//! prefetch task (created through the [`CopyinSpawner`] collaborator)
//! that writes the destination; every later task in the same phase reuses
//! that prefetch and only waits for it. Destination buffers live on a
//! reserved segment so their entries share the group's dependency table
//! without colliding with user regions.

use std::sync::Arc;

use crate::error::{Error, ErrorKind, Result};
use crate::record::Task;
use crate::runtime::dep_table::DepEntry;
use crate::runtime::engine::DepRuntime;
use crate::runtime::matcher;
use crate::tracing_compat::trace;
use crate::types::{DepKind, Dependency, Phase, RegionKey, SegmentId, TaskId, TeamId};

/// Creates the prefetch task behind a copy-in dependency.
pub trait CopyinSpawner: Send + Sync {
    /// Synthesizes exactly one task that copies the dependency's source
    /// region into the buffer at `dest`.
    ///
    /// `consumer` is the task whose declaration triggered the synthesis;
    /// the prefetch task belongs in the same group. It must declare an
    /// `Out` dependency on `dest` in the dependency's phase (through
    /// [`DepRuntime::handle_task`]) before this returns, so the retry scan
    /// finds it.
    fn create_copyin_task(
        &self,
        runtime: &DepRuntime,
        dep: &Dependency,
        dest: RegionKey,
        consumer: TaskId,
    ) -> Result<()>;
}

/// Default spawner: no copy-in support wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCopyin;

impl CopyinSpawner for NoCopyin {
    fn create_copyin_task(
        &self,
        _runtime: &DepRuntime,
        dep: &Dependency,
        dest: RegionKey,
        _consumer: TaskId,
    ) -> Result<()> {
        Err(Error::new(ErrorKind::CopyinFailed).with_message(format!(
            "no copy-in spawner wired (src {:?}, dest {:?})",
            dep.key, dest
        )))
    }
}

impl DepRuntime {
    /// Resolves a copy-in dependency of `task`.
    ///
    /// Attaches to an existing prefetch of the same destination in the
    /// same phase, or synthesizes one and retries the scan once.
    ///
    /// # Panics
    ///
    /// When the spawner reported success but no prefetch entry appeared on
    /// the destination region.
    pub(crate) fn handle_copyin(
        &self,
        dep: &Dependency,
        phase: Phase,
        task: &Arc<Task>,
    ) -> Result<()> {
        let Some(dest_addr) = dep.copy_dest else {
            return Err(Error::internal(format!(
                "copy-in dependency of {} has no destination buffer",
                task.id()
            )));
        };
        let Some(parent) = task.parent() else {
            return Err(Error::internal(format!(
                "root task {} cannot declare dependencies",
                task.id()
            )));
        };
        let dest = RegionKey {
            team: TeamId::ALL,
            unit: self.me,
            segment: SegmentId::COPYIN,
            addr: dest_addr,
        };
        let dep = Dependency {
            phase: Some(phase),
            ..*dep
        };
        trace!(
            task = %task.id(),
            src = ?dep.key,
            dest = ?dest,
            phase = %phase,
            "handling copy-in dependency"
        );

        for round in 0..2 {
            if self.attach_to_prefetch(parent, dest, phase, task) {
                return Ok(());
            }
            if round == 0 {
                trace!(dest = ?dest, phase = %phase, "synthesizing prefetch task");
                self.copyin.create_copyin_task(self, &dep, dest, task.id())?;
            }
        }
        panic!("prefetch entry on {dest:?} missing after creation");
    }

    /// Scans the destination bucket for a prefetch in `phase` and waits on
    /// it; files the read on the destination key when found.
    ///
    /// Prefetches are only reused within the same phase. Entries from
    /// earlier phases end the scan (chains are phase-descending).
    fn attach_to_prefetch(
        &self,
        parent: TaskId,
        dest: RegionKey,
        phase: Phase,
        task: &Arc<Task>,
    ) -> bool {
        let table = self.table_for(parent);
        let mut table = table.lock().expect("dependency table lock poisoned");
        let mut cur = table.head_for(&dest);
        while let Some(idx) = cur {
            let entry = *table.entry(idx);
            cur = entry.next;
            if entry.key != dest {
                continue;
            }
            if entry.phase < phase {
                break;
            }
            if entry.kind.is_output() && entry.phase == phase {
                let Some(copier) = self.tasks.resolve(entry.task) else {
                    continue;
                };
                matcher::link_local(&copier, task);
                table.insert(DepEntry::new(DepKind::In, dest, phase, task.id()));
                trace!(
                    task = %task.id(),
                    copier = %entry.task,
                    "reusing prefetch for copy-in"
                );
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::DepRuntimeBuilder;
    use crate::test_utils::CollectingSink;
    use crate::transport::LoopbackTransport;
    use crate::types::{Addr, UnitId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Spawner that creates a real prefetch task through the runtime.
    #[derive(Debug, Default)]
    struct TestSpawner {
        created: AtomicUsize,
    }

    impl CopyinSpawner for TestSpawner {
        fn create_copyin_task(
            &self,
            runtime: &DepRuntime,
            dep: &Dependency,
            dest: RegionKey,
            consumer: TaskId,
        ) -> Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let parent = runtime
                .task(consumer)
                .and_then(|t| t.parent())
                .unwrap_or_else(|| runtime.root());
            let phase = dep.phase.unwrap_or(Phase::FIRST);
            let copy = runtime.create_task(parent, phase);
            runtime.handle_task(copy, &[Dependency::output(dest).in_phase(phase)])
        }
    }

    struct Fixture {
        rt: DepRuntime,
        sink: Arc<CollectingSink>,
        spawner: Arc<TestSpawner>,
    }

    fn fixture() -> Fixture {
        let sink = Arc::new(CollectingSink::default());
        let spawner = Arc::new(TestSpawner::default());
        let rt = DepRuntimeBuilder::new(UnitId(0))
            .transport(Arc::new(LoopbackTransport::mesh(&[UnitId(0)]).remove(0)))
            .sink(sink.clone())
            .copyin(spawner.clone())
            .build()
            .unwrap();
        Fixture { rt, sink, spawner }
    }

    fn copy_dep() -> Dependency {
        let src = RegionKey::global(UnitId(1), SegmentId(2), Addr(0x4000));
        Dependency::copy_in(src, Addr(0x1000))
    }

    #[test]
    fn first_copyin_synthesizes_one_prefetch() {
        let fx = fixture();
        let reader = fx.rt.create_task(fx.rt.root(), Phase(1));
        fx.rt.handle_task(reader, &[copy_dep()]).unwrap();

        assert_eq!(fx.spawner.created.load(Ordering::SeqCst), 1);
        assert_eq!(fx.rt.task(reader).unwrap().unresolved_local(), 1);
    }

    #[test]
    fn same_phase_readers_share_the_prefetch() {
        let fx = fixture();
        let first = fx.rt.create_task(fx.rt.root(), Phase(1));
        let second = fx.rt.create_task(fx.rt.root(), Phase(1));
        fx.rt.handle_task(first, &[copy_dep()]).unwrap();
        fx.rt.handle_task(second, &[copy_dep()]).unwrap();

        assert_eq!(fx.spawner.created.load(Ordering::SeqCst), 1);
        assert_eq!(fx.rt.task(first).unwrap().unresolved_local(), 1);
        assert_eq!(fx.rt.task(second).unwrap().unresolved_local(), 1);
        assert!(fx.sink.taken().is_empty());
    }

    #[test]
    fn prefetch_completion_releases_all_readers() {
        let fx = fixture();
        let first = fx.rt.create_task(fx.rt.root(), Phase(1));
        let second = fx.rt.create_task(fx.rt.root(), Phase(1));
        fx.rt.handle_task(first, &[copy_dep()]).unwrap();
        fx.rt.handle_task(second, &[copy_dep()]).unwrap();

        // Find the prefetch through its output entry on the destination.
        let copier = {
            let table = fx.rt.table_for(fx.rt.root());
            let guard = table.lock().unwrap();
            let dest = RegionKey {
                team: TeamId::ALL,
                unit: UnitId(0),
                segment: SegmentId::COPYIN,
                addr: Addr(0x1000),
            };
            let mut cur = guard.head_for(&dest);
            let mut found = None;
            while let Some(idx) = cur {
                let entry = *guard.entry(idx);
                cur = entry.next;
                if entry.kind.is_output() {
                    found = Some(entry.task);
                }
            }
            found.expect("prefetch filed an output entry")
        };

        fx.rt.complete_task(copier).unwrap();
        let mut released = fx.sink.taken();
        released.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(released, expected);
    }

    #[test]
    fn different_phase_gets_its_own_prefetch() {
        let fx = fixture();
        let early = fx.rt.create_task(fx.rt.root(), Phase(1));
        let late = fx.rt.create_task(fx.rt.root(), Phase(2));
        fx.rt.handle_task(early, &[copy_dep()]).unwrap();
        fx.rt.handle_task(late, &[copy_dep()]).unwrap();

        assert_eq!(fx.spawner.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_spawner_surfaces_copyin_failure() {
        let sink = Arc::new(CollectingSink::default());
        let rt = DepRuntimeBuilder::new(UnitId(0))
            .transport(Arc::new(LoopbackTransport::mesh(&[UnitId(0)]).remove(0)))
            .sink(sink)
            .build()
            .unwrap();
        let reader = rt.create_task(rt.root(), Phase(1));
        let err = rt.handle_task(reader, &[copy_dep()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CopyinFailed);
    }

    #[test]
    #[should_panic(expected = "missing after creation")]
    fn spawner_that_files_nothing_aborts() {
        #[derive(Debug)]
        struct LyingSpawner;
        impl CopyinSpawner for LyingSpawner {
            fn create_copyin_task(
                &self,
                _runtime: &DepRuntime,
                _dep: &Dependency,
                _dest: RegionKey,
                _consumer: TaskId,
            ) -> Result<()> {
                Ok(())
            }
        }

        let sink = Arc::new(CollectingSink::default());
        let rt = DepRuntimeBuilder::new(UnitId(0))
            .transport(Arc::new(LoopbackTransport::mesh(&[UnitId(0)]).remove(0)))
            .sink(sink)
            .copyin(Arc::new(LyingSpawner))
            .build()
            .unwrap();
        let reader = rt.create_task(rt.root(), Phase(1));
        let _ = rt.handle_task(reader, &[copy_dep()]);
    }
}
