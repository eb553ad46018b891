#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::{Arc, Mutex, Once};
use taskmesh::transport::LoopbackTransport;
use taskmesh::{CopyinSpawner, DepRuntime, RunnableSink, TaskId, UnitId};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED5EED;

const PROPTEST_SEED_ENV: &str = "TASKMESH_PROPTEST_SEED";

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    // Honor an existing PROPTEST_RNG_SEED, otherwise apply our own.
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    // If CI is set and no explicit seed is provided, use a fixed seed.
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

/// Scheduler stand-in that records every task handed over.
#[derive(Debug, Default)]
pub struct CollectingSink {
    runnable: Mutex<Vec<TaskId>>,
}

impl CollectingSink {
    /// Takes the tasks collected so far, leaving the record empty.
    pub fn taken(&self) -> Vec<TaskId> {
        std::mem::take(&mut *self.runnable.lock().expect("sink lock poisoned"))
    }

    /// Whether nothing has been handed over since the last take.
    pub fn is_empty(&self) -> bool {
        self.runnable.lock().expect("sink lock poisoned").is_empty()
    }
}

impl RunnableSink for CollectingSink {
    fn enqueue_runnable(&self, task: TaskId) {
        self.runnable.lock().expect("sink lock poisoned").push(task);
    }
}

/// One simulated unit: an engine wired into the mesh plus its sink.
pub struct TestUnit {
    pub runtime: DepRuntime,
    pub sink: Arc<CollectingSink>,
}

/// Builds `n` units connected through an in-process mesh.
#[must_use]
pub fn cluster(n: u32) -> Vec<TestUnit> {
    build_cluster(n, None)
}

/// Like [`cluster`], with the same copy-in spawner wired into every unit.
#[must_use]
pub fn cluster_with_copyin(n: u32, spawner: Arc<dyn CopyinSpawner>) -> Vec<TestUnit> {
    build_cluster(n, Some(spawner))
}

fn build_cluster(n: u32, copyin: Option<Arc<dyn CopyinSpawner>>) -> Vec<TestUnit> {
    let units: Vec<UnitId> = (0..n).map(UnitId).collect();
    LoopbackTransport::mesh(&units)
        .into_iter()
        .map(|endpoint| {
            let sink = Arc::new(CollectingSink::default());
            let mut builder = DepRuntime::builder(endpoint.unit())
                .transport(Arc::new(endpoint))
                .sink(Arc::clone(&sink) as Arc<dyn RunnableSink>);
            if let Some(spawner) = &copyin {
                builder = builder.copyin(Arc::clone(spawner));
            }
            let runtime = builder.build().expect("test runtime build");
            TestUnit { runtime, sink }
        })
        .collect()
}

/// Pumps every unit's inbox until the whole mesh goes quiet.
///
/// Returns the number of messages processed. Termination relies on the
/// mesh being a closed system: once every inbox drains empty, nothing is
/// left in flight.
pub fn pump(units: &[TestUnit]) -> usize {
    let mut total = 0;
    loop {
        let moved: usize = units.iter().map(|unit| unit.runtime.progress()).sum();
        if moved == 0 {
            return total;
        }
        total += moved;
    }
}

/// Hands `task` to the sink when it has no unresolved dependencies.
///
/// Mirrors what a host scheduler does right after filing a task: the
/// engine only pushes tasks whose last dependency it released, so a task
/// that was born free is the host's to enqueue.
pub fn seed_runnable(unit: &TestUnit, task: TaskId) {
    let record = unit.runtime.task(task).expect("live task");
    if record.unresolved_local() == 0 && record.unresolved_remote() == 0 {
        unit.sink.enqueue_runnable(task);
    }
}

/// Runs `unit`'s scheduler loop until its sink stays empty.
///
/// Every runnable task is started and completed on the spot; the tasks
/// are returned in execution order.
pub fn drain_run(unit: &TestUnit) -> Vec<TaskId> {
    let mut order = Vec::new();
    loop {
        let batch = unit.sink.taken();
        if batch.is_empty() {
            return order;
        }
        for task in batch {
            unit.runtime.start_task(task).expect("start runnable task");
            unit.runtime
                .complete_task(task)
                .expect("complete running task");
            order.push(task);
        }
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
