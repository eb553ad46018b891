//! Dependency tracking and release for distributed task graphs.
//!
//! This module contains the engine machinery:
//!
//! - [`DepRuntime`]: the per-unit context object, built through
//!   [`DepRuntimeBuilder`]
//! - [`RunnableSink`], [`AddressResolver`], [`CopyinSpawner`]: the seams a
//!   host scheduler plugs into
//! - [`TaskTable`]: generational slab of live task records
//! - [`TaskQueue`]: mutex-protected FIFO shared with the host scheduler
//!
//! Matching, remote request handling, the release cascade, and copy-in
//! prefetch synthesis live in private submodules; their entry points are
//! methods on [`DepRuntime`].
//!
//! # Lock Order
//!
//! Two lock levels exist and nest in one direction only: a group's
//! dependency-table lock is taken first, a single task's sync lock second.
//! The task table, the deferred queues, and the remote-blocked list are
//! leaf locks acquired with no other lock held. Dependency counters are
//! atomics; "the count reached zero" is decided from the value returned by
//! the decrement, never from a separate load. An edge is accounted under
//! the sync lock of the task whose activity check guards it (the producer
//! for producer-to-consumer edges, the later writer for write-after-read
//! edges), so a concurrent completion either sees the new successor or the
//! edge was never counted. All guards are dropped before handing a task to
//! the sink or sending on the transport.

mod copyin;
mod dep_table;
mod engine;
mod matcher;
mod release;
mod remote;
mod task_queue;
mod task_table;

pub use copyin::{CopyinSpawner, NoCopyin};
pub use engine::{
    AddressResolver, DepRuntime, DepRuntimeBuilder, IdentityAddressSpace, RunnableSink,
};
pub use task_queue::{TaskQueue, TaskQueueGuard};
pub use task_table::TaskTable;
