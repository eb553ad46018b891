//! Taskmesh: data-dependency tracking for distributed task-parallel runtimes.
//!
//! # Overview
//!
//! Taskmesh is the dependency engine of a task-parallel runtime over a
//! partitioned global address space. Tasks declare typed dependencies on
//! memory regions; the engine matches consumers to the producers that wrote
//! those regions, counts unresolved edges per task, exchanges request and
//! release messages with the units that own remote memory, and hands each
//! task to the host scheduler the moment its last edge resolves.
//!
//! The engine is passive. It owns no threads and performs no I/O of its
//! own: matching runs on the thread that creates a task, inbound messages
//! are pumped explicitly through [`DepRuntime::progress`], and outbound
//! messages go through a caller-supplied [`Transport`].
//!
//! # Core Guarantees
//!
//! - **Producer before consumer**: a task never becomes runnable before every
//!   producer it matched against has completed
//! - **Phase-bounded matching**: a read matches the latest write in an earlier
//!   or equal phase; later writes stay invisible to it
//! - **One release per request**: every dependency request sent to an owner
//!   unit is answered by exactly one release message, even when no matching
//!   writer exists
//! - **Single hand-off**: a task reaches the host scheduler exactly once, when
//!   both its local and its remote dependency counts hit zero
//! - **Nested isolation**: sibling tasks under the same parent match only
//!   among themselves; remote dependencies of nested tasks are ignored
//!
//! # Module Structure
//!
//! - [`types`]: identifiers, memory-region keys, and dependency descriptors
//! - [`record`]: task records and their synchronization state
//! - [`runtime`]: matching, the remote protocol, and the release cascade
//! - [`transport`]: wire messages and the transport seam
//! - [`config`]: engine tuning knobs
//! - [`error`]: error types
//! - [`tracing_compat`]: optional `tracing` integration
//! - [`util`]: internal utilities (generational slot pool, task lists)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Host-facing hooks and diagnostic accessors are kept even where this crate
// does not call them itself.
#![allow(dead_code)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod record;
pub mod runtime;
pub mod tracing_compat;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_utils;

// Re-exports for convenient access to core types
pub use config::{ConfigError, DepConfig};
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, Result};
pub use record::{Task, TaskState};
pub use runtime::{
    AddressResolver, CopyinSpawner, DepRuntime, DepRuntimeBuilder, IdentityAddressSpace, NoCopyin,
    RunnableSink, TaskQueue, TaskTable,
};
pub use transport::{Envelope, LoopbackTransport, Message, Transport, TransportError};
pub use types::{
    Addr, DepKind, Dependency, Phase, RegionKey, RemoteTaskId, SegmentId, TaskId, TeamId, UnitId,
    WireDep,
};
