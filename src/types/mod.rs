//! Core types for the dependency engine.
//!
//! - [`id`]: identifier newtypes (units, teams, segments, phases, tasks)
//! - [`dep`]: dependency declarations and region keys
//! - [`task_ref`]: local/remote task references

pub mod dep;
pub mod id;
pub mod task_ref;

pub use dep::{DepKind, Dependency, RegionKey, WireDep};
pub use id::{Addr, Phase, RemoteTaskId, SegmentId, TaskId, TeamId, UnitId};
pub use task_ref::{RemoteTaskRef, TaskRef};
