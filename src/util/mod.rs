//! Internal utilities for the dependency engine.
//!
//! These utilities are intentionally minimal and dependency-free; the hot
//! matching paths must not allocate beyond the pools defined here.

pub mod arena;
pub mod task_list;

pub use arena::{Arena, ArenaIndex};
pub use task_list::TaskList;
