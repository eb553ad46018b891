//! Record types owned by the engine.
//!
//! - [`task`]: task records with states, counters, and successor lists

pub mod task;

pub use task::{DepWait, RemoteDepRelease, RemoteSuccessor, Task, TaskState, TaskSync};
