//! References to tasks on this unit or elsewhere.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::types::id::{RemoteTaskId, TaskId, UnitId};

/// A task living on another unit, named by origin and opaque wire id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteTaskRef {
    /// Unit the task lives on.
    pub origin: UnitId,
    /// Wire id, meaningful only to `origin`.
    pub id: RemoteTaskId,
}

impl RemoteTaskRef {
    /// Builds a reference from its parts.
    #[must_use]
    pub const fn new(origin: UnitId, id: RemoteTaskId) -> Self {
        Self { origin, id }
    }
}

impl fmt::Debug for RemoteTaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteTaskRef({}, {:#x})", self.origin, self.id.raw())
    }
}

/// Either a local task handle or a remote task descriptor.
///
/// The engine's edges always know which side they are on; paths that only
/// make sense locally (counter updates, state checks) match on `Local` and
/// treat `Remote` as a message to send.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TaskRef {
    /// Task in the local task table.
    Local(TaskId),
    /// Task on another unit.
    Remote(RemoteTaskRef),
}

impl TaskRef {
    /// The local handle, if this reference is local.
    #[must_use]
    pub const fn as_local(self) -> Option<TaskId> {
        match self {
            Self::Local(id) => Some(id),
            Self::Remote(_) => None,
        }
    }

    /// Whether this reference points at a task on another unit.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<TaskId> for TaskRef {
    fn from(id: TaskId) -> Self {
        Self::Local(id)
    }
}

impl From<RemoteTaskRef> for TaskRef {
    fn from(r: RemoteTaskRef) -> Self {
        Self::Remote(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_accessor() {
        let id = TaskId::testing_default();
        assert_eq!(TaskRef::Local(id).as_local(), Some(id));

        let remote = TaskRef::Remote(RemoteTaskRef::new(UnitId(1), RemoteTaskId::from_raw(9)));
        assert_eq!(remote.as_local(), None);
        assert!(remote.is_remote());
    }
}
