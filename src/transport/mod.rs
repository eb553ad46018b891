//! Wire messages and the transport seam.
//!
//! The engine never talks to the interconnect itself; it hands fully formed
//! messages to a [`Transport`] and drains inbound envelopes from it during
//! [`progress`](crate::runtime::DepRuntime::progress). Message payloads are
//! plain serde types so a transport can pick its own encoding.
//!
//! Three messages cross units:
//!
//! - [`Message::DepRequest`]: a task wants to read a region another unit
//!   owns; resolved there in deferred batches.
//! - [`Message::DirectEdge`]: the owner found a later-phase local writer
//!   that must wait for the requester (write-after-read); the requester's
//!   unit records the obligation.
//! - [`Message::Release`]: a dependency is satisfied (or unsatisfiable);
//!   the named task drops one remote dependency.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{RemoteTaskId, UnitId, WireDep};

pub mod loopback;

pub use loopback::LoopbackTransport;

/// Failure to hand a message to the interconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No route to the destination unit.
    #[error("no route to unit {0}")]
    NoRoute(UnitId),
    /// The destination unit has shut down its endpoint.
    #[error("unit {0} is closed")]
    Closed(UnitId),
}

impl From<TransportError> for crate::error::Error {
    fn from(err: TransportError) -> Self {
        Self::new(crate::error::ErrorKind::Transport)
            .with_message(err.to_string())
            .with_source(err)
    }
}

/// A dependency-protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Ask the receiving unit to resolve an input dependency on one of its
    /// regions for `requester` (a task on the sending unit).
    DepRequest {
        /// The dependency, keyed in the receiver's address terms.
        dep: WireDep,
        /// Wire id of the requesting task on the sender.
        requester: RemoteTaskId,
    },
    /// Tell the receiving unit that `successor` (on the sender) must wait
    /// for `predecessor` (on the receiver) to complete.
    DirectEdge {
        /// Task on the receiving unit that runs first.
        predecessor: RemoteTaskId,
        /// Task on the sending unit now waiting on it.
        successor: RemoteTaskId,
    },
    /// Release one remote dependency of `task` (on the receiving unit).
    Release {
        /// Task on the receiving unit.
        task: RemoteTaskId,
        /// The dependency being answered, for diagnostics.
        dep: WireDep,
    },
}

/// An inbound message with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unit the message came from.
    pub from: UnitId,
    /// The message.
    pub msg: Message,
}

/// Interconnect seam.
///
/// `send` must not block on the destination making progress; queueing is
/// enough. Delivery order between one sender/receiver pair must be
/// preserved (releases must not overtake the edge they answer).
pub trait Transport: Send + Sync {
    /// Queues `msg` for `dest`.
    fn send(&self, dest: UnitId, msg: Message) -> Result<(), TransportError>;

    /// Takes the next inbound envelope, if any.
    fn poll_inbound(&self) -> Option<Envelope>;
}
