//! In-process transport connecting units through shared queues.
//!
//! Every endpoint owns a lock-free inbox; `send` pushes an envelope onto the
//! destination's inbox and `poll_inbound` pops from the endpoint's own.
//! Delivery preserves per-sender order, which is all the dependency protocol
//! asks of an interconnect. Intended for tests and single-process runs.

use crate::tracing_compat::trace;
use crate::types::UnitId;
use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Envelope, Message, Transport, TransportError};

/// One unit's endpoint in an in-process mesh.
///
/// Endpoints are created together by [`LoopbackTransport::pair`] or
/// [`LoopbackTransport::mesh`] and share their inboxes. Routes are fixed at
/// construction; [`close_route`](LoopbackTransport::close_route) can sever
/// one afterwards to exercise failure paths.
pub struct LoopbackTransport {
    me: UnitId,
    inbox: Arc<SegQueue<Envelope>>,
    routes: HashMap<UnitId, Arc<SegQueue<Envelope>>>,
    closed: Mutex<HashSet<UnitId>>,
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("me", &self.me)
            .field("routes", &self.routes.len())
            .field("pending", &self.inbox.len())
            .finish_non_exhaustive()
    }
}

impl LoopbackTransport {
    /// Creates a connected pair of endpoints for units `a` and `b`.
    #[must_use]
    pub fn pair(a: UnitId, b: UnitId) -> (Self, Self) {
        let mut endpoints = Self::mesh(&[a, b]);
        let right = endpoints.pop().expect("mesh of two units has two endpoints");
        let left = endpoints.pop().expect("mesh of two units has two endpoints");
        (left, right)
    }

    /// Creates one endpoint per unit, each routed to all of them.
    ///
    /// Units must be distinct; a unit may send to itself. Endpoints are
    /// returned in the order the units were given.
    #[must_use]
    pub fn mesh(units: &[UnitId]) -> Vec<Self> {
        let inboxes: HashMap<UnitId, Arc<SegQueue<Envelope>>> = units
            .iter()
            .map(|&unit| (unit, Arc::new(SegQueue::new())))
            .collect();
        units
            .iter()
            .map(|&unit| Self {
                me: unit,
                inbox: Arc::clone(&inboxes[&unit]),
                routes: inboxes
                    .iter()
                    .map(|(&peer, queue)| (peer, Arc::clone(queue)))
                    .collect(),
                closed: Mutex::new(HashSet::new()),
            })
            .collect()
    }

    /// The unit this endpoint belongs to.
    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.me
    }

    /// Severs the route to `dest`.
    ///
    /// Later sends to `dest` fail with [`TransportError::Closed`]. Envelopes
    /// already queued remain deliverable.
    pub fn close_route(&self, dest: UnitId) {
        self.closed.lock().insert(dest);
    }

    /// Number of envelopes waiting in this endpoint's inbox.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, dest: UnitId, msg: Message) -> Result<(), TransportError> {
        if self.closed.lock().contains(&dest) {
            return Err(TransportError::Closed(dest));
        }
        let Some(queue) = self.routes.get(&dest) else {
            return Err(TransportError::NoRoute(dest));
        };
        trace!(from = %self.me, to = %dest, "loopback send");
        queue.push(Envelope { from: self.me, msg });
        Ok(())
    }

    fn poll_inbound(&self) -> Option<Envelope> {
        self.inbox.pop()
    }
}
