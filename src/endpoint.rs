//! Abstract network endpoint consumed by the query engine.
//!
//! The engine never performs I/O inline: [send_request](Endpoint::send_request)
//! returns immediately and the outcome arrives later as an
//! [Event](crate::query::Event) posted through the shared
//! [Scheduler](crate::scheduler::Scheduler), exactly once per request —
//! a response, a timeout, a dial error, or a transport error.

use std::time::Duration;

use crate::common::{Node, Request};
use crate::query::{Event, QueryId};
use crate::scheduler::Scheduler;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How reachable a peer currently is, as far as the endpoint knows.
pub enum Connectedness {
    NotConnected,
    CanConnect,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Stream bookkeeping actions an endpoint posts to itself through the
/// scheduler, serialized with every other event.
pub enum EndpointEvent {
    /// A reply arrived for the given stream.
    Inbound { stream: u64 },
    /// The per-request deadline for the given stream elapsed.
    TimedOut { stream: u64 },
}

/// A transport the query engine can send requests through.
pub trait Endpoint<const N: usize> {
    type Req: Request<N>;

    /// Make sure a peer is reachable before talking to it. Returns
    /// [UnknownPeer](crate::Error::UnknownPeer) when the endpoint has
    /// no address for it.
    fn dial_peer(&mut self, peer: &Node<N>) -> Result<()>;

    /// Record a peer address for `ttl`. Idempotent: an already-known
    /// peer is left untouched.
    fn maybe_add_to_peerstore(&mut self, peer: Node<N>, ttl: Duration) -> Result<()>;

    /// Post a request to a peer. Must return without blocking; the
    /// outcome is delivered later as an [Event::Response] or
    /// [Event::RequestFailed] carrying `query`.
    fn send_request(
        &mut self,
        scheduler: &mut Scheduler<Event<N, Self::Req>>,
        query: QueryId,
        peer: Node<N>,
        request: Self::Req,
        timeout: Duration,
    ) -> Result<()>;

    /// React to one of this endpoint's own scheduled stream events.
    fn handle_event(
        &mut self,
        scheduler: &mut Scheduler<Event<N, Self::Req>>,
        event: EndpointEvent,
    );

    fn connectedness(&self, peer: &Node<N>) -> Connectedness;

    /// The address record this endpoint holds for a peer, if any.
    fn network_address(&self, peer: &Node<N>) -> Option<Node<N>>;
}
