//! Single-threaded simulated network, for tests, benchmarks, and demos.
//!
//! [SimNetwork] implements [Endpoint] for one local node talking to a
//! set of scripted remote peers. Requests are answered by per-peer
//! handlers; replies and timeouts travel through the shared scheduler
//! like any other event, so a whole exchange is deterministic and runs
//! on one thread.

use std::collections::HashMap;
use std::time::Duration;

use tracing::trace;

use crate::common::{FindNodeRequest, FindNodeResponse, Node, Response};
use crate::endpoint::{Connectedness, Endpoint, EndpointEvent};
use crate::query::{Event, QueryId};
use crate::scheduler::{ActionId, Scheduler};
use crate::{Error, Result};

/// Default simulated one-way network latency.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(50);

/// Server-side behavior of a simulated peer. Returning an `Err` stands
/// in for a reply the transport could not decode.
pub type RequestHandlerFn<const N: usize> =
    Box<dyn FnMut(&Node<N>, &FindNodeRequest<N>) -> Result<FindNodeResponse<N>>>;

struct SimPeer<const N: usize> {
    handler: RequestHandlerFn<N>,
    /// Dialable but never answers; requests to it run into their
    /// timeout.
    silent: bool,
}

/// Bookkeeping for one outstanding request.
struct StreamState<const N: usize> {
    query: QueryId,
    peer: Node<N>,
    /// `None` when the remote will never answer.
    reply: Option<Result<FindNodeResponse<N>>>,
    timeout: ActionId,
}

/// An in-memory network simulating the endpoint of a single client
/// node.
pub struct SimNetwork<const N: usize> {
    local: Node<N>,

    peerstore: HashMap<String, Node<N>>,
    conn_status: HashMap<String, Connectedness>,
    peers: HashMap<String, SimPeer<N>>,

    streams: HashMap<u64, StreamState<N>>,
    next_stream: u64,

    latency: Duration,
}

impl<const N: usize> SimNetwork<N> {
    pub fn new(local: Node<N>) -> Self {
        SimNetwork {
            local,
            peerstore: HashMap::new(),
            conn_status: HashMap::new(),
            peers: HashMap::new(),
            streams: HashMap::new(),
            next_stream: 0,
            latency: DEFAULT_LATENCY,
        }
    }

    /// Override the simulated one-way latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    // === Getters ===

    pub fn local(&self) -> &Node<N> {
        &self.local
    }

    /// Whether the peerstore holds an address for `name`.
    pub fn knows_peer(&self, name: &str) -> bool {
        self.peerstore.contains_key(name)
    }

    /// Number of requests currently awaiting a reply or timeout.
    pub fn pending_streams(&self) -> usize {
        self.streams.len()
    }

    // === Public Methods ===

    /// Register a remote peer with its server-side request handler and
    /// record its address in the local peerstore.
    pub fn add_peer(&mut self, node: Node<N>, handler: RequestHandlerFn<N>) {
        self.conn_status
            .insert(node.name().into(), Connectedness::CanConnect);
        self.peerstore.insert(node.name().into(), node.clone());
        self.peers.insert(
            node.name().into(),
            SimPeer {
                handler,
                silent: false,
            },
        );
    }

    /// Register a peer that always answers with the same closer nodes.
    pub fn add_peer_with_nodes(&mut self, node: Node<N>, closer_nodes: Vec<Node<N>>) {
        self.add_peer(
            node,
            Box::new(move |_, _| Ok(FindNodeResponse::new(closer_nodes.clone()))),
        );
    }

    /// Make a peer stop answering. Requests to it time out.
    pub fn set_silent(&mut self, name: &str) {
        if let Some(peer) = self.peers.get_mut(name) {
            peer.silent = true;
        }
    }
}

impl<const N: usize> Endpoint<N> for SimNetwork<N> {
    type Req = FindNodeRequest<N>;

    fn dial_peer(&mut self, peer: &Node<N>) -> Result<()> {
        match self.conn_status.get(peer.name()) {
            Some(Connectedness::Connected) => Ok(()),
            Some(Connectedness::CanConnect) => {
                self.conn_status
                    .insert(peer.name().into(), Connectedness::Connected);
                Ok(())
            }
            _ => Err(Error::UnknownPeer(peer.name().into())),
        }
    }

    /// Adds the given address to the peerstore. The simulator keeps
    /// entries forever, so the ttl is not tracked.
    fn maybe_add_to_peerstore(&mut self, peer: Node<N>, _ttl: Duration) -> Result<()> {
        self.conn_status
            .entry(peer.name().into())
            .or_insert(Connectedness::CanConnect);
        self.peerstore
            .entry(peer.name().into())
            .or_insert_with(|| peer);

        Ok(())
    }

    fn send_request(
        &mut self,
        scheduler: &mut Scheduler<Event<N, Self::Req>>,
        query: QueryId,
        peer: Node<N>,
        request: Self::Req,
        timeout: Duration,
    ) -> Result<()> {
        if let Err(error) = self.dial_peer(&peer) {
            scheduler.enqueue(Event::RequestFailed { query, peer, error });
            return Ok(());
        }

        let stream = self.next_stream;
        self.next_stream += 1;

        let reply = match self.peers.get_mut(peer.name()) {
            Some(remote) if !remote.silent => {
                let reply = (remote.handler)(&self.local, &request);
                scheduler.schedule_in(
                    self.latency,
                    Event::Endpoint(EndpointEvent::Inbound { stream }),
                );
                Some(reply)
            }
            _ => None,
        };

        let timeout = scheduler.schedule_in(
            timeout,
            Event::Endpoint(EndpointEvent::TimedOut { stream }),
        );

        self.streams.insert(
            stream,
            StreamState {
                query,
                peer,
                reply,
                timeout,
            },
        );

        Ok(())
    }

    fn handle_event(
        &mut self,
        scheduler: &mut Scheduler<Event<N, Self::Req>>,
        event: EndpointEvent,
    ) {
        match event {
            EndpointEvent::Inbound { stream } => {
                let Some(state) = self.streams.remove(&stream) else {
                    trace!(stream, "no followup for stream");
                    return;
                };

                scheduler.cancel(state.timeout);

                match state.reply {
                    Some(Ok(response)) => {
                        // Anything the remote told us about becomes
                        // dialable.
                        for node in response.closer_nodes() {
                            self.conn_status
                                .entry(node.name().into())
                                .or_insert(Connectedness::CanConnect);
                            self.peerstore
                                .entry(node.name().into())
                                .or_insert_with(|| node.clone());
                        }

                        scheduler.enqueue(Event::Response {
                            query: state.query,
                            peer: state.peer,
                            response,
                        });
                    }
                    Some(Err(error)) => {
                        scheduler.enqueue(Event::RequestFailed {
                            query: state.query,
                            peer: state.peer,
                            error,
                        });
                    }
                    None => {}
                }
            }
            EndpointEvent::TimedOut { stream } => {
                let Some(state) = self.streams.remove(&stream) else {
                    trace!(stream, "no followup for stream");
                    return;
                };

                scheduler.enqueue(Event::RequestFailed {
                    query: state.query,
                    peer: state.peer,
                    error: Error::Timeout,
                });
            }
        }
    }

    fn connectedness(&self, peer: &Node<N>) -> Connectedness {
        self.conn_status
            .get(peer.name())
            .copied()
            .unwrap_or(Connectedness::NotConnected)
    }

    fn network_address(&self, peer: &Node<N>) -> Option<Node<N>> {
        self.peerstore.get(peer.name()).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::Key;

    #[test]
    fn dialing_promotes_connectedness() {
        let mut network = SimNetwork::new(Node::new("local", Key::<4>([0, 0, 0, 1])));
        let peer = Node::new("peer", Key([0, 0, 0, 2]));

        assert_eq!(network.connectedness(&peer), Connectedness::NotConnected);
        assert_eq!(
            network.dial_peer(&peer),
            Err(Error::UnknownPeer("peer".into()))
        );

        network.add_peer_with_nodes(peer.clone(), Vec::new());
        assert_eq!(network.connectedness(&peer), Connectedness::CanConnect);

        assert!(network.dial_peer(&peer).is_ok());
        assert_eq!(network.connectedness(&peer), Connectedness::Connected);
    }

    #[test]
    fn peerstore_is_idempotent() {
        let mut network = SimNetwork::new(Node::new("local", Key::<4>([0, 0, 0, 1])));

        let first = Node::new("peer", Key([0, 0, 0, 2]));
        let second = Node::new("peer", Key([0, 0, 0, 3]));

        network
            .maybe_add_to_peerstore(first.clone(), Duration::from_secs(60))
            .unwrap();
        network
            .maybe_add_to_peerstore(second, Duration::from_secs(60))
            .unwrap();

        // First record wins.
        let stored = network.network_address(&first).unwrap();
        assert_eq!(stored.key(), first.key());
    }
}
