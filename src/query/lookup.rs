//! The lookup state machine: one instance per iterative query.

use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use tracing::{debug, trace};

use crate::common::{Key, Node, Request, Response, RoutingTable};
use crate::endpoint::Endpoint;
use crate::query::peer_list::{PeerList, PeerStatus};
use crate::query::{CancelToken, Event, QueryConfig, QueryId};
use crate::scheduler::Scheduler;
use crate::Error;

/// Decides whether the query is finished and which of the peers in a
/// response are worth contacting: `(stop, useful_nodes)`.
pub type HandleResultFn<const N: usize, Resp> =
    Box<dyn FnMut(&Node<N>, &Resp) -> (bool, Vec<Node<N>>)>;

/// An iterative lookup: starting from the routing table's closest known
/// peers, keep up to `concurrency` requests in flight towards the peers
/// closest to the target, feeding newly discovered peers back into the
/// frontier until the result callback stops the query, the frontier
/// drains, or the caller cancels.
///
/// All state transitions run on the owning pool's scheduler thread; the
/// struct itself holds no locks.
pub struct Query<const N: usize, R: Request<N>> {
    id: QueryId,
    request: R,
    target: Key<N>,

    peer_list: PeerList<N>,
    /// Requests that are either in flight or scheduled.
    inflight: usize,
    done: bool,
    cancel: CancelToken,

    concurrency: usize,
    request_timeout: Duration,
    peerstore_ttl: Duration,

    handle_result: HandleResultFn<N, R::Resp>,
}

impl<const N: usize, R: Request<N>> Query<N, R> {
    /// Seed the frontier from the routing table and schedule the first
    /// wave of requests, at most one per known peer up to `concurrency`.
    pub(crate) fn new(
        id: QueryId,
        request: R,
        config: QueryConfig,
        handle_result: HandleResultFn<N, R::Resp>,
        routing_table: &RoutingTable<N>,
        scheduler: &mut Scheduler<Event<N, R>>,
    ) -> Self {
        let target = request.target();

        let mut peer_list = PeerList::new(target);
        peer_list.add_all(routing_table.nearest_peers(&target, config.number_useful_closer_peers));

        // we don't want more pending requests than the number of peers
        // we can query
        let bootstrap = peer_list.len().min(config.concurrency);
        for _ in 0..bootstrap {
            scheduler.enqueue(Event::NewRequest { query: id });
        }

        trace!(?id, target = %target, seeded = peer_list.len(), scheduled = bootstrap, "New query");

        Query {
            id,
            request,
            target,
            peer_list,
            inflight: bootstrap,
            done: false,
            cancel: CancelToken::new(),
            concurrency: config.concurrency,
            request_timeout: config.request_timeout,
            peerstore_ttl: config.peerstore_ttl,
            handle_result,
        }
    }

    // === Getters ===

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn target(&self) -> &Key<N> {
        &self.target
    }

    /// Set once the result callback stopped the query or cancellation
    /// was observed. Natural frontier exhaustion does not set it; see
    /// [is_finished](Self::is_finished).
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Requests currently in flight or scheduled.
    pub fn inflight(&self) -> usize {
        self.inflight
    }

    pub fn peer_list(&self) -> &PeerList<N> {
        &self.peer_list
    }

    /// A handle the caller can use to cancel this query. Cancellation
    /// is cooperative: it is observed at the next scheduled action.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// True once the query can make no further progress: stopped,
    /// cancelled, or steady-state with nothing in flight and nothing
    /// queued.
    pub fn is_finished(&self) -> bool {
        self.done || (self.inflight == 0 && self.peer_list.queued_count() == 0)
    }

    // === Event Handlers ===

    /// Pop the closest queued peer and send it a request.
    pub(crate) fn new_request<E>(
        &mut self,
        endpoint: &mut E,
        scheduler: &mut Scheduler<Event<N, R>>,
    ) where
        E: Endpoint<N, Req = R>,
    {
        if self.check_if_done() {
            self.inflight -= 1;
            return;
        }

        let Some(peer) = self.peer_list.pop_closest_queued() else {
            trace!(id = ?self.id, "all peers queried");
            self.inflight -= 1;
            return;
        };

        trace!(id = ?self.id, peer = %peer, "peer selected");

        if let Err(error) = endpoint.send_request(
            scheduler,
            self.id,
            peer.clone(),
            self.request.clone(),
            self.request_timeout,
        ) {
            scheduler.enqueue(Event::RequestFailed {
                query: self.id,
                peer,
                error,
            });
        }
    }

    /// Process a response: credit the peer in the routing table, record
    /// the closer peers it returned, and let the result callback decide
    /// whether to keep going.
    pub(crate) fn handle_response<E>(
        &mut self,
        peer: Node<N>,
        response: R::Resp,
        routing_table: &mut RoutingTable<N>,
        endpoint: &mut E,
        scheduler: &mut Scheduler<Event<N, R>>,
    ) where
        E: Endpoint<N, Req = R>,
    {
        if self.check_if_done() {
            return;
        }

        debug!(id = ?self.id, peer = %peer, "Query got response");

        self.inflight -= 1;

        if !response.closer_nodes().is_empty() {
            // a remote peer returning at least one peer is behaving
            // correctly
            routing_table.add_peer(peer.clone());
        }

        self.peer_list.set_status(&peer, PeerStatus::Queried);

        for node in response.closer_nodes() {
            if node.key() == routing_table.origin() {
                trace!(id = ?self.id, peer = %peer, "remote peer returned us as a closer peer");
                continue;
            }

            let _ = endpoint.maybe_add_to_peerstore(node.clone(), self.peerstore_ttl);
        }

        let (stop, useful_nodes) = (self.handle_result)(&peer, &response);
        if stop {
            debug!(id = ?self.id, target = %self.target, "Query over");
            self.done = true;
            return;
        }

        let origin = *routing_table.origin();
        self.peer_list
            .add_all(useful_nodes.into_iter().filter(|node| *node.key() != origin));

        // we always want to have the maximal number of requests in
        // flight
        let to_send = (self.concurrency - self.inflight).min(self.peer_list.queued_count());
        for _ in 0..to_send {
            scheduler.enqueue(Event::NewRequest { query: self.id });
        }
        self.inflight += to_send;

        trace!(id = ?self.id, scheduled = to_send, inflight = self.inflight, "scheduled follow-up requests");
    }

    /// A request failed: evict the peer from the routing table (unless
    /// the caller already cancelled), mark it unreachable, and schedule
    /// one replacement request.
    pub(crate) fn request_error(
        &mut self,
        peer: Node<N>,
        error: Error,
        routing_table: &mut RoutingTable<N>,
        scheduler: &mut Scheduler<Event<N, R>>,
    ) {
        debug!(id = ?self.id, peer = %peer, %error, "Request failed");

        self.inflight -= 1;

        if !self.cancel.is_cancelled() {
            // remove peer from routing table unless the query was
            // cancelled: cancellation is not peer misbehavior
            routing_table.remove_key(peer.key());
        }

        if self.check_if_done() {
            return;
        }

        self.peer_list.set_status(&peer, PeerStatus::Unreachable);

        scheduler.enqueue(Event::NewRequest { query: self.id });
        self.inflight += 1;
    }

    // === Private Methods ===

    /// Short-circuit for scheduled actions: `true` when the query is
    /// already done or the caller cancelled (which marks it done).
    fn check_if_done(&mut self) -> bool {
        if self.done {
            return true;
        }

        if self.cancel.is_cancelled() {
            debug!(id = ?self.id, "Query cancelled");
            self.done = true;
            return true;
        }

        false
    }
}

impl<const N: usize, R: Request<N>> Debug for Query<N, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("inflight", &self.inflight)
            .field("done", &self.done)
            .field("peer_list", &self.peer_list)
            .finish_non_exhaustive()
    }
}
