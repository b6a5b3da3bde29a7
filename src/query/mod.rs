//! Iterative lookup engine.
//!
//! A [QueryPool] owns the routing table, the endpoint, and the
//! scheduler, and drives any number of [Query] state machines by
//! dispatching typed [Event]s in FIFO order on one logical thread.

mod config;
mod lookup;
mod peer_list;

pub use config::{QueryConfig, DEFAULT_PEERSTORE_TTL, DEFAULT_REQUEST_TIMEOUT};
pub use lookup::{HandleResultFn, Query};
pub use peer_list::{PeerList, PeerStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{Node, Request, RoutingTable};
use crate::endpoint::{Endpoint, EndpointEvent};
use crate::scheduler::Scheduler;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Identifier of a query within a [QueryPool].
pub struct QueryId(u64);

#[derive(Debug, Clone)]
/// Typed events dispatched by the scheduler, FIFO.
pub enum Event<const N: usize, R: Request<N>> {
    /// Pop the closest queued peer of a query and send it a request.
    NewRequest { query: QueryId },
    /// A peer answered one of a query's requests.
    Response {
        query: QueryId,
        peer: Node<N>,
        response: R::Resp,
    },
    /// A request failed: timeout, dial failure, or a reply that was not
    /// a valid response.
    RequestFailed {
        query: QueryId,
        peer: Node<N>,
        error: Error,
    },
    /// Endpoint stream bookkeeping (deliveries and timeouts).
    Endpoint(EndpointEvent),
}

#[derive(Debug, Clone, Default)]
/// Cooperative cancellation flag shared between a [Query] and its
/// caller. Observed at the entry of every scheduled query action.
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Single-threaded driver tying the lookup engine together: the shared
/// routing table, the endpoint, the scheduler, and all live queries.
pub struct QueryPool<const N: usize, E: Endpoint<N>> {
    routing_table: RoutingTable<N>,
    endpoint: E,
    scheduler: Scheduler<Event<N, E::Req>>,
    queries: HashMap<QueryId, Query<N, E::Req>>,
    next_query_id: u64,
}

impl<const N: usize, E: Endpoint<N>> QueryPool<N, E> {
    pub fn new(routing_table: RoutingTable<N>, endpoint: E) -> Self {
        QueryPool {
            routing_table,
            endpoint,
            scheduler: Scheduler::new(),
            queries: HashMap::new(),
            next_query_id: 0,
        }
    }

    // === Getters ===

    pub fn routing_table(&self) -> &RoutingTable<N> {
        &self.routing_table
    }

    pub fn routing_table_mut(&mut self) -> &mut RoutingTable<N> {
        &mut self.routing_table
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    pub fn scheduler(&self) -> &Scheduler<Event<N, E::Req>> {
        &self.scheduler
    }

    pub fn query(&self, id: QueryId) -> Option<&Query<N, E::Req>> {
        self.queries.get(&id)
    }

    // === Public Methods ===

    /// Create a query for `request`'s target and schedule its first
    /// requests. The query stays in the pool after it finishes, so late
    /// endpoint callbacks keep hitting it, until
    /// [remove_query](Self::remove_query).
    pub fn start_query<F>(&mut self, request: E::Req, config: QueryConfig, handle_result: F) -> QueryId
    where
        F: FnMut(&Node<N>, &<E::Req as Request<N>>::Resp) -> (bool, Vec<Node<N>>) + 'static,
    {
        let id = QueryId(self.next_query_id);
        self.next_query_id += 1;

        let query = Query::new(
            id,
            request,
            config,
            Box::new(handle_result),
            &self.routing_table,
            &mut self.scheduler,
        );
        self.queries.insert(id, query);

        id
    }

    pub fn remove_query(&mut self, id: QueryId) -> Option<Query<N, E::Req>> {
        self.queries.remove(&id)
    }

    /// Dispatch the next ready event. Returns `false` when the FIFO is
    /// empty (planned events may still be pending; see
    /// [advance](Self::advance)).
    pub fn poll(&mut self) -> bool {
        let Some(event) = self.scheduler.next_ready() else {
            return false;
        };

        match event {
            Event::NewRequest { query } => {
                if let Some(query) = self.queries.get_mut(&query) {
                    query.new_request(&mut self.endpoint, &mut self.scheduler);
                }
            }
            Event::Response {
                query,
                peer,
                response,
            } => {
                if let Some(query) = self.queries.get_mut(&query) {
                    query.handle_response(
                        peer,
                        response,
                        &mut self.routing_table,
                        &mut self.endpoint,
                        &mut self.scheduler,
                    );
                }
            }
            Event::RequestFailed { query, peer, error } => {
                if let Some(query) = self.queries.get_mut(&query) {
                    query.request_error(peer, error, &mut self.routing_table, &mut self.scheduler);
                }
            }
            Event::Endpoint(event) => self.endpoint.handle_event(&mut self.scheduler, event),
        }

        true
    }

    /// Move the virtual clock forward, making due planned events ready.
    pub fn advance(&mut self, by: Duration) {
        self.scheduler.advance(by);
    }

    /// Run events until nothing is ready and nothing is planned,
    /// advancing the clock over quiet stretches. Every lookup reachable
    /// from the current state has terminated when this returns.
    pub fn run_to_idle(&mut self) {
        loop {
            while self.poll() {}

            match self.scheduler.time_to_next_planned() {
                Some(wait) => self.scheduler.advance(wait),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::{FindNodeRequest, Key};
    use crate::sim::SimNetwork;

    #[test]
    fn query_without_seeds_finishes_immediately() {
        let local = Node::new("local", Key::<4>([0xaa, 0, 0, 0]));
        let table = RoutingTable::new(*local.key());
        let mut pool = QueryPool::new(table, SimNetwork::new(local));

        let id = pool.start_query(
            FindNodeRequest::new(Key([1, 2, 3, 4])),
            QueryConfig::default(),
            |_, _| (false, Vec::new()),
        );

        pool.run_to_idle();

        let query = pool.query(id).unwrap();
        assert!(query.is_finished());
        assert!(!query.is_done());
        assert_eq!(query.inflight(), 0);
    }

    #[test]
    fn query_ids_are_distinct() {
        let local = Node::new("local", Key::<4>([0xaa, 0, 0, 0]));
        let table = RoutingTable::new(*local.key());
        let mut pool = QueryPool::new(table, SimNetwork::new(local));

        let a = pool.start_query(
            FindNodeRequest::new(Key([1, 0, 0, 0])),
            QueryConfig::default(),
            |_, _| (false, Vec::new()),
        );
        let b = pool.start_query(
            FindNodeRequest::new(Key([2, 0, 0, 0])),
            QueryConfig::default(),
            |_, _| (false, Vec::new()),
        );

        assert_ne!(a, b);
        assert!(pool.remove_query(a).is_some());
        assert!(pool.query(a).is_none());
        assert!(pool.query(b).is_some());
    }
}
