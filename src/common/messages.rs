//! Request and response messages exchanged during lookups.

use std::fmt::Debug;

use crate::common::{Key, Node};

/// A request message the query engine can send to a peer.
///
/// The associated [Resp](Request::Resp) type tells the endpoint what to
/// decode replies into, replacing a runtime "empty response" template.
pub trait Request<const N: usize>: Clone + Debug {
    type Resp: Response<N>;

    /// The key this request is asking about.
    fn target(&self) -> Key<N>;
}

/// A response message carrying peers closer to the requested target.
pub trait Response<const N: usize>: Clone + Debug {
    fn closer_nodes(&self) -> &[Node<N>];
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ask a peer for the closest nodes it knows to a target key.
pub struct FindNodeRequest<const N: usize> {
    target: Key<N>,
}

impl<const N: usize> FindNodeRequest<N> {
    pub fn new(target: Key<N>) -> FindNodeRequest<N> {
        FindNodeRequest { target }
    }
}

impl<const N: usize> Request<N> for FindNodeRequest<N> {
    type Resp = FindNodeResponse<N>;

    fn target(&self) -> Key<N> {
        self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The closest nodes a peer knows to the requested target.
pub struct FindNodeResponse<const N: usize> {
    closer_nodes: Vec<Node<N>>,
}

impl<const N: usize> FindNodeResponse<N> {
    pub fn new(closer_nodes: Vec<Node<N>>) -> FindNodeResponse<N> {
        FindNodeResponse { closer_nodes }
    }

    pub fn empty() -> FindNodeResponse<N> {
        FindNodeResponse {
            closer_nodes: Vec::new(),
        }
    }
}

impl<const N: usize> Response<N> for FindNodeResponse<N> {
    fn closer_nodes(&self) -> &[Node<N>] {
        &self.closer_nodes
    }
}
