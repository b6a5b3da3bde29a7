//! Peer entry in the routing table and in query frontiers.

use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::common::Key;

#[derive(Clone, Eq)]
/// A peer identifier: a stable string name plus the peer's DHT key.
///
/// Two nodes are equal iff their names are equal; the key plays no part
/// in identity. Transport addresses are the endpoint's business, so a
/// `Node` is all the engine ever passes around.
pub struct Node<const N: usize> {
    name: String,
    key: Key<N>,
}

impl<const N: usize> Node<N> {
    pub fn new<T: Into<String>>(name: T, key: Key<N>) -> Node<N> {
        Node {
            name: name.into(),
            key,
        }
    }

    // === Getters ===

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &Key<N> {
        &self.key
    }

    /// Creates a node with a random key for testing purposes.
    pub fn random() -> Node<N> {
        let key = Key::random();

        Node {
            name: format!("peer-{key}"),
            key,
        }
    }

    /// Creates a deterministic node from an index, for tests and
    /// benchmarks that need reproducible sets of distinct nodes.
    pub fn unique(i: usize) -> Node<N> {
        let mut key = Key::zero();
        let be = (i as u64).to_be_bytes();
        let tail = N.min(be.len());
        key.0[N - tail..].copy_from_slice(&be[be.len() - tail..]);

        Node {
            name: format!("peer{i}"),
            key,
        }
    }
}

impl<const N: usize> PartialEq for Node<N> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<const N: usize> Hash for Node<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<const N: usize> Display for Node<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<const N: usize> Debug for Node<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality_is_by_name() {
        let a = Node::<4>::new("peer1", Key([1, 2, 3, 4]));
        let b = Node::<4>::new("peer1", Key([9, 9, 9, 9]));
        let c = Node::<4>::new("peer2", Key([1, 2, 3, 4]));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn unique_nodes_are_distinct() {
        let nodes: Vec<Node<4>> = (0..100).map(Node::unique).collect();

        for (i, a) in nodes.iter().enumerate() {
            for b in nodes.iter().skip(i + 1) {
                assert_ne!(a, b);
                assert_ne!(a.key(), b.key());
            }
        }
    }
}
