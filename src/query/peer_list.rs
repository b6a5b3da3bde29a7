//! The frontier: candidate peers of a lookup, ordered by distance.

use std::cmp::Ordering;

use crate::common::{Key, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Lifecycle of a peer within a query.
///
/// Transitions are monotonic: Queued → Waiting → {Queried, Unreachable}.
pub enum PeerStatus {
    /// Known but not contacted yet.
    Queued,
    /// A request to this peer is in flight.
    Waiting,
    /// Responded.
    Queried,
    /// Failed to respond; presumed gone.
    Unreachable,
}

#[derive(Debug, Clone)]
struct PeerEntry<const N: usize> {
    node: Node<N>,
    distance: Key<N>,
    status: PeerStatus,
}

#[derive(Debug, Clone)]
/// Working set of candidate peers for one lookup, kept in ascending
/// XOR distance to the target, ties broken by node name.
///
/// Insertion is idempotent per node: the first occurrence wins and
/// later duplicates are ignored, whatever their status.
pub struct PeerList<const N: usize> {
    target: Key<N>,
    entries: Vec<PeerEntry<N>>,
    queued_count: usize,
}

impl<const N: usize> PeerList<N> {
    pub fn new(target: Key<N>) -> Self {
        PeerList {
            target,
            entries: Vec::new(),
            queued_count: 0,
        }
    }

    // === Getters ===

    pub fn target(&self) -> &Key<N> {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still in [Queued](PeerStatus::Queued) state.
    pub fn queued_count(&self) -> usize {
        self.queued_count
    }

    pub fn status_of(&self, node: &Node<N>) -> Option<PeerStatus> {
        self.entries
            .iter()
            .find(|entry| entry.node == *node)
            .map(|entry| entry.status)
    }

    /// Iterate over peers and their statuses in frontier order.
    pub fn peers(&self) -> impl Iterator<Item = (&Node<N>, PeerStatus)> {
        self.entries.iter().map(|entry| (&entry.node, entry.status))
    }

    // === Public Methods ===

    /// Insert a peer as [Queued](PeerStatus::Queued), keeping the list
    /// ordered. Returns `false` for duplicates, which are left as-is.
    pub fn add(&mut self, node: Node<N>) -> bool {
        if self.entries.iter().any(|entry| entry.node == node) {
            return false;
        }

        let distance = node.key().xor(&self.target);

        let pos = match self.entries.binary_search_by(|probe| {
            match probe.distance.cmp(&distance) {
                Ordering::Equal => probe.node.name().cmp(node.name()),
                ord => ord,
            }
        }) {
            Ok(pos) | Err(pos) => pos,
        };

        self.entries.insert(
            pos,
            PeerEntry {
                node,
                distance,
                status: PeerStatus::Queued,
            },
        );
        self.queued_count += 1;

        true
    }

    pub fn add_all<I: IntoIterator<Item = Node<N>>>(&mut self, nodes: I) {
        for node in nodes {
            self.add(node);
        }
    }

    /// Remove-and-return the queued peer closest to the target, marking
    /// it [Waiting](PeerStatus::Waiting). `None` if nothing is queued.
    pub fn pop_closest_queued(&mut self) -> Option<Node<N>> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.status == PeerStatus::Queued)?;

        entry.status = PeerStatus::Waiting;
        self.queued_count -= 1;

        Some(entry.node.clone())
    }

    /// Transition an existing peer's status. Unknown peers and
    /// non-monotonic transitions are ignored; returns whether the
    /// transition was applied.
    pub fn set_status(&mut self, node: &Node<N>, status: PeerStatus) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.node == *node) else {
            return false;
        };

        let allowed = matches!(
            (entry.status, status),
            (PeerStatus::Queued, PeerStatus::Waiting)
                | (PeerStatus::Waiting, PeerStatus::Queried)
                | (PeerStatus::Waiting, PeerStatus::Unreachable)
        );
        if !allowed {
            return false;
        }

        if entry.status == PeerStatus::Queued {
            self.queued_count -= 1;
        }
        entry.status = status;

        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn node(name: &str, last_byte: u8) -> Node<4> {
        Node::new(name, Key([0, 0, 0, last_byte]))
    }

    #[test]
    fn ordered_by_distance_to_target() {
        let mut list = PeerList::new(Key([0, 0, 0, 0]));

        list.add(node("far", 0x08));
        list.add(node("near", 0x01));
        list.add(node("mid", 0x04));

        let order: Vec<&str> = list.peers().map(|(n, _)| n.name()).collect();
        assert_eq!(order, vec!["near", "mid", "far"]);
    }

    #[test]
    fn equal_distance_ties_break_by_name() {
        let mut list = PeerList::new(Key([0, 0, 0, 0]));

        list.add(node("bravo", 0x01));
        list.add(node("alpha", 0x01));

        let order: Vec<&str> = list.peers().map(|(n, _)| n.name()).collect();
        assert_eq!(order, vec!["alpha", "bravo"]);
    }

    #[test]
    fn duplicates_are_ignored_first_seen_wins() {
        let mut list = PeerList::new(Key([0, 0, 0, 0]));

        assert!(list.add(node("peer", 0x01)));
        let popped = list.pop_closest_queued().unwrap();
        assert_eq!(popped.name(), "peer");

        // Re-adding does not reset the peer to queued.
        assert!(!list.add(node("peer", 0x01)));
        assert_eq!(list.status_of(&popped), Some(PeerStatus::Waiting));
        assert_eq!(list.queued_count(), 0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn pop_takes_closest_queued_only() {
        let mut list = PeerList::new(Key([0, 0, 0, 0]));

        list.add(node("near", 0x01));
        list.add(node("far", 0x08));

        assert_eq!(list.pop_closest_queued().unwrap().name(), "near");
        assert_eq!(list.pop_closest_queued().unwrap().name(), "far");
        assert_eq!(list.pop_closest_queued(), None);
        assert_eq!(list.queued_count(), 0);
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let mut list = PeerList::new(Key([0, 0, 0, 0]));
        let peer = node("peer", 0x01);

        list.add(peer.clone());

        // Queued may not jump straight to queried.
        assert!(!list.set_status(&peer, PeerStatus::Queried));

        assert!(list.set_status(&peer, PeerStatus::Waiting));
        assert_eq!(list.queued_count(), 0);

        assert!(list.set_status(&peer, PeerStatus::Queried));

        // Terminal states stay put.
        assert!(!list.set_status(&peer, PeerStatus::Unreachable));
        assert!(!list.set_status(&peer, PeerStatus::Waiting));
        assert_eq!(list.status_of(&peer), Some(PeerStatus::Queried));
    }

    #[test]
    fn set_status_on_unknown_peer_is_ignored() {
        let mut list = PeerList::<4>::new(Key([0, 0, 0, 0]));

        assert!(!list.set_status(&node("ghost", 0x01), PeerStatus::Waiting));
    }
}
