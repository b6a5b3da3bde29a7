//! Trie-structured Kademlia routing table

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::common::{Key, Node};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Admission policy consulted before a peer enters the table.
pub enum KeyFilter {
    /// Admit everything the trie structure can hold.
    None,
    /// Admit a candidate only while fewer than `k` existing entries
    /// share its common-prefix length with the origin.
    BucketLimit(usize),
}

impl KeyFilter {
    fn admits<const N: usize>(&self, table: &RoutingTable<N>, key: &Key<N>) -> bool {
        match self {
            KeyFilter::None => true,
            KeyFilter::BucketLimit(k) => table.cpl_size(table.origin.cpl(key)) < *k,
        }
    }

    fn bucket_capacity(&self) -> usize {
        match self {
            KeyFilter::None => MAX_BUCKET_SIZE_K,
            KeyFilter::BucketLimit(k) => *k,
        }
    }
}

impl Default for KeyFilter {
    fn default() -> Self {
        KeyFilter::BucketLimit(MAX_BUCKET_SIZE_K)
    }
}

#[derive(Debug, Clone)]
/// Slot in the trie arena: a leaf bucket of peers, or a branch whose
/// children are indexed by the next bit of the key.
enum TrieSlot<const N: usize> {
    Bucket(Vec<Node<N>>),
    Branch { zero: usize, one: usize },
}

#[derive(Debug, Clone)]
/// Kademlia routing table: a binary trie over key bits, walked from the
/// most significant bit, with the local node's key as the origin of all
/// distance bookkeeping.
///
/// The trie lives in a flat arena ([Vec] of slots with integer child
/// indices). A full leaf on the origin's path splits on the next bit; a
/// full leaf off that path rejects new entries, which yields one bucket
/// per distinct common-prefix length, each capped at K.
pub struct RoutingTable<const N: usize> {
    origin: Key<N>,
    filter: KeyFilter,
    slots: Vec<TrieSlot<N>>,
    cpl_counts: Vec<usize>,
    len: usize,
}

impl<const N: usize> RoutingTable<N> {
    /// Create a new [RoutingTable] with a given origin key, normally
    /// the local node's key.
    pub fn new(origin: Key<N>) -> Self {
        RoutingTable {
            origin,
            filter: KeyFilter::default(),
            slots: vec![TrieSlot::Bucket(Vec::new())],
            cpl_counts: vec![0; Key::<N>::BITS],
            len: 0,
        }
    }

    /// Replace the admission filter. Applies to subsequent insertions
    /// only.
    pub fn with_filter(mut self, filter: KeyFilter) -> Self {
        self.filter = filter;
        self
    }

    // === Getters ===

    /// Returns the key all distances in this table are measured from.
    pub fn origin(&self) -> &Key<N> {
        &self.origin
    }

    pub fn filter(&self) -> KeyFilter {
        self.filter
    }

    /// Return the number of peers in this routing table.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Count of entries whose common-prefix length with the origin
    /// equals `cpl`.
    pub fn cpl_size(&self, cpl: usize) -> usize {
        self.cpl_counts.get(cpl).copied().unwrap_or(0)
    }

    /// Returns an iterator over the peers in this routing table, in
    /// arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<N>> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                TrieSlot::Bucket(bucket) => Some(bucket.iter()),
                TrieSlot::Branch { .. } => None,
            })
            .flatten()
    }

    pub fn contains(&self, key: &Key<N>) -> bool {
        match &self.slots[self.bucket_index(key)] {
            TrieSlot::Bucket(bucket) => bucket.iter().any(|node| node.key() == key),
            TrieSlot::Branch { .. } => false,
        }
    }

    // === Public Methods ===

    /// Attempts to add a peer to this routing table, and returns `true`
    /// if it did.
    ///
    /// Rejects the local node's own key, keys already present, and
    /// candidates refused by the [KeyFilter].
    pub fn add_peer(&mut self, node: Node<N>) -> bool {
        let key = *node.key();

        if key == self.origin {
            // Do not add self to the routing table
            return false;
        }

        if self.contains(&key) {
            return false;
        }

        if !self.filter.admits(self, &key) {
            return false;
        }

        let origin = self.origin;
        let cpl = origin.cpl(&key);
        let capacity = self.filter.bucket_capacity();

        let mut idx = 0;
        let mut depth = 0;
        let mut on_origin_path = true;

        loop {
            match &mut self.slots[idx] {
                TrieSlot::Branch { zero, one } => {
                    let bit = key.bit(depth);
                    idx = if bit { *one } else { *zero };
                    on_origin_path = on_origin_path && bit == origin.bit(depth);
                    depth += 1;
                }
                TrieSlot::Bucket(bucket) => {
                    if bucket.len() < capacity {
                        bucket.push(node);
                        self.cpl_counts[cpl] += 1;
                        self.len += 1;
                        return true;
                    }

                    if !on_origin_path {
                        // Buckets away from the origin cannot split;
                        // with an admission filter in place this branch
                        // is never reached.
                        return false;
                    }

                    self.split(idx, depth);
                }
            }
        }
    }

    /// Remove the peer with the given key from this routing table, and
    /// return `true` if it was present.
    pub fn remove_key(&mut self, key: &Key<N>) -> bool {
        let idx = self.bucket_index(key);
        let cpl = self.origin.cpl(key);

        if let TrieSlot::Bucket(bucket) = &mut self.slots[idx] {
            if let Some(pos) = bucket.iter().position(|node| node.key() == key) {
                bucket.remove(pos);
                self.cpl_counts[cpl] -= 1;
                self.len -= 1;
                return true;
            }
        }

        false
    }

    /// Return up to `n` peers ordered by ascending XOR distance to
    /// `target`, ties broken by node name.
    ///
    /// Walks the trie preferring the subtree matching the target's bits
    /// and prunes any subtree whose best possible distance cannot beat
    /// the current n-th best.
    pub fn nearest_peers(&self, target: &Key<N>, n: usize) -> Vec<Node<N>> {
        if n == 0 {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(n + 1);
        self.collect_nearest(0, 0, Key::zero(), target, n, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|entry| entry.node)
            .collect()
    }

    // === Private Methods ===

    /// Arena index of the leaf bucket whose prefix covers `key`.
    fn bucket_index(&self, key: &Key<N>) -> usize {
        let mut idx = 0;
        let mut depth = 0;

        loop {
            match &self.slots[idx] {
                TrieSlot::Branch { zero, one } => {
                    idx = if key.bit(depth) { *one } else { *zero };
                    depth += 1;
                }
                TrieSlot::Bucket(_) => return idx,
            }
        }
    }

    /// Turn the leaf at `idx` into a branch, redistributing its entries
    /// by their bit at `depth`.
    fn split(&mut self, idx: usize, depth: usize) {
        let entries = match &mut self.slots[idx] {
            TrieSlot::Bucket(bucket) => std::mem::take(bucket),
            TrieSlot::Branch { .. } => return,
        };

        let (ones, zeros): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|node| node.key().bit(depth));

        let zero = self.slots.len();
        self.slots.push(TrieSlot::Bucket(zeros));
        let one = self.slots.len();
        self.slots.push(TrieSlot::Bucket(ones));

        self.slots[idx] = TrieSlot::Branch { zero, one };
    }

    fn collect_nearest(
        &self,
        idx: usize,
        depth: usize,
        floor: Key<N>,
        target: &Key<N>,
        n: usize,
        heap: &mut BinaryHeap<ByDistance<N>>,
    ) {
        match &self.slots[idx] {
            TrieSlot::Bucket(bucket) => {
                for node in bucket {
                    heap.push(ByDistance {
                        distance: node.key().xor(target),
                        node: node.clone(),
                    });
                    if heap.len() > n {
                        heap.pop();
                    }
                }
            }
            TrieSlot::Branch { zero, one } => {
                let (near, far) = if target.bit(depth) {
                    (*one, *zero)
                } else {
                    (*zero, *one)
                };

                self.collect_nearest(near, depth + 1, floor, target, n, heap);

                // `floor` with this bit set is the best distance any key
                // in the far subtree can achieve. Distances are unique
                // per key, so a tie cannot improve the heap either.
                let mut far_floor = floor;
                far_floor.set_bit(depth, true);

                if heap.len() < n
                    || heap
                        .peek()
                        .map_or(false, |worst| far_floor < worst.distance)
                {
                    self.collect_nearest(far, depth + 1, far_floor, target, n, heap);
                }
            }
        }
    }
}

/// Heap entry ordering peers by distance to a target, then by name.
#[derive(Debug, Clone)]
struct ByDistance<const N: usize> {
    distance: Key<N>,
    node: Node<N>,
}

impl<const N: usize> Ord for ByDistance<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.node.name().cmp(other.node.name()))
    }
}

impl<const N: usize> PartialOrd for ByDistance<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const N: usize> PartialEq for ByDistance<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<const N: usize> Eq for ByDistance<N> {}
