//! Micro-benchmarks for RoutingTable operations: add, nearest_peers,
//! and remove at varying table sizes. Reports nanoseconds-per-operation.
//!
//! Catches regressions in the hot-path data structure that underlies
//! every lookup.
//!
//! Run: `cargo bench --bench routing_table`

use std::time::Instant;

use lodestone::{Key, Node, RoutingTable};

fn main() {
    println!("routing_table\n");

    bench_add();
    bench_nearest_peers();
    bench_remove();
}

fn bench_add() {
    println!("add");

    // Pre-generate random nodes outside the timed section
    let nodes: Vec<Node<32>> = (0..1000)
        .map(|i| Node::new(format!("peer{i}"), Key::random()))
        .collect();

    let mut table = RoutingTable::new(Key::random());

    let start = Instant::now();
    for node in nodes.iter().cloned() {
        table.add_peer(node);
    }
    let per_op = start.elapsed().as_nanos() / nodes.len() as u128;
    println!("  1000 inserts:  {per_op}ns/op (final size: {})", table.size());

    println!();
}

fn bench_nearest_peers() {
    println!("nearest_peers");

    for size in [20, 200, 1000] {
        let mut table = RoutingTable::new(Key::<32>::random());
        for i in 0..size {
            table.add_peer(Node::new(format!("peer{i}"), Key::random()));
        }

        let targets: Vec<Key<32>> = (0..1000).map(|_| Key::random()).collect();

        let start = Instant::now();
        for target in &targets {
            std::hint::black_box(table.nearest_peers(target, 20));
        }
        let per_op = start.elapsed().as_nanos() / targets.len() as u128;
        println!(
            "  {size:>4} entries:  {per_op}ns/op (table size: {})",
            table.size()
        );
    }

    println!();
}

fn bench_remove() {
    println!("remove");

    let nodes: Vec<Node<32>> = (0..1000)
        .map(|i| Node::new(format!("peer{i}"), Key::random()))
        .collect();

    let mut table = RoutingTable::new(Key::random());
    for node in nodes.iter().cloned() {
        table.add_peer(node);
    }

    let start = Instant::now();
    for node in &nodes {
        table.remove_key(node.key());
    }
    let per_op = start.elapsed().as_nanos() / nodes.len() as u128;
    println!("  1000 removes:  {per_op}ns/op (final size: {})", table.size());
}
