//! Walkthrough: a lookup over a small simulated network.
//!
//! Builds a three-layer network of scripted peers, seeds the routing
//! table with the outermost layer, and runs a query until the frontier
//! drains.
//!
//! Run: `cargo run --example lookup`

use tracing::Level;

use lodestone::query::{PeerStatus, QueryConfig, QueryPool};
use lodestone::sim::SimNetwork;
use lodestone::{FindNodeRequest, Key, Node, Response, RoutingTable};

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    let local = Node::new("local", Key::<4>([0x80, 0, 0, 1]));
    let target = Key([0, 0, 0, 0]);

    let mut table = RoutingTable::new(*local.key());
    let mut network = SimNetwork::new(local);

    // Each peer in a layer points at one peer of the next, closer
    // layer; the innermost layer has nothing more to offer.
    for i in 0..5u8 {
        let far = Node::new(format!("far{i}"), Key([0x40, 0, 0, i]));
        let mid = Node::new(format!("mid{i}"), Key([0x20, 0, 0, i]));
        let near = Node::new(format!("near{i}"), Key([0x10, 0, 0, i]));

        network.add_peer_with_nodes(far.clone(), vec![mid.clone()]);
        network.add_peer_with_nodes(mid, vec![near.clone()]);
        network.add_peer_with_nodes(near, Vec::new());

        table.add_peer(far);
    }

    let mut pool = QueryPool::new(table, network);

    let query = pool.start_query(
        FindNodeRequest::new(target),
        QueryConfig::default(),
        |peer, resp| {
            println!("{peer} answered with {} closer peer(s)", resp.closer_nodes().len());
            (false, resp.closer_nodes().to_vec())
        },
    );

    pool.run_to_idle();

    let q = pool.query(query).expect("query still in pool");
    println!("\nfinished: {}", q.is_finished());

    println!("frontier, closest first:");
    for (peer, status) in q.peer_list().peers() {
        let marker = match status {
            PeerStatus::Queried => "queried",
            PeerStatus::Unreachable => "unreachable",
            PeerStatus::Waiting => "waiting",
            PeerStatus::Queued => "queued",
        };
        println!("  {peer} ({marker}, distance {})", peer.key().xor(&target));
    }
}
