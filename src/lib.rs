#![doc = include_str!("../README.md")]

//! # Lodestone
//! Kademlia DHT client core: routing table and iterative lookup engine.

mod common;
mod error;

pub mod endpoint;
pub mod query;
pub mod scheduler;
pub mod sim;

pub use crate::common::{
    FindNodeRequest, FindNodeResponse, Key, KeyFilter, Node, Request, Response, RoutingTable,
    MAX_BUCKET_SIZE_K,
};
pub use error::Error;

// Alias Result to be the crate Result.
pub type Result<T, E = error::Error> = core::result::Result<T, E>;
