//! A Kademlia routing table and iterative lookup engine.
//!
//! The crate is split in layers that can be used independently:
//!
//! 1. The core types: 160-bit [`Id`]s and their XOR metric, the k-bucket [`RoutingTable`] and
//!    the [`Lookup`] state machine. These don't perform any I/O and are always available.
//! 2. The [`Node`] (feature `sync`), which drives lookups concurrently over a [`Transport`],
//!    answers incoming requests, stores values in a [`Store`] and keeps its table fresh.
//! 3. A bincode wire [`codec`] and a TCP [`Transport`](tcp::TcpTransport) with a matching
//!    server loop (feature `codec`).
//!
//! Notable properties:
//!
//! 1. The routing table partitions the identifier space in fixed buckets by log2 distance to the
//!    local identifier, buckets are never split.
//! 2. A full bucket keeps its incumbents: the oldest peer is only replaced once it fails to answer
//!    a ping, and only if it wasn't seen recently.
//! 3. Stored values are immutable, the first value stored under a key wins and nothing expires.

#![cfg_attr(doc_cfg, feature(doc_cfg))]

#[cfg(feature = "codec")]
#[cfg_attr(doc_cfg, doc(cfg(feature = "codec")))]
pub mod codec;
#[cfg(feature = "codec")]
#[cfg_attr(doc_cfg, doc(cfg(feature = "codec")))]
pub mod tcp;

mod core;
#[cfg(feature = "sync")]
mod node;

pub use crate::core::{
    config::Config,
    id::{Distance, Id},
    lookup::{Lookup, LookupKind, Outcome, Reply, Step},
    message,
    peer::{Contact, NodeInfo, Peer},
    routing_table::{Bucket, Insertion, RoutingTable},
};
#[cfg(feature = "sync")]
pub use node::{MemoryStore, Node, RpcError, Store, Transport};
