//! The transport seam between a [`Node`](crate::Node) and its peers.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::core::{
    id::Id,
    lookup::Reply,
    message::MAX_VALUE_LEN,
    peer::{Contact, NodeInfo},
};

/// The reasons an outgoing request can fail. Within a lookup the network failures are all handled
/// the same way: the peer is considered unresponsive for the rest of that lookup.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    /// Refused locally, the request was never sent.
    #[error("value of {0} bytes exceeds the maximum of {max}", max = MAX_VALUE_LEN)]
    ValueTooLarge(usize),
}

/// Carries the four requests between nodes.
///
/// Every request includes the sender's [`NodeInfo`] and resolves to the responder's. The
/// responder derives the sender's address from the connection, not from the request. The
/// [`Node`](crate::Node) enforces its own deadline on every call, implementations don't need
/// to (but may) time out themselves.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a PING, resolves to the PONG's sender.
    async fn ping(&self, addr: SocketAddr, sender: NodeInfo) -> Result<NodeInfo, RpcError>;

    /// Sends a FIND_NODE, resolves to the responder's closest contacts to the target.
    async fn find_node(
        &self,
        addr: SocketAddr,
        target: Id,
        sender: NodeInfo,
    ) -> Result<(Vec<Contact>, NodeInfo), RpcError>;

    /// Sends a FIND_VALUE, resolves to either the value or the responder's closest contacts to
    /// the key.
    async fn find_value(
        &self,
        addr: SocketAddr,
        key: Id,
        sender: NodeInfo,
    ) -> Result<(Reply, NodeInfo), RpcError>;

    /// Sends a STORE_VALUE. A successful response says nothing about whether the value was kept.
    async fn store_value(
        &self,
        addr: SocketAddr,
        key: Id,
        value: Bytes,
        sender: NodeInfo,
    ) -> Result<NodeInfo, RpcError>;
}
