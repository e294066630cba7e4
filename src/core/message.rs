//! Protocol message types.

#[cfg(feature = "codec")]
use bincode::{Decode, Encode};
use bytes::Bytes;

use crate::core::{
    id::Id,
    peer::{Contact, NodeInfo},
};

pub type Nonce = u128;

/// The largest value that can be stored, in bytes.
pub const MAX_VALUE_LEN: usize = 1024 * 1024;

/// Request and response variants. Every message carries the sender's [`NodeInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub enum Message {
    /// PING messages require a PONG response, useful to check peer liveness.
    Ping(Ping),
    /// PONG is the correct response to PING, it must contain the same NONCE.
    Pong(Pong),

    /// FIND_NODE messages query a peer for its K closest nodes to an identifier.
    FindNode(FindNode),
    /// NODES is the correct response to FIND_NODE, and to FIND_VALUE when the value is missing.
    Nodes(Nodes),

    /// FIND_VALUE messages query a peer for the value stored under a key.
    FindValue(FindValue),
    /// VALUE is the response to FIND_VALUE when the value is present.
    Value(Value),

    /// STORE_VALUE asks a peer to store a value, the first value stored under a key wins.
    StoreValue(StoreValue),
    /// STORED acknowledges a STORE_VALUE, regardless of whether the value was kept.
    Stored(Stored),
}

impl Message {
    pub fn variant_as_str(&self) -> &str {
        match self {
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::FindNode(_) => "find_node",
            Message::Nodes(_) => "nodes",
            Message::FindValue(_) => "find_value",
            Message::Value(_) => "value",
            Message::StoreValue(_) => "store_value",
            Message::Stored(_) => "stored",
        }
    }

    pub fn nonce(&self) -> Nonce {
        match self {
            Message::Ping(ping) => ping.nonce,
            Message::Pong(pong) => pong.nonce,
            Message::FindNode(find_node) => find_node.nonce,
            Message::Nodes(nodes) => nodes.nonce,
            Message::FindValue(find_value) => find_value.nonce,
            Message::Value(value) => value.nonce,
            Message::StoreValue(store_value) => store_value.nonce,
            Message::Stored(stored) => stored.nonce,
        }
    }

    pub fn sender(&self) -> NodeInfo {
        match self {
            Message::Ping(ping) => ping.sender,
            Message::Pong(pong) => pong.sender,
            Message::FindNode(find_node) => find_node.sender,
            Message::Nodes(nodes) => nodes.sender,
            Message::FindValue(find_value) => find_value.sender,
            Message::Value(value) => value.sender,
            Message::StoreValue(store_value) => store_value.sender,
            Message::Stored(stored) => stored.sender,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::Pong(_) | Message::Nodes(_) | Message::Value(_) | Message::Stored(_)
        )
    }
}

/// The data making up a PING message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Ping {
    pub nonce: Nonce,
    pub sender: NodeInfo,
}

/// The data making up a PONG message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Pong {
    pub nonce: Nonce,
    pub sender: NodeInfo,
}

/// The data making up a FIND_NODE message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct FindNode {
    pub nonce: Nonce,
    pub target: Id,
    pub sender: NodeInfo,
}

/// The data making up a NODES message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Nodes {
    pub nonce: Nonce,
    pub nodes: Vec<Contact>,
    pub sender: NodeInfo,
}

/// The data making up a FIND_VALUE message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct FindValue {
    pub nonce: Nonce,
    pub key: Id,
    pub sender: NodeInfo,
}

/// The data making up a VALUE message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Value {
    pub nonce: Nonce,
    #[cfg_attr(feature = "codec", bincode(with_serde))]
    pub value: Bytes,
    pub sender: NodeInfo,
}

/// The data making up a STORE_VALUE message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct StoreValue {
    pub nonce: Nonce,
    pub key: Id,
    #[cfg_attr(feature = "codec", bincode(with_serde))]
    pub value: Bytes,
    pub sender: NodeInfo,
}

/// The data making up a STORED message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Stored {
    pub nonce: Nonce,
    pub sender: NodeInfo,
}
