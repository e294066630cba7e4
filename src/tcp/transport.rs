use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rand::{thread_rng, Rng};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::trace;

use crate::{
    codec::MessageCodec,
    core::{
        id::Id,
        lookup::Reply,
        message::{FindNode, FindValue, Message, Nonce, Ping, StoreValue},
        peer::{Contact, NodeInfo},
    },
    node::{RpcError, Transport},
};

/// Sends each request over a fresh TCP connection and waits for the single response.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }

    async fn request(&self, addr: SocketAddr, message: Message) -> Result<Message, RpcError> {
        let nonce = message.nonce();
        trace!(%addr, "sending {}", message.variant_as_str());

        let stream = TcpStream::connect(addr).await?;
        let mut framed = Framed::new(stream, MessageCodec::new());
        framed.send(message).await?;

        match framed.next().await {
            Some(Ok(response)) if response.nonce() == nonce && response.is_response() => {
                Ok(response)
            }
            Some(Ok(_)) => Err(RpcError::MalformedResponse("unexpected message")),
            Some(Err(e)) => Err(e.into()),
            None => Err(RpcError::MalformedResponse("connection closed")),
        }
    }
}

fn gen_nonce() -> Nonce {
    thread_rng().gen()
}

#[async_trait]
impl Transport for TcpTransport {
    async fn ping(&self, addr: SocketAddr, sender: NodeInfo) -> Result<NodeInfo, RpcError> {
        let ping = Message::Ping(Ping {
            nonce: gen_nonce(),
            sender,
        });

        match self.request(addr, ping).await? {
            Message::Pong(pong) => Ok(pong.sender),
            _ => Err(RpcError::MalformedResponse("expected pong")),
        }
    }

    async fn find_node(
        &self,
        addr: SocketAddr,
        target: Id,
        sender: NodeInfo,
    ) -> Result<(Vec<Contact>, NodeInfo), RpcError> {
        let find_node = Message::FindNode(FindNode {
            nonce: gen_nonce(),
            target,
            sender,
        });

        match self.request(addr, find_node).await? {
            Message::Nodes(nodes) => Ok((nodes.nodes, nodes.sender)),
            _ => Err(RpcError::MalformedResponse("expected nodes")),
        }
    }

    async fn find_value(
        &self,
        addr: SocketAddr,
        key: Id,
        sender: NodeInfo,
    ) -> Result<(Reply, NodeInfo), RpcError> {
        let find_value = Message::FindValue(FindValue {
            nonce: gen_nonce(),
            key,
            sender,
        });

        match self.request(addr, find_value).await? {
            Message::Value(value) => Ok((Reply::Value(value.value), value.sender)),
            Message::Nodes(nodes) => Ok((Reply::Nodes(nodes.nodes), nodes.sender)),
            _ => Err(RpcError::MalformedResponse("expected value or nodes")),
        }
    }

    async fn store_value(
        &self,
        addr: SocketAddr,
        key: Id,
        value: Bytes,
        sender: NodeInfo,
    ) -> Result<NodeInfo, RpcError> {
        let store_value = Message::StoreValue(StoreValue {
            nonce: gen_nonce(),
            key,
            value,
            sender,
        });

        match self.request(addr, store_value).await? {
            Message::Stored(stored) => Ok(stored.sender),
            _ => Err(RpcError::MalformedResponse("expected stored")),
        }
    }
}
