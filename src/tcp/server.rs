use std::{
    io,
    net::{IpAddr, SocketAddr},
};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::{
    codec::MessageCodec,
    core::{
        lookup::Reply,
        message::{Message, Nodes, Pong, Stored, Value},
    },
    node::{Node, Store, Transport},
};

/// Accepts connections and answers their requests until the listener fails.
pub async fn serve<T: Transport, S: Store>(
    node: Node<T, S>,
    listener: TcpListener,
) -> io::Result<()> {
    loop {
        let (stream, source) = listener.accept().await?;
        let node = node.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(&node, stream, source).await {
                debug!(%source, error = %e, "connection failed");
            }
        });
    }
}

async fn handle_connection<T: Transport, S: Store>(
    node: &Node<T, S>,
    stream: TcpStream,
    source: SocketAddr,
) -> io::Result<()> {
    let mut framed = Framed::new(stream, MessageCodec::new());

    while let Some(message) = framed.next().await {
        let message = message?;
        trace!(%source, "processing {}", message.variant_as_str());

        match process_message(node, source.ip(), message) {
            Some(response) => framed.send(response).await?,
            // Responses are only ever read on the connection that sent the request.
            None => break,
        }
    }

    Ok(())
}

/// Processes a peer's message. If it is a request, the response to send back is returned.
///
/// The sender is identified by the claimed identifier in the message and the observed `source`
/// address.
pub fn process_message<T: Transport, S: Store>(
    node: &Node<T, S>,
    source: IpAddr,
    message: Message,
) -> Option<Message> {
    match message {
        Message::Ping(ping) => {
            let sender = node.handle_ping(source, ping.sender);
            Some(Message::Pong(Pong {
                nonce: ping.nonce,
                sender,
            }))
        }
        Message::FindNode(find_node) => {
            let (nodes, sender) = node.handle_find_node(source, find_node.target, find_node.sender);
            Some(Message::Nodes(Nodes {
                nonce: find_node.nonce,
                nodes,
                sender,
            }))
        }
        Message::FindValue(find_value) => {
            let nonce = find_value.nonce;
            match node.handle_find_value(source, find_value.key, find_value.sender) {
                (Reply::Value(value), sender) => Some(Message::Value(Value {
                    nonce,
                    value,
                    sender,
                })),
                (Reply::Nodes(nodes), sender) => Some(Message::Nodes(Nodes {
                    nonce,
                    nodes,
                    sender,
                })),
            }
        }
        Message::StoreValue(store_value) => {
            let sender = node.handle_store_value(
                source,
                store_value.key,
                store_value.value,
                store_value.sender,
            );
            Some(Message::Stored(Stored {
                nonce: store_value.nonce,
                sender,
            }))
        }
        Message::Pong(_) | Message::Nodes(_) | Message::Value(_) | Message::Stored(_) => None,
    }
}
