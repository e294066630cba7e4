#![cfg(feature = "sync")]
#![allow(dead_code)]

use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use kadroute::{Config, Contact, Id, MemoryStore, Node, NodeInfo, Reply, RpcError, Transport};
use parking_lot::{Mutex, RwLock};
use tracing_subscriber::{fmt, EnvFilter};

pub fn enable_tracing() {
    fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

pub type TestNode = Node<MemTransport, MemoryStore>;

/// How a registered node reacts to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Up,
    /// Requests fail straight away, as if the connection was refused.
    Down,
    /// Requests never complete.
    Silent,
}

/// An in-process network: requests are delivered by calling the handlers of the node registered
/// at the destination address.
#[derive(Default)]
pub struct Network {
    nodes: RwLock<HashMap<SocketAddr, (TestNode, Behaviour)>>,
    // Requests addressed to each address, delivered or not.
    requests: Mutex<HashMap<SocketAddr, usize>>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a node listening on `127.0.0.1:port` and registers it.
    pub fn spawn_node(self: &Arc<Self>, id: Id, port: u16, config: Config) -> TestNode {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let transport = MemTransport {
            network: Arc::clone(self),
            local: addr,
        };
        let node = Node::new(config, Contact::new(id, addr), transport, MemoryStore::new());
        self.nodes
            .write()
            .insert(addr, (node.clone(), Behaviour::Up));

        node
    }

    pub fn set_behaviour(&self, addr: SocketAddr, behaviour: Behaviour) {
        if let Some((_, b)) = self.nodes.write().get_mut(&addr) {
            *b = behaviour;
        }
    }

    pub fn nodes(&self) -> Vec<TestNode> {
        self.nodes.read().values().map(|(node, _)| node.clone()).collect()
    }

    /// The number of requests sent to the address so far.
    pub fn requests(&self, addr: SocketAddr) -> usize {
        self.requests.lock().get(&addr).copied().unwrap_or(0)
    }

    // Clones the destination out of the lock, the handlers may reenter the network.
    async fn route(&self, addr: SocketAddr) -> Result<TestNode, RpcError> {
        *self.requests.lock().entry(addr).or_default() += 1;
        let entry = self.nodes.read().get(&addr).cloned();

        match entry {
            Some((node, Behaviour::Up)) => Ok(node),
            Some((_, Behaviour::Silent)) => futures::future::pending().await,
            Some((_, Behaviour::Down)) | None => {
                Err(io::Error::from(io::ErrorKind::ConnectionRefused).into())
            }
        }
    }
}

pub struct MemTransport {
    network: Arc<Network>,
    local: SocketAddr,
}

#[async_trait]
impl Transport for MemTransport {
    async fn ping(&self, addr: SocketAddr, sender: NodeInfo) -> Result<NodeInfo, RpcError> {
        let node = self.network.route(addr).await?;
        Ok(node.handle_ping(self.local.ip(), sender))
    }

    async fn find_node(
        &self,
        addr: SocketAddr,
        target: Id,
        sender: NodeInfo,
    ) -> Result<(Vec<Contact>, NodeInfo), RpcError> {
        let node = self.network.route(addr).await?;
        Ok(node.handle_find_node(self.local.ip(), target, sender))
    }

    async fn find_value(
        &self,
        addr: SocketAddr,
        key: Id,
        sender: NodeInfo,
    ) -> Result<(Reply, NodeInfo), RpcError> {
        let node = self.network.route(addr).await?;
        Ok(node.handle_find_value(self.local.ip(), key, sender))
    }

    async fn store_value(
        &self,
        addr: SocketAddr,
        key: Id,
        value: Bytes,
        sender: NodeInfo,
    ) -> Result<NodeInfo, RpcError> {
        let node = self.network.route(addr).await?;
        Ok(node.handle_store_value(self.local.ip(), key, value, sender))
    }
}

/// Spawns `n` nodes with random identifiers on consecutive ports from `base_port`, each of them
/// bootstrapped through the first one.
pub async fn bootstrapped_network(
    n: u16,
    base_port: u16,
    config: Config,
) -> (Arc<Network>, Vec<TestNode>) {
    let network = Network::new();
    let nodes: Vec<_> = (0..n)
        .map(|i| network.spawn_node(Id::rand(), base_port + i, config))
        .collect();

    let bootstrap = nodes[0].local_addr();
    for node in &nodes[1..] {
        node.add_contact(bootstrap).await.unwrap();
    }

    (network, nodes)
}
