//! An async node driving the routing table and lookups over a [`Transport`].

mod handler;
mod lookup;
mod maintenance;
mod remote;
mod rpc;
mod store;

use std::{collections::HashSet, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, trace};

pub use rpc::{RpcError, Transport};
pub use store::{MemoryStore, Store};

use crate::core::{
    config::Config,
    id::Id,
    lookup::{LookupKind, Outcome},
    message::MAX_VALUE_LEN,
    peer::{Contact, NodeInfo},
    routing_table::RoutingTable,
};

#[cfg_attr(doc_cfg, doc(cfg(feature = "sync")))]
/// A DHT node, suitable for use in async contexts.
///
/// It owns the [`RoutingTable`] behind a lock and only ever mutates it in short, non-suspending
/// sections. Clones are cheap and share the same state, background tasks hold their own clone.
pub struct Node<T, S = MemoryStore> {
    config: Config,
    local: Contact,
    table: Arc<RwLock<RoutingTable>>,
    store: Arc<S>,
    transport: Arc<T>,
    // Incumbents currently being pinged by the insertion policy.
    probing: Arc<Mutex<HashSet<Id>>>,
}

impl<T, S> Clone for Node<T, S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            local: self.local,
            table: Arc::clone(&self.table),
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            probing: Arc::clone(&self.probing),
        }
    }
}

impl<T: Transport, S: Store> Node<T, S> {
    /// Creates a node identified by `local.id`, listening on `local.addr`.
    pub fn new(config: Config, local: Contact, transport: T, store: S) -> Self {
        Self {
            config,
            local,
            table: Arc::new(RwLock::new(RoutingTable::new(local.id, config.k))),
            store: Arc::new(store),
            transport: Arc::new(transport),
            probing: Default::default(),
        }
    }

    /// Returns this node's local identifier.
    pub fn local_id(&self) -> Id {
        self.local.id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local.addr
    }

    /// The self-description attached to every message this node sends.
    pub fn info(&self) -> NodeInfo {
        NodeInfo::new(self.local.id, self.local.addr.port())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Read access to the routing table, the guard shouldn't be held across an await.
    pub fn routing_table(&self) -> RwLockReadGuard<'_, RoutingTable> {
        self.table.read()
    }

    /// Pings the address and, on a PONG, adds the responder to the routing table.
    pub async fn add_contact(&self, addr: SocketAddr) -> Result<Contact, RpcError> {
        let info = self.ping_remote(addr).await?;
        let contact = Contact::new(info.id, addr);
        self.insert_node(contact.into());

        Ok(contact)
    }

    /// Returns the contact for the identifier if it can be found, otherwise the K closest
    /// contacts to it.
    pub async fn find_node(&self, id: Id) -> Vec<Contact> {
        let seeds = self.table.read().find_closest(&id);

        // Fast path: the table knows exactly this node and nothing closer. An empty table takes
        // the slow path, which terminates straight away.
        if seeds.len() == 1 && seeds[0].id == id {
            trace!(%id, "found in the routing table");
            return seeds;
        }

        match self.lookup(LookupKind::Node, id, seeds).await {
            Outcome::Nodes(contacts) => contacts,
            Outcome::Value(_) | Outcome::NotFound => vec![],
        }
    }

    /// Searches the network for the value stored under the key.
    pub async fn value_for_key(&self, key: Id) -> Option<Bytes> {
        let seeds = self.table.read().find_closest(&key);

        match self.lookup(LookupKind::Value, key, seeds).await {
            Outcome::Value(value) => Some(value),
            Outcome::Nodes(_) | Outcome::NotFound => None,
        }
    }

    /// Stores the value on the K closest nodes to the key, in the background.
    ///
    /// Values larger than [`MAX_VALUE_LEN`] are refused up front.
    pub fn store_value_for_key(&self, key: Id, value: Bytes) -> Result<(), RpcError> {
        check_value_len(&key, &value)?;

        let node = self.clone();
        tokio::spawn(async move {
            // The length was checked above, this can't fail.
            let _ = node.publish(key, value).await;
        });

        Ok(())
    }

    /// Stores the value on the K closest nodes to the key, returns how many acknowledged it.
    ///
    /// An acknowledgement doesn't mean the peer kept the value, the first value stored under a
    /// key wins. Values larger than [`MAX_VALUE_LEN`] are refused.
    pub async fn publish(&self, key: Id, value: Bytes) -> Result<usize, RpcError> {
        check_value_len(&key, &value)?;

        let closest = self.find_node(key).await;

        let stores = closest
            .into_iter()
            .filter(|contact| contact.id != self.local.id)
            .map(|contact| {
                let value = value.clone();
                async move {
                    match self.store_value_remote(contact.addr, key, value).await {
                        Ok(info) => {
                            self.observe_responder(contact, info);
                            true
                        }
                        Err(e) => {
                            debug!(peer = %contact.id, error = %e, "store_value failed");
                            false
                        }
                    }
                }
            });

        let acks = join_all(stores).await.into_iter().filter(|ok| *ok).count();
        debug!(%key, acks, "published value");

        Ok(acks)
    }
}

fn check_value_len(key: &Id, value: &Bytes) -> Result<(), RpcError> {
    if value.len() > MAX_VALUE_LEN {
        debug!(%key, len = value.len(), "refusing to publish an oversized value");
        return Err(RpcError::ValueTooLarge(value.len()));
    }

    Ok(())
}
