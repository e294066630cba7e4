//! Incoming requests and the routing table insertion policy.

use std::net::IpAddr;

use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::{
    core::{
        id::Id,
        lookup::Reply,
        peer::{Contact, NodeInfo, Peer},
        routing_table::Insertion,
    },
    node::{Node, Store, Transport},
};

impl<T: Transport, S: Store> Node<T, S> {
    /// Offers a peer we've just exchanged messages with to the routing table.
    ///
    /// If its bucket is full and the bucket's oldest peer hasn't been heard from in a while, the
    /// oldest peer is pinged in the background: it stays if it answers, otherwise the newcomer
    /// takes its slot. If the oldest peer was seen recently the newcomer is dropped.
    pub fn insert_node(&self, peer: Peer) {
        let insertion = self.table.write().insert(peer);
        self.handle_insertion(insertion, peer);
    }

    /// Offers a contact learned from another peer to the routing table. A known peer keeps its
    /// address and last seen timestamp, a new one goes through the same policy as
    /// [`insert_node`](Self::insert_node).
    pub(crate) fn insert_discovered(&self, contact: Contact) {
        let peer = Peer::from(contact);
        let insertion = self.table.write().insert_discovered(peer);
        self.handle_insertion(insertion, peer);
    }

    fn handle_insertion(&self, insertion: Insertion, peer: Peer) {
        let oldest = match insertion.eviction_candidate() {
            Some(oldest) if oldest.id() != self.local.id => *oldest,
            _ => return,
        };

        let age = OffsetDateTime::now_utc() - oldest.last_seen();
        if age <= self.config.max_ping_interval {
            trace!(peer = %peer.id(), incumbent = %oldest.id(), "bucket full, dropping newcomer");
            return;
        }

        // One staleness ping per incumbent at a time, later newcomers are dropped while it runs.
        if !self.probing.lock().insert(oldest.id()) {
            trace!(
                peer = %peer.id(),
                incumbent = %oldest.id(),
                "incumbent already being pinged, dropping newcomer"
            );
            return;
        }

        // The ping can take up to the request deadline, don't hold up the caller.
        let node = self.clone();
        tokio::spawn(async move {
            node.check_stale(oldest, peer).await;
            node.probing.lock().remove(&oldest.id());
        });
    }

    // Every request tells us about its sender.
    fn observe_sender(&self, source: IpAddr, sender: NodeInfo) {
        self.insert_node(sender.contact(source).into());
    }

    /// Answers a PING from `source`.
    pub fn handle_ping(&self, source: IpAddr, sender: NodeInfo) -> NodeInfo {
        self.observe_sender(source, sender);

        self.info()
    }

    /// Answers a FIND_NODE from `source` with the K closest contacts to the target.
    pub fn handle_find_node(
        &self,
        source: IpAddr,
        target: Id,
        sender: NodeInfo,
    ) -> (Vec<Contact>, NodeInfo) {
        let closest = self.table.read().find_closest(&target);
        self.observe_sender(source, sender);

        (closest, self.info())
    }

    /// Answers a FIND_VALUE from `source` with the value if it is stored locally, otherwise with
    /// the K closest contacts to the key.
    pub fn handle_find_value(
        &self,
        source: IpAddr,
        key: Id,
        sender: NodeInfo,
    ) -> (Reply, NodeInfo) {
        let reply = match self.store.get(&key) {
            Some(value) => Reply::Value(value),
            None => Reply::Nodes(self.table.read().find_closest(&key)),
        };
        self.observe_sender(source, sender);

        (reply, self.info())
    }

    /// Stores the value unless the key is already present, then acknowledges either way.
    pub fn handle_store_value(
        &self,
        source: IpAddr,
        key: Id,
        value: Bytes,
        sender: NodeInfo,
    ) -> NodeInfo {
        if !self.store.put(key, value) {
            trace!(%key, sender = %sender.id, "key already present, ignoring store");
        }
        self.observe_sender(source, sender);

        self.info()
    }
}
