//! Outgoing requests, i.e. the remote half of a peer.

use std::{future::Future, net::SocketAddr};

use bytes::Bytes;
use tracing::warn;

use crate::{
    core::{
        id::Id,
        lookup::Reply,
        peer::{Contact, NodeInfo},
    },
    node::{Node, RpcError, Store, Transport},
};

impl<T: Transport, S: Store> Node<T, S> {
    // Bounds every request by the configured deadline, so a failure is always reported.
    async fn with_deadline<R>(
        &self,
        request: impl Future<Output = Result<R, RpcError>>,
    ) -> Result<R, RpcError> {
        match tokio::time::timeout(self.config.rpc_timeout, request).await {
            Ok(res) => res,
            Err(_elapsed) => Err(RpcError::Timeout),
        }
    }

    pub(crate) async fn ping_remote(&self, addr: SocketAddr) -> Result<NodeInfo, RpcError> {
        self.with_deadline(self.transport.ping(addr, self.info()))
            .await
    }

    pub(crate) async fn find_node_remote(
        &self,
        addr: SocketAddr,
        target: Id,
    ) -> Result<(Vec<Contact>, NodeInfo), RpcError> {
        self.with_deadline(self.transport.find_node(addr, target, self.info()))
            .await
    }

    pub(crate) async fn find_value_remote(
        &self,
        addr: SocketAddr,
        key: Id,
    ) -> Result<(Reply, NodeInfo), RpcError> {
        self.with_deadline(self.transport.find_value(addr, key, self.info()))
            .await
    }

    pub(crate) async fn store_value_remote(
        &self,
        addr: SocketAddr,
        key: Id,
        value: Bytes,
    ) -> Result<NodeInfo, RpcError> {
        self.with_deadline(self.transport.store_value(addr, key, value, self.info()))
            .await
    }

    /// Records a successful exchange with `contacted`.
    ///
    /// The responder's own claim about its identifier wins over the one we had on record; the
    /// address is the one we reached it on. Nothing proves the claim.
    pub(crate) fn observe_responder(&self, contacted: Contact, info: NodeInfo) {
        if info.id != contacted.id {
            warn!(
                expected = %contacted.id,
                reported = %info.id,
                addr = %contacted.addr,
                "peer reported an unexpected identifier"
            );
        }

        self.insert_node(Contact::new(info.id, contacted.addr).into());
    }
}
