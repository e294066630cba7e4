//! Periodic routing table upkeep.

use futures::future::join_all;
use time::OffsetDateTime;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

use crate::{
    core::{id::Id, peer::Contact},
    node::{Node, Store, Transport},
};

impl<T: Transport, S: Store> Node<T, S> {
    /// Looks up the identifier next to ours, which fills the table with our closest neighbours.
    /// Should be run once the node knows at least one contact.
    pub async fn find_close_nodes(&self) -> Vec<Contact> {
        self.find_node(self.local.id.adjacent()).await
    }

    /// Refreshes every bucket that hasn't been accessed for the configured age by looking up a
    /// random identifier in its range. Returns the number of buckets refreshed.
    pub async fn refresh_table(&self) -> usize {
        let now = OffsetDateTime::now_utc();

        let targets: Vec<Id> = self
            .table
            .read()
            .buckets()
            .filter(|bucket| now - bucket.last_accessed() >= self.config.bucket_refresh_age)
            .map(|bucket| Id::random_in_range(bucket.range()))
            .collect();

        if !targets.is_empty() {
            debug!(buckets = targets.len(), "refreshing stale buckets");
        }

        join_all(targets.iter().map(|id| self.find_node(*id))).await;

        targets.len()
    }

    /// Spawns the maintenance task: a close node lookup straight away, then a bucket refresh
    /// on every maintenance interval. Abort the returned handle to stop it.
    pub fn spawn_maintenance(&self) -> JoinHandle<()> {
        let node = self.clone();

        tokio::spawn(async move {
            node.find_close_nodes().await;

            let mut interval = tokio::time::interval(node.config.maintenance_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                node.refresh_table().await;
            }
        })
    }
}
