//! Drives [`Lookup`] state machines over the transport.

use futures::{stream::FuturesUnordered, StreamExt};
use tracing::{debug, trace};

use crate::{
    core::{
        id::Id,
        lookup::{Lookup, LookupKind, Outcome, Reply},
        peer::Contact,
    },
    node::{Node, Store, Transport},
};

impl<T: Transport, S: Store> Node<T, S> {
    /// Runs a lookup to completion, starting from the seeds.
    ///
    /// The lookup state lives on this task only, replies are fed to it one at a time as they
    /// arrive. Queries still in flight once it finishes are dropped.
    pub(crate) async fn lookup(
        &self,
        kind: LookupKind,
        target: Id,
        seeds: Vec<Contact>,
    ) -> Outcome {
        let (k, alpha) = (self.config.k, self.config.alpha);
        let mut lookup = Lookup::new(kind, target, self.local.id, k, alpha);
        let mut in_flight = FuturesUnordered::new();

        let mut step = lookup.start(seeds);
        loop {
            for contact in step.discovered.drain(..) {
                self.insert_discovered(contact);
            }

            if let Some(outcome) = step.outcome.take() {
                trace!(?kind, id = %target, "lookup finished");
                return outcome;
            }

            for contact in step.queries.drain(..) {
                in_flight.push(self.query(kind, target, contact));
            }

            let (from, reply) = match in_flight.next().await {
                Some(res) => res,
                None => {
                    // Every outstanding query is in flight, this can't be reached while the
                    // lookup is still waiting on one.
                    debug_assert_eq!(lookup.outstanding(), 0);
                    return lookup.finish();
                }
            };

            step = lookup.on_reply(from, reply);
        }
    }

    async fn query(&self, kind: LookupKind, target: Id, contact: Contact) -> (Id, Option<Reply>) {
        let res = match kind {
            LookupKind::Node => self
                .find_node_remote(contact.addr, target)
                .await
                .map(|(contacts, info)| (Reply::Nodes(contacts), info)),
            LookupKind::Value => self.find_value_remote(contact.addr, target).await,
        };

        match res {
            Ok((reply, info)) => {
                self.observe_responder(contact, info);
                (contact.id, Some(reply))
            }
            Err(e) => {
                debug!(peer = %contact.id, addr = %contact.addr, error = %e, "lookup query failed");
                (contact.id, None)
            }
        }
    }
}
