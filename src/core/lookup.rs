//! Iterative lookup state machine.
//!
//! A [`Lookup`] doesn't perform any I/O. It tells its driver which contacts to query via
//! [`Step::queries`], and is fed every reply (or failure) exactly once through
//! [`Lookup::on_reply`]. Each step also reports the contacts discovered along the way so the
//! driver can offer them to the routing table, and the final [`Outcome`] once the search is
//! done.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::core::{id::Id, peer::Contact};

/// What a lookup is searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// FIND_NODE: the K closest contacts to the target.
    Node,
    /// FIND_VALUE: the value stored under the target key.
    Value,
}

/// A successful reply to a lookup query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The responder's closest contacts to the target.
    Nodes(Vec<Contact>),
    /// The value stored under the target key, only sent in response to FIND_VALUE.
    Value(Bytes),
}

/// The final result of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The closest contacts found, closest first. An exact match is returned on its own.
    Nodes(Vec<Contact>),
    /// The value was found.
    Value(Bytes),
    /// A value lookup ran out of contacts to query.
    NotFound,
}

/// The actions requested by the lookup after it has processed an event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Step {
    /// Contacts to send the lookup query to.
    pub queries: Vec<Contact>,
    /// Newly discovered contacts, to be offered to the routing table.
    pub discovered: Vec<Contact>,
    /// Set once the lookup is finished, it won't request anything else afterwards.
    pub outcome: Option<Outcome>,
}

/// The state of a single iterative lookup.
#[derive(Debug, Clone)]
pub struct Lookup {
    kind: LookupKind,
    target: Id,
    local_id: Id,
    k: usize,
    alpha: usize,
    found: HashMap<Id, Contact>,
    queried: HashSet<Id>,
    answered: HashSet<Id>,
    outstanding: usize,
    finished: bool,
}

impl Lookup {
    /// Creates a lookup for `target` that considers the `k` closest contacts and keeps at most
    /// `alpha` queries in flight once bootstrapped.
    pub fn new(kind: LookupKind, target: Id, local_id: Id, k: usize, alpha: usize) -> Self {
        Self {
            kind,
            target,
            local_id,
            k: k.max(1),
            alpha: alpha.max(1),
            found: HashMap::new(),
            queried: HashSet::new(),
            answered: HashSet::new(),
            outstanding: 0,
            finished: false,
        }
    }

    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    pub fn target(&self) -> Id {
        self.target
    }

    /// The number of queries awaiting a reply.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Starts the lookup by querying every seed (the local node excepted).
    ///
    /// If there's nobody to query the lookup finishes straight away with what it has.
    pub fn start(&mut self, seeds: impl IntoIterator<Item = Contact>) -> Step {
        let mut step = Step::default();

        if self.finished {
            return step;
        }

        for seed in seeds {
            if seed.id == self.local_id || self.queried.contains(&seed.id) {
                continue;
            }

            self.found.insert(seed.id, seed);
            self.queried.insert(seed.id);
            self.outstanding += 1;
            step.queries.push(seed);
        }

        if self.outstanding == 0 {
            step.outcome = Some(self.finish());
            return step;
        }

        // Picks up a seed that is the target itself.
        let scheduled = self.schedule();
        if scheduled.outcome.is_some() {
            return scheduled;
        }
        step.queries.extend(scheduled.queries);

        step
    }

    /// Processes the reply (or failure) of the query sent to `from`.
    ///
    /// Replies for a finished lookup and repeated replies from the same contact are ignored.
    pub fn on_reply(&mut self, from: Id, reply: Option<Reply>) -> Step {
        if self.finished || self.answered.contains(&from) || !self.queried.contains(&from) {
            return Step::default();
        }

        debug_assert!(self.outstanding > 0);
        self.outstanding -= 1;
        self.answered.insert(from);

        let mut discovered = Vec::new();
        match reply {
            Some(Reply::Value(value)) if self.kind == LookupKind::Value => {
                self.finished = true;

                return Step {
                    outcome: Some(Outcome::Value(value)),
                    ..Default::default()
                };
            }
            Some(Reply::Value(_)) => {
                // A value in response to FIND_NODE carries no contacts.
            }
            Some(Reply::Nodes(contacts)) => {
                for contact in contacts {
                    if self.found.contains_key(&contact.id) {
                        continue;
                    }

                    self.found.insert(contact.id, contact);
                    if contact.id != self.local_id {
                        discovered.push(contact);
                    }
                }
            }
            None => {}
        }

        let mut step = self.schedule();
        step.discovered = discovered;

        step
    }

    /// Queries the closest unqueried contacts until `alpha` queries are in flight, finishing the
    /// lookup if there is nothing left to wait for.
    fn schedule(&mut self) -> Step {
        let mut step = Step::default();

        if self.finished {
            return step;
        }

        let window = self.closest();

        for contact in &window {
            if self.kind == LookupKind::Node && contact.id == self.target {
                self.finished = true;
                step.queries.clear();
                step.outcome = Some(Outcome::Nodes(vec![*contact]));

                return step;
            }

            if self.outstanding >= self.alpha {
                break;
            }

            if !self.queried.contains(&contact.id) && contact.id != self.local_id {
                self.queried.insert(contact.id);
                self.outstanding += 1;
                step.queries.push(*contact);
            }
        }

        if self.outstanding == 0 {
            step.outcome = Some(self.finish());
        }

        step
    }

    /// Finishes the lookup with whatever it has found so far.
    pub(crate) fn finish(&mut self) -> Outcome {
        self.finished = true;

        match self.kind {
            LookupKind::Node => Outcome::Nodes(self.closest()),
            LookupKind::Value => Outcome::NotFound,
        }
    }

    // The K closest contacts found so far.
    fn closest(&self) -> Vec<Contact> {
        let mut contacts: Vec<_> = self.found.values().copied().collect();
        contacts.sort_unstable_by_key(|contact| contact.id.distance(&self.target));
        contacts.truncate(self.k);

        contacts
    }
}
