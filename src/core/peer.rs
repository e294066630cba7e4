//! Peer record types.

use std::net::{IpAddr, SocketAddr};

#[cfg(feature = "codec")]
use bincode::{Decode, Encode};
use time::OffsetDateTime;

use crate::core::id::Id;

/// The self-description attached to every request and response: the sender's identifier and
/// the port it listens on. The address is never sent, it is observed on the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct NodeInfo {
    pub id: Id,
    pub port: u16,
}

impl NodeInfo {
    pub fn new(id: Id, port: u16) -> Self {
        Self { id, port }
    }

    /// Combines the sender's claimed identifier with the address the message was observed on.
    pub fn contact(&self, source: IpAddr) -> Contact {
        Contact::new(self.id, SocketAddr::new(source, self.port))
    }
}

/// An immutable identifier and address pair, as shared in FIND_NODE responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Contact {
    pub id: Id,
    pub addr: SocketAddr,
}

impl Contact {
    pub fn new(id: Id, addr: SocketAddr) -> Self {
        Self { id, addr }
    }
}

/// A contact owned by the routing table, along with the last time it was heard from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub(crate) contact: Contact,
    pub(crate) last_seen: OffsetDateTime,
}

impl Peer {
    /// Creates a peer that was seen just now.
    pub fn new(id: Id, addr: SocketAddr) -> Self {
        Self::with_last_seen(id, addr, OffsetDateTime::now_utc())
    }

    pub fn with_last_seen(id: Id, addr: SocketAddr, last_seen: OffsetDateTime) -> Self {
        Self {
            contact: Contact::new(id, addr),
            last_seen,
        }
    }

    pub fn id(&self) -> Id {
        self.contact.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.contact.addr
    }

    pub fn contact(&self) -> Contact {
        self.contact
    }

    pub fn last_seen(&self) -> OffsetDateTime {
        self.last_seen
    }

    /// Returns a copy of the peer marked as seen just now.
    pub fn touched(&self) -> Self {
        Self {
            contact: self.contact,
            last_seen: OffsetDateTime::now_utc(),
        }
    }
}

impl From<Contact> for Peer {
    fn from(contact: Contact) -> Self {
        Self::new(contact.id, contact.addr)
    }
}
