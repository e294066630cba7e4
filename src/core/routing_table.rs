//! Core routing table implementation.

use std::ops::RangeInclusive;

use time::OffsetDateTime;

use crate::core::{
    id::Id,
    peer::{Contact, Peer},
};

/// The result of offering a peer to the routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The peer was new and its bucket had room.
    Inserted,
    /// The peer was already present, its address and last seen timestamp were updated.
    Refreshed,
    /// The peer was already present and was left as is, it was only heard of second-hand.
    Known,
    /// The bucket is full. The oldest entry is returned as a candidate for eviction, it has
    /// *not* been removed.
    BucketFull { oldest: Peer },
    /// The peer is the local node, which is never stored.
    SelfEntry,
}

impl Insertion {
    /// Returns the eviction candidate, if the bucket was full.
    pub fn eviction_candidate(&self) -> Option<&Peer> {
        match self {
            Insertion::BucketFull { oldest } => Some(oldest),
            _ => None,
        }
    }
}

/// A fixed slice of the identifier space holding up to K peers.
#[derive(Debug, Clone)]
pub struct Bucket {
    range: RangeInclusive<Id>,
    // Ordered by insertion, refreshed peers move to the back.
    peers: Vec<Peer>,
    last_accessed: OffsetDateTime,
}

impl Bucket {
    fn new(range: RangeInclusive<Id>, now: OffsetDateTime) -> Self {
        Self {
            range,
            peers: Vec::new(),
            last_accessed: now,
        }
    }

    /// The identifiers covered by this bucket.
    pub fn range(&self) -> &RangeInclusive<Id> {
        &self.range
    }

    pub fn last_accessed(&self) -> OffsetDateTime {
        self.last_accessed
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn position(&self, id: &Id) -> Option<usize> {
        self.peers.iter().position(|peer| peer.id() == *id)
    }

    fn oldest(&self) -> Option<&Peer> {
        self.peers.iter().min_by_key(|peer| peer.last_seen)
    }

    fn touch(&mut self) {
        self.last_accessed = OffsetDateTime::now_utc();
    }
}

/// The core routing table data structure.
///
/// The identifier space is split into one bucket per possible log2 distance to the local
/// identifier; bucket 0 also covers the local identifier itself. The partition is fixed at
/// construction, buckets never split.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    // The node's local identifier.
    local_id: Id,
    // The maximum number of peers in a bucket and the number of peers returned by `find_closest`.
    k: usize,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Creates an empty routing table.
    pub fn new(local_id: Id, k: usize) -> Self {
        let now = OffsetDateTime::now_utc();
        let buckets = (0..Id::BITS as u32)
            .map(|i| Bucket::new(local_id.bucket_range(i), now))
            .collect();

        Self {
            local_id,
            k: k.max(1),
            buckets,
        }
    }

    /// Returns this table's local identifier.
    pub fn local_id(&self) -> Id {
        self.local_id
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Returns the number of peers in the table.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }

    /// Iterates over the buckets, from the closest to the furthest.
    pub fn buckets(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    /// Returns the peer record for the identifier, if present.
    pub fn peer(&self, id: &Id) -> Option<&Peer> {
        let bucket = &self.buckets[self.bucket_index(id)];
        bucket.position(id).map(|i| &bucket.peers[i])
    }

    fn bucket_index(&self, id: &Id) -> usize {
        // The local identifier falls into bucket 0 along with its neighbour.
        self.local_id.log2_distance(id).unwrap_or(0) as usize
    }

    /// Offers a peer we've just exchanged messages with to the table.
    ///
    /// A known peer has its address and last seen timestamp updated. A new peer is stored if its
    /// bucket has room, otherwise the bucket's oldest peer is returned so the caller can decide
    /// whether it should be replaced.
    pub fn insert(&mut self, peer: Peer) -> Insertion {
        self.offer(peer, true)
    }

    /// Offers a peer another node told us about.
    ///
    /// Unlike [`insert`](Self::insert), a known peer is left untouched: its address and last seen
    /// timestamp only change after a direct exchange.
    pub fn insert_discovered(&mut self, peer: Peer) -> Insertion {
        self.offer(peer, false)
    }

    fn offer(&mut self, peer: Peer, confirmed: bool) -> Insertion {
        if peer.id() == self.local_id {
            return Insertion::SelfEntry;
        }

        let k = self.k;
        let i = self.bucket_index(&peer.id());
        let bucket = &mut self.buckets[i];
        debug_assert!(bucket.range.contains(&peer.id()));

        if let Some(pos) = bucket.position(&peer.id()) {
            if !confirmed {
                return Insertion::Known;
            }

            // Keep the most recently confirmed address.
            bucket.peers.remove(pos);
            bucket.peers.push(peer);
            bucket.touch();

            return Insertion::Refreshed;
        }

        // `k` is at least 1, so a full bucket always has an oldest peer.
        match bucket.oldest() {
            Some(oldest) if bucket.len() >= k => Insertion::BucketFull { oldest: *oldest },
            _ => {
                bucket.peers.push(peer);
                bucket.touch();

                Insertion::Inserted
            }
        }
    }

    /// Removes `old` from the table, if it is still present, and stores `new` in its place
    /// regardless of how full the bucket is.
    pub fn replace_stale(&mut self, old: &Id, new: Peer) {
        if new.id() == self.local_id {
            return;
        }

        let old_i = self.bucket_index(old);
        if let Some(pos) = self.buckets[old_i].position(old) {
            self.buckets[old_i].peers.remove(pos);
        }

        let k = self.k;
        let i = self.bucket_index(&new.id());
        let bucket = &mut self.buckets[i];

        if let Some(pos) = bucket.position(&new.id()) {
            bucket.peers.remove(pos);
        } else if bucket.len() >= k {
            // Only reachable when `old` lived in a different bucket, the replacement can't take
            // a slot that wasn't freed.
            return;
        }

        bucket.peers.push(new);
        bucket.touch();
    }

    /// Returns up to K contacts across the whole table, closest to the identifier first.
    pub fn find_closest(&self, id: &Id) -> Vec<Contact> {
        let mut contacts: Vec<_> = self
            .buckets
            .iter()
            .flat_map(|bucket| bucket.peers.iter().map(Peer::contact))
            .collect();
        // Distinct identifiers never tie, an unstable sort is fine.
        contacts.sort_unstable_by_key(|contact| contact.id.distance(id));
        contacts.truncate(self.k);

        contacts
    }
}
