//! A single k-bucket: a bounded, ordered list of peers within one range of
//! the identifier space.

use drogulus_types::{Identifier, PeerRecord};

use crate::range::Bound;
use crate::{DhtError, Result, K};

/// One bucket of the routing table, covering `[range_min, range_max)`.
///
/// Contacts are kept least-recently-seen first, most-recently-seen last —
/// `add` on an already-present peer moves it to the tail.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub range_min: Bound,
    pub range_max: Bound,
    contacts: Vec<PeerRecord>,
    pub last_accessed: f64,
}

impl Bucket {
    pub fn new(range_min: Bound, range_max: Bound) -> Self {
        Bucket {
            range_min,
            range_max,
            contacts: Vec::new(),
            last_accessed: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.len() >= K
    }

    pub fn contacts(&self) -> &[PeerRecord] {
        &self.contacts
    }

    /// `range_min <= int(id) < range_max`.
    pub fn key_in_range(&self, id: &Identifier) -> bool {
        Bound::contains(self.range_min, self.range_max, id)
    }

    /// Insert or refresh `peer`.
    ///
    /// If already present, moves it to the tail (most-recently-seen). If
    /// absent and the bucket has room, appends it. If absent and full,
    /// fails with [`DhtError::BucketFull`] — the caller decides whether to
    /// split or fall back to the replacement cache.
    pub fn add(&mut self, peer: PeerRecord) -> Result<()> {
        if let Some(pos) = self.position(&peer.network_id) {
            self.contacts.remove(pos);
            self.contacts.push(peer);
            return Ok(());
        }
        if self.is_full() {
            return Err(DhtError::BucketFull);
        }
        self.contacts.push(peer);
        Ok(())
    }

    pub fn get(&self, network_id: &Identifier) -> Result<&PeerRecord> {
        self.position(network_id)
            .map(|pos| &self.contacts[pos])
            .ok_or(DhtError::NotFound)
    }

    /// Up to `n` entries, optionally excluding one peer.
    ///
    /// Entries are returned in the bucket's own (insertion/recency) order;
    /// callers that need distance ordering re-sort themselves, per the
    /// contract `routing_table::find_close_nodes` relies on.
    pub fn list(&self, n: usize, exclude: Option<&Identifier>) -> Vec<PeerRecord> {
        self.contacts
            .iter()
            .filter(|peer| exclude != Some(&peer.network_id))
            .take(n)
            .cloned()
            .collect()
    }

    pub fn remove(&mut self, network_id: &Identifier) -> Result<PeerRecord> {
        let pos = self.position(network_id).ok_or(DhtError::NotFound)?;
        Ok(self.contacts.remove(pos))
    }

    fn position(&self, network_id: &Identifier) -> Option<usize> {
        self.contacts.iter().position(|p| &p.network_id == network_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_range_bucket() -> Bucket {
        Bucket::new(Bound::ZERO, Bound::max_exclusive())
    }

    fn peer(tag: &str) -> PeerRecord {
        PeerRecord::new(tag, "0.1", format!("mem://{tag}"))
    }

    #[test]
    fn add_appends_until_full_then_fails() {
        let mut bucket = full_range_bucket();
        for i in 0..K {
            bucket.add(peer(&format!("p{i}"))).unwrap();
        }
        assert!(bucket.is_full());
        assert!(matches!(bucket.add(peer("overflow")), Err(DhtError::BucketFull)));
    }

    #[test]
    fn add_on_existing_peer_moves_to_tail() {
        let mut bucket = full_range_bucket();
        let a = peer("a");
        let b = peer("b");
        bucket.add(a.clone()).unwrap();
        bucket.add(b.clone()).unwrap();
        bucket.add(a.clone()).unwrap();
        let ids: Vec<_> = bucket.contacts().iter().map(|p| p.network_id).collect();
        assert_eq!(ids, vec![b.network_id, a.network_id]);
    }

    #[test]
    fn get_and_remove_not_found() {
        let bucket = full_range_bucket();
        let ghost = Identifier::from_sha512(b"ghost");
        assert!(matches!(bucket.get(&ghost), Err(DhtError::NotFound)));
    }

    #[test]
    fn key_in_range_checks_half_open_interval() {
        let bucket = full_range_bucket();
        assert!(bucket.key_in_range(&Identifier::ZERO));
        assert!(bucket.key_in_range(&Identifier::MAX));
    }
}
