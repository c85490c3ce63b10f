//! The Kademlia routing table: buckets tiling the full identifier space,
//! a per-bucket replacement cache, and a blacklist.

use std::collections::HashSet;

use drogulus_types::{Identifier, PeerRecord};

use crate::bucket::Bucket;
use crate::range::{random_in_range, Bound};
use crate::{DhtError, Result, ALLOWED_RPC_FAILS, K, REFRESH_TIMEOUT_SECS};

pub struct RoutingTable {
    own_id: Identifier,
    buckets: Vec<Bucket>,
    replacement_caches: Vec<Vec<PeerRecord>>,
    blacklist: HashSet<Identifier>,
}

impl RoutingTable {
    pub fn new(own_id: Identifier) -> Self {
        RoutingTable {
            own_id,
            buckets: vec![Bucket::new(Bound::ZERO, Bound::max_exclusive())],
            replacement_caches: vec![Vec::new()],
            blacklist: HashSet::new(),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn is_blacklisted(&self, id: &Identifier) -> bool {
        self.blacklist.contains(id)
    }

    pub fn blacklisted(&self) -> impl Iterator<Item = &Identifier> {
        self.blacklist.iter()
    }

    /// Locate the unique bucket whose range contains `id`.
    pub fn bucket_for(&self, id: &Identifier) -> Result<usize> {
        let target = Bound::from_identifier(id);
        let idx = self.buckets.partition_point(|b| b.range_min <= target);
        if idx == 0 {
            return Err(DhtError::InvalidKey);
        }
        let idx = idx - 1;
        if self.buckets[idx].key_in_range(id) {
            Ok(idx)
        } else {
            Err(DhtError::InvalidKey)
        }
    }

    /// Admit `peer` into the table, splitting buckets or falling back to
    /// the replacement cache as needed. A no-op for our own id or a
    /// blacklisted one.
    pub fn add_contact(&mut self, mut peer: PeerRecord) -> Result<()> {
        if peer.network_id == self.own_id || self.is_blacklisted(&peer.network_id) {
            return Ok(());
        }
        peer.failed_rpcs = 0;

        loop {
            let idx = self.bucket_for(&peer.network_id)?;
            match self.buckets[idx].add(peer.clone()) {
                Ok(()) => return Ok(()),
                Err(DhtError::BucketFull) => {
                    if self.buckets[idx].key_in_range(&self.own_id) {
                        self.split(idx);
                        continue;
                    }
                    self.push_replacement(idx, peer);
                    return Ok(());
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn push_replacement(&mut self, idx: usize, peer: PeerRecord) {
        let cache = &mut self.replacement_caches[idx];
        cache.retain(|p| p.network_id != peer.network_id);
        cache.push(peer);
        if cache.len() > K {
            cache.remove(0);
        }
    }

    /// Split the bucket at `idx` at its midpoint, redistributing its
    /// contacts and replacement cache into the two halves.
    fn split(&mut self, idx: usize) {
        let bucket = self.buckets.remove(idx);
        let old_cache = self.replacement_caches.remove(idx);
        let mid = Bound::midpoint(bucket.range_min, bucket.range_max);

        let mut lower = Bucket::new(bucket.range_min, mid);
        let mut upper = Bucket::new(mid, bucket.range_max);
        for contact in bucket.contacts() {
            if lower.key_in_range(&contact.network_id) {
                let _ = lower.add(contact.clone());
            } else {
                let _ = upper.add(contact.clone());
            }
        }

        let mut lower_cache = Vec::new();
        let mut upper_cache = Vec::new();
        for contact in old_cache {
            if lower.key_in_range(&contact.network_id) {
                if lower.is_full() {
                    lower_cache.push(contact);
                } else {
                    let _ = lower.add(contact);
                }
            } else if upper.is_full() {
                upper_cache.push(contact);
            } else {
                let _ = upper.add(contact);
            }
        }
        truncate_most_recent(&mut lower_cache);
        truncate_most_recent(&mut upper_cache);

        self.buckets.insert(idx, lower);
        self.buckets.insert(idx + 1, upper);
        self.replacement_caches.insert(idx, lower_cache);
        self.replacement_caches.insert(idx + 1, upper_cache);
    }

    /// Up to `K` peers near `key`, drawn outward from `bucket_for(key)`
    /// across neighbouring buckets, sorted by XOR distance ascending.
    pub fn find_close_nodes(&self, key: &Identifier, exclude: Option<&Identifier>) -> Vec<PeerRecord> {
        let start = match self.bucket_for(key) {
            Ok(idx) => idx,
            Err(_) => return Vec::new(),
        };

        let mut collected = self.buckets[start].list(K, exclude);
        let mut lo = start.checked_sub(1);
        let mut hi = if start + 1 < self.buckets.len() { Some(start + 1) } else { None };

        while collected.len() < K && (lo.is_some() || hi.is_some()) {
            if let Some(idx) = lo {
                let remaining = K - collected.len();
                collected.extend(self.buckets[idx].list(remaining, exclude));
                lo = idx.checked_sub(1);
            }
            if collected.len() >= K {
                break;
            }
            if let Some(idx) = hi {
                let remaining = K - collected.len();
                collected.extend(self.buckets[idx].list(remaining, exclude));
                hi = if idx + 1 < self.buckets.len() { Some(idx + 1) } else { None };
            }
        }

        collected.sort_by_key(|peer| key.distance(&peer.network_id));
        collected.truncate(K);
        collected
    }

    /// Record an RPC failure (or a forced removal) against `id`. Removes
    /// the peer once `failed_rpcs` reaches [`ALLOWED_RPC_FAILS`], or
    /// immediately if `forced`. On removal, purges the replacement cache
    /// and promotes its most-recent surviving entry into the bucket.
    pub fn remove_contact(&mut self, id: &Identifier, forced: bool) -> Result<()> {
        let idx = self.bucket_for(id)?;

        let should_remove = if forced {
            true
        } else {
            match self.buckets[idx].get(id) {
                Ok(_) => {
                    self.bump_failed_rpcs(idx, id) >= ALLOWED_RPC_FAILS
                }
                Err(DhtError::NotFound) => return Ok(()),
                Err(other) => return Err(other),
            }
        };

        if should_remove {
            let _ = self.buckets[idx].remove(id);
            self.replacement_caches[idx].retain(|p| &p.network_id != id);
            if let Some(promoted) = self.replacement_caches[idx].pop() {
                let _ = self.buckets[idx].add(promoted);
            }
        }
        Ok(())
    }

    fn bump_failed_rpcs(&mut self, idx: usize, id: &Identifier) -> u32 {
        let peers: Vec<PeerRecord> = self.buckets[idx].list(K, None);
        let mut updated = 0u32;
        for mut peer in peers {
            if &peer.network_id == id {
                peer.failed_rpcs += 1;
                updated = peer.failed_rpcs;
                let _ = self.buckets[idx].add(peer);
            }
        }
        updated
    }

    /// Evict `peer`, purge it from the replacement cache, and blacklist
    /// its `network_id` permanently.
    pub fn blacklist(&mut self, peer: &Identifier) -> Result<()> {
        self.remove_contact(peer, true)?;
        self.blacklist.insert(*peer);
        Ok(())
    }

    /// For each bucket at index `>= start`, if `force` or it has not been
    /// touched within [`REFRESH_TIMEOUT_SECS`], sample a random key from
    /// its range.
    pub fn get_refresh_list(&self, start: usize, force: bool, now: f64) -> Vec<Identifier> {
        self.buckets
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, bucket)| force || now - bucket.last_accessed >= REFRESH_TIMEOUT_SECS as f64)
            .map(|(_, bucket)| random_in_range(bucket.range_min, bucket.range_max))
            .collect()
    }

    pub fn touch_bucket(&mut self, key: &Identifier, now: f64) -> Result<()> {
        let idx = self.bucket_for(key)?;
        self.buckets[idx].last_accessed = now;
        Ok(())
    }
}

/// Keep only the most recent `K` entries of a replacement cache, dropping
/// the oldest when it overflows.
fn truncate_most_recent(cache: &mut Vec<PeerRecord>) {
    if cache.len() > K {
        let overflow = cache.len() - K;
        cache.drain(0..overflow);
    }
}
