//! Peer records: immutable identity plus routing-owned mutable counters.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::identifier::Identifier;

/// A known peer in the network.
///
/// `public_key`, `network_id`, `version`, and `uri` are set at construction
/// and never change. `last_seen` and `failed_rpcs` are mutated exclusively
/// by the routing table as contacts are touched or fail RPCs.
///
/// Equality, ordering in sets, and hashing all key off `network_id` alone —
/// two records with the same `network_id` are the same peer for routing
/// purposes even if other fields have drifted (e.g. a stale `uri`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub public_key: String,
    pub network_id: Identifier,
    pub version: String,
    pub uri: String,
    pub last_seen: f64,
    pub failed_rpcs: u32,
}

impl PeerRecord {
    /// Build a peer record from a public key, deriving `network_id` as
    /// `SHA512(public_key)`.
    pub fn new(public_key: impl Into<String>, version: impl Into<String>, uri: impl Into<String>) -> Self {
        let public_key = public_key.into();
        let network_id = Identifier::from_sha512(public_key.as_bytes());
        PeerRecord {
            public_key,
            network_id,
            version: version.into(),
            uri: uri.into(),
            last_seen: 0.0,
            failed_rpcs: 0,
        }
    }
}

impl PartialEq for PeerRecord {
    fn eq(&self, other: &Self) -> bool {
        self.network_id == other.network_id
    }
}

impl Eq for PeerRecord {}

impl Hash for PeerRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.network_id.hash(state);
    }
}

impl PartialEq<Identifier> for PeerRecord {
    fn eq(&self, other: &Identifier) -> bool {
        &self.network_id == other
    }
}
