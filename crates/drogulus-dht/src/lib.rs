//! # drogulus-dht
//!
//! A Kademlia-style distributed hash table over a 512-bit identifier
//! space, with self-authenticating (RSA-signed) stored values.
//!
//! ## Modules
//!
//! - [`range`] — arithmetic over `[0, 2^512]`, used to represent bucket
//!   boundaries.
//! - [`bucket`] — a single k-bucket.
//! - [`routing_table`] — buckets tiling the ID space, replacement caches,
//!   blacklist.
//! - [`store`] — the in-memory `key -> signed item` data store.
//! - [`lookup`] — the iterative FIND_NODE/FIND_VALUE lookup engine.
//! - [`node`] — the orchestrator tying routing, storage, transport, and
//!   lookups together.
//! - [`config`] — tunable constants as a serde-loadable config struct.

pub mod bucket;
pub mod config;
pub mod lookup;
pub mod node;
pub mod range;
pub mod routing_table;
pub mod store;

/// Kademlia bucket size: maximum contacts per bucket (and per replacement
/// cache, and per `find_close_nodes`/`nodes` reply).
pub const K: usize = 20;

/// Lookup parallelism: maximum in-flight requests per lookup round.
pub const ALPHA: usize = 3;

/// A bucket is due for a refresh once it has gone this long unaccessed.
pub const REFRESH_TIMEOUT_SECS: u64 = 3600;

/// How often the node's periodic refresh timer fires (`REFRESH_TIMEOUT /
/// 6`).
pub const REFRESH_INTERVAL_SECS: u64 = REFRESH_TIMEOUT_SECS / 6;

/// How long after a successful `Store` the republish timer re-checks a key.
pub const REPLICATE_INTERVAL_SECS: u64 = 3600;

/// Per-RPC transport-level timeout.
pub const RPC_TIMEOUT_SECS: u64 = 5;

/// How long a sent request waits for a reply before the pending promise
/// resolves as timed-out and the peer is punished.
pub const RESPONSE_TIMEOUT_SECS: u64 = 1800;

/// Overall deadline for a single lookup.
pub const LOOKUP_TIMEOUT_SECS: u64 = 600;

/// RPC failures a peer may accrue before forced eviction.
pub const ALLOWED_RPC_FAILS: u32 = 5;

/// Error taxonomy for DHT operations. Variant names follow the kind names
/// in the error handling design rather than free-form messages, so callers
/// can match on them.
#[derive(Debug, thiserror::Error)]
pub enum DhtError {
    /// No room in the bucket and it cannot split; caller should fall back
    /// to the replacement cache. Not surfaced to API callers.
    #[error("bucket full")]
    BucketFull,

    /// No entry for the requested id/key.
    #[error("not found")]
    NotFound,

    /// An id falls outside every bucket's range (should not happen: the
    /// routing table always tiles the full space).
    #[error("invalid key")]
    InvalidKey,

    /// Envelope malformed or its seal failed to verify.
    #[error("bad message: {0}")]
    BadMessage(String),

    /// A stored item's signature did not verify against its claimed
    /// `public_key`.
    #[error("unverifiable provenance")]
    UnverifiableProvenance,

    /// An item's `expires` deadline has already passed.
    #[error("expired")]
    Expired,

    /// An incoming `Store` is older than the locally held copy.
    #[error("out of date")]
    OutOfDate,

    /// A lookup was seeded with no peers at all.
    #[error("routing table empty")]
    RoutingTableEmpty,

    /// A FIND_VALUE lookup exhausted its shortlist without a hit.
    #[error("value not found")]
    ValueNotFound,

    /// A lookup or request deadline elapsed.
    #[error("timed out")]
    TimedOut,

    /// A lookup was cancelled before it resolved.
    #[error("cancelled")]
    Cancelled,

    /// The transport could not deliver a message.
    #[error("transport error: {0}")]
    Transport(#[from] drogulus_transport::TransportError),

    /// A cryptographic operation failed (key loading, signing).
    #[error("crypto error: {0}")]
    Crypto(#[from] drogulus_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, DhtError>;
