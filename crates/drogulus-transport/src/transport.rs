//! The transport abstraction the DHT core depends on.

use async_trait::async_trait;
use drogulus_types::{Envelope, PeerRecord};

use crate::Result;

/// Outbound delivery of envelopes to peers.
///
/// A transport is connection-agnostic: it may cache connections per peer,
/// reuse them, or dial fresh ones on every call — the node does not care,
/// and must treat any `Err` the same way regardless of cause (as a failed
/// RPC against `contact`).
///
/// `async_trait` is used here (rather than a native `async fn` in the
/// trait) because the node needs to hold this behind `Arc<dyn Transport>`,
/// which requires object safety.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt to deliver `envelope` to `contact`'s URI.
    async fn send(&self, contact: &PeerRecord, envelope: &Envelope) -> Result<()>;
}

/// Inbound dispatch target for a transport.
///
/// Transports call `receive` with the raw decoded envelope and whatever it
/// learned about the sender's network address out-of-band (the envelope
/// itself only carries `sender`'s public key and the requested
/// `reply_port`; the transport knows the IP/host the bytes actually
/// arrived from).
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Handle one decoded, not-yet-validated envelope.
    ///
    /// `sender_addr` is the network-layer address the bytes arrived from
    /// (host, without port) — used to synthesize `uri =
    /// scheme://sender_addr:reply_port` for a newly-seen peer.
    async fn receive(&self, envelope: Envelope, sender_addr: &str);
}
