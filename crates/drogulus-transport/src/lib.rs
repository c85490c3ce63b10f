//! # drogulus-transport
//!
//! Pluggable network transport for the drogulus DHT.
//!
//! The core node depends only on the abstract [`Transport`]/[`MessageSink`]
//! traits in [`transport`]; everything else here is a concrete
//! implementation of them:
//!
//! - [`memory`] — an in-process `tokio::sync::mpsc` transport for tests and
//!   single-process simulations.
//! - [`netstring`] (feature `netstring`) — length-prefixed TCP framing.
//! - [`http`] (feature `http`) — `POST /` + `GET /{key}` over axum.

pub mod memory;
pub mod transport;

#[cfg(feature = "netstring")]
pub mod netstring;

#[cfg(feature = "http")]
pub mod http;

pub use memory::{ChannelRegistry, ChannelTransport};
pub use transport::{MessageSink, Transport};

/// Error types for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No route to the given peer URI (e.g. nothing registered/listening).
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Could not establish a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(String),

    /// The peer or message violated the wire protocol (bad framing, bad
    /// URI, oversized payload).
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Failed to encode an outgoing envelope.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error that should not occur in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
