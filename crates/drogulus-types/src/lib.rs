//! # drogulus-types
//!
//! Shared data model for the drogulus DHT: the 512-bit identifier space,
//! peer records, signed items, and the wire envelope.

pub mod identifier;
pub mod item;
pub mod message;
pub mod peer;

pub use identifier::{Identifier, IdentifierParseError};
pub use item::SignedItem;
pub use message::{Envelope, ItemFields, MessageBody, NodeEntry, ValidationError};
pub use peer::PeerRecord;
