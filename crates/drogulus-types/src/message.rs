//! The wire envelope and its eight message kinds.

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// The highest legal `reply_port` value (just below the ephemeral-port
/// floor most operating systems reserve).
pub const MAX_REPLY_PORT: u32 = 49151;

/// One entry in a `nodes` reply: enough to reconstruct a [`crate::peer::PeerRecord`]
/// once the responding transport's sender address is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub public_key: String,
    pub version: String,
    pub uri: String,
}

/// The signed-item fields shared by `store` and `value` messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFields {
    pub name: String,
    pub value: serde_json::Value,
    pub public_key: String,
    pub timestamp: f64,
    pub expires: f64,
    pub created_with: String,
    pub key: Identifier,
    pub signature: String,
}

/// The eight message kinds, tagged on the wire by the `message` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum MessageBody {
    Ping,
    Pong,
    Ok,
    Store(ItemFields),
    FindNode { key: Identifier },
    FindValue { key: Identifier },
    Nodes { nodes: Vec<NodeEntry> },
    Value(ItemFields),
}

impl MessageBody {
    /// The wire discriminator string, e.g. `"findnode"`.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Ping => "ping",
            MessageBody::Pong => "pong",
            MessageBody::Ok => "ok",
            MessageBody::Store(_) => "store",
            MessageBody::FindNode { .. } => "findnode",
            MessageBody::FindValue { .. } => "findvalue",
            MessageBody::Nodes { .. } => "nodes",
            MessageBody::Value(_) => "value",
        }
    }
}

/// The envelope shared by every message: routing metadata plus a tagged
/// payload.
///
/// `#[serde(flatten)]` over [`MessageBody`] means the wire JSON carries a
/// single flat object with a `"message"` discriminator, matching the
/// on-wire schema exactly rather than nesting the payload under a
/// sub-object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub uuid: String,
    pub sender: String,
    pub recipient: String,
    pub reply_port: u32,
    pub version: String,
    pub seal: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// A single bad field found while validating an envelope.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl Envelope {
    /// Validate the fields every envelope must satisfy regardless of kind.
    ///
    /// Per-kind payload shape is already enforced by `MessageBody`'s
    /// deserialization (a malformed `store` with no `name` field simply
    /// fails to parse); this covers constraints serde's type system can't,
    /// namely numeric ranges and non-empty correlation ids.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uuid.is_empty() {
            return Err(ValidationError {
                field: "uuid",
                reason: "must be non-empty",
            });
        }
        if self.sender.is_empty() {
            return Err(ValidationError {
                field: "sender",
                reason: "must be non-empty",
            });
        }
        if self.reply_port > MAX_REPLY_PORT {
            return Err(ValidationError {
                field: "reply_port",
                reason: "must be in [0, 49151]",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_round_trips_with_message_discriminator() {
        let envelope = Envelope {
            uuid: "abc".into(),
            sender: "PUB".into(),
            recipient: "".into(),
            reply_port: 4000,
            version: "0.1".into(),
            seal: "sig".into(),
            body: MessageBody::Ping,
        };
        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(encoded["message"], json!("ping"));

        let decoded: Envelope = serde_json::from_value(encoded).unwrap();
        assert!(matches!(decoded.body, MessageBody::Ping));
    }

    #[test]
    fn findnode_round_trips_with_key() {
        let key = Identifier::from_sha512(b"target");
        let envelope = Envelope {
            uuid: "abc".into(),
            sender: "PUB".into(),
            recipient: "".into(),
            reply_port: 4000,
            version: "0.1".into(),
            seal: "sig".into(),
            body: MessageBody::FindNode { key },
        };
        let encoded = serde_json::to_string(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_str(&encoded).unwrap();
        match decoded.body {
            MessageBody::FindNode { key: decoded_key } => assert_eq!(decoded_key, key),
            other => panic!("expected FindNode, got {other:?}"),
        }
    }

    #[test]
    fn rejects_reply_port_above_ephemeral_floor() {
        let envelope = Envelope {
            uuid: "abc".into(),
            sender: "PUB".into(),
            recipient: "".into(),
            reply_port: 49152,
            version: "0.1".into(),
            seal: "sig".into(),
            body: MessageBody::Ping,
        };
        assert_eq!(
            envelope.validate(),
            Err(ValidationError {
                field: "reply_port",
                reason: "must be in [0, 49151]",
            })
        );
    }

    #[test]
    fn rejects_empty_uuid() {
        let envelope = Envelope {
            uuid: "".into(),
            sender: "PUB".into(),
            recipient: "".into(),
            reply_port: 4000,
            version: "0.1".into(),
            seal: "sig".into(),
            body: MessageBody::Ping,
        };
        assert!(envelope.validate().is_err());
    }
}
