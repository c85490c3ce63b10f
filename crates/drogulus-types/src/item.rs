//! The signed item: the on-the-wire payload of a stored value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifier::Identifier;

/// A self-authenticating value stored in the DHT.
///
/// `value` is kept as a dynamic `serde_json::Value` rather than a typed
/// field because publishers may store arbitrary JSON-serializable trees —
/// the one place this data model is intentionally dynamically typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedItem {
    pub name: String,
    pub value: Value,
    pub public_key: String,
    pub timestamp: f64,
    pub expires: f64,
    pub created_with: String,
    pub key: Identifier,
    pub signature: String,
}

impl SignedItem {
    /// `true` if this item never expires (`expires == 0.0`).
    pub fn never_expires(&self) -> bool {
        self.expires == 0.0
    }

    /// `true` if this item's `expires` deadline has passed relative to
    /// `now` (seconds since epoch). Always `false` for non-expiring items.
    pub fn is_expired(&self, now: f64) -> bool {
        !self.never_expires() && self.expires < now
    }

    /// The fields that feed `root_hash` for signing/verification: every
    /// field except `signature` itself, as a JSON object.
    pub fn signable_fields(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("value".into(), self.value.clone());
        map.insert("public_key".into(), Value::String(self.public_key.clone()));
        map.insert("timestamp".into(), json_number(self.timestamp));
        map.insert("expires".into(), json_number(self.expires));
        map.insert(
            "created_with".into(),
            Value::String(self.created_with.clone()),
        );
        map.insert("key".into(), Value::String(self.key.to_hex()));
        map
    }
}

fn json_number(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
