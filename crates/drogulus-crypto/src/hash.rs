//! Canonical content hashing and key derivation.
//!
//! `root_hash` walks a JSON-shaped tree the same way a Merkle tree walks its
//! leaves: dict keys are hashed in sorted order, the hash of a key is
//! concatenated with the hash of its value and the pair is re-hashed, and
//! lists preserve their element order. Primitives are hashed from their
//! canonical textual form so two implementations in different languages
//! agree on the same bytes for the same tree.

use sha2::{Digest, Sha512};
use serde_json::Value;

/// A SHA-512 digest, as the raw 64 bytes produced by the hash function.
pub type Digest512 = [u8; 64];

/// Compute the content hash ("root hash") of a JSON-shaped value.
///
/// This mirrors `_get_hash` in the reference implementation: a recursive
/// SHA-512 over sorted dict keys, ordered list elements, and canonical
/// textual forms of primitives.
pub fn root_hash(value: &Value) -> Digest512 {
    let seed = canonical_seed(value);
    let mut hasher = Sha512::new();
    hasher.update(seed.as_bytes());
    hasher.finalize().into()
}

/// Compute the content hash and return it as a lowercase hex string.
pub fn root_hash_hex(value: &Value) -> String {
    hex::encode(root_hash(value))
}

/// Build the seed string that gets hashed at one level of the tree.
///
/// For objects and arrays this recurses and hashes the *children* first,
/// then joins their hex digests; for primitives it returns the canonical
/// textual form directly.
fn canonical_seed(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut joined = String::new();
            for key in keys {
                joined.push_str(&hex_hash_of_str(key));
                joined.push_str(&hex_hash_of_value(&map[key]));
            }
            joined
        }
        Value::Array(items) => {
            let mut joined = String::new();
            for item in items {
                joined.push_str(&hex_hash_of_value(item));
            }
            joined
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => canonical_number(n),
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
    }
}

fn hex_hash_of_value(value: &Value) -> String {
    hex::encode(root_hash(value))
}

fn hex_hash_of_str(s: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a JSON number the way Python's `repr`/`str` would.
///
/// Integers (JSON numbers with no fractional part that serde_json can
/// represent exactly) are rendered as plain decimal text. Everything else
/// is treated as a float and rendered with a guaranteed decimal point, so
/// `1.0` round-trips as `"1.0"` rather than Rust's default `"1"`.
fn canonical_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    let f = n.as_f64().unwrap_or(0.0);
    format_float_repr(f)
}

/// Shortest round-trip decimal text for `f`, always containing a decimal
/// point (matching Python's `repr(float)`).
fn format_float_repr(f: f64) -> String {
    let text = format!("{f}");
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

/// Derive the DHT key for a `(public_key, name)` pair.
///
/// If `name` is empty, the key is `SHA512(public_key)`. Otherwise it is
/// `SHA512(SHA512(public_key) || SHA512(name))`, both as hex strings.
pub fn derive_key(public_key: &str, name: &str) -> String {
    let key_hash = Sha512::digest(public_key.as_bytes());
    if name.is_empty() {
        return hex::encode(key_hash);
    }
    let name_hash = Sha512::digest(name.as_bytes());
    let mut compound = Vec::with_capacity(key_hash.len() + name_hash.len());
    compound.extend_from_slice(&key_hash);
    compound.extend_from_slice(&name_hash);
    hex::encode(Sha512::digest(&compound))
}
