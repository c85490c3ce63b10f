//! RSA signing and verification over [`root_hash`](crate::hash::root_hash)
//! digests.
//!
//! Two related but distinct operations live here:
//!
//! - **Item signatures** prove a stored value's provenance: the publisher
//!   signs the root hash of the signed item (minus envelope-only fields).
//! - **Envelope seals** prove a message's sender: the sender signs the root
//!   hash of the whole envelope minus the `seal` and `message` fields.
//!
//! Both use PKCS#1 v1.5 RSA signatures over a SHA-512 digest, matching the
//! reference implementation's `rsa.sign(..., 'SHA-512')`.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};

use crate::hash::root_hash_hex;
use crate::{CryptoError, Result};

/// Fields stripped from a signed item before computing the signature's
/// root hash. The signature itself is also excluded when verifying.
pub const ITEM_ENVELOPE_FIELDS: &[&str] = &[
    "uuid",
    "recipient",
    "sender",
    "reply_port",
    "version",
    "seal",
    "message",
];

/// Fields stripped from a full envelope before computing a seal.
pub const SEAL_EXCLUDED_FIELDS: &[&str] = &["seal", "message"];

fn without_fields(item: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut pruned = item.clone();
    for field in fields {
        pruned.remove(*field);
    }
    pruned
}

fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_pem(pem.trim()).map_err(|_| CryptoError::MalformedKey)
}

fn load_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_pem(pem.trim()).map_err(|_| CryptoError::MalformedKey)
}

fn sign_hex_digest(hex_digest: &str, private_key: &RsaPrivateKey) -> Result<String> {
    let digest = Sha512::digest(hex_digest.as_bytes());
    let signature = private_key
        .sign(Pkcs1v15Sign::new::<Sha512>(), &digest)
        .map_err(|_| CryptoError::SigningFailed)?;
    Ok(hex::encode(signature))
}

fn verify_hex_digest(hex_digest: &str, signature_hex: &str, public_key: &RsaPublicKey) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let digest = Sha512::digest(hex_digest.as_bytes());
    public_key
        .verify(Pkcs1v15Sign::new::<Sha512>(), &digest, &signature)
        .is_ok()
}

/// Sign a signed item's root hash with the publisher's private key.
///
/// `item` should already contain every field *except* `signature`
/// (`public_key`, `name`, `value`, `timestamp`, `expires`, `created_with`,
/// `key`). Returns the hex-encoded signature to store in the `signature`
/// field.
pub fn sign_item(item: &Map<String, Value>, private_key_pem: &str) -> Result<String> {
    let key = load_private_key(private_key_pem)?;
    let pruned = without_fields(item, ITEM_ENVELOPE_FIELDS);
    let digest_hex = root_hash_hex(&Value::Object(pruned));
    sign_hex_digest(&digest_hex, &key)
}

/// Verify a signed item's `signature` field against its `public_key` field.
///
/// Returns `false` on any malformed input (missing fields, bad hex, bad PEM,
/// bad signature) rather than propagating an error — this mirrors the
/// reference implementation's blanket `except: return False`.
pub fn verify_item(item: &Map<String, Value>) -> bool {
    let Some(Value::String(public_key_pem)) = item.get("public_key") else {
        return false;
    };
    let Some(Value::String(signature_hex)) = item.get("signature") else {
        return false;
    };
    let Ok(public_key) = load_public_key(public_key_pem) else {
        return false;
    };

    let mut pruned = without_fields(item, ITEM_ENVELOPE_FIELDS);
    pruned.remove("signature");
    let digest_hex = root_hash_hex(&Value::Object(pruned));
    verify_hex_digest(&digest_hex, signature_hex, &public_key)
}

/// Seal an outgoing envelope, proving it was sent by the holder of
/// `private_key_pem`. `envelope` should contain every envelope field
/// except `seal`.
pub fn seal_envelope(envelope: &Map<String, Value>, private_key_pem: &str) -> Result<String> {
    let key = load_private_key(private_key_pem)?;
    let pruned = without_fields(envelope, SEAL_EXCLUDED_FIELDS);
    let digest_hex = root_hash_hex(&Value::Object(pruned));
    sign_hex_digest(&digest_hex, &key)
}

/// Check an incoming envelope's `seal` field against its `sender` field
/// (the sender's PEM-encoded RSA public key).
///
/// Returns `false` on any malformed input, never propagating an error.
pub fn check_seal(envelope: &Map<String, Value>) -> bool {
    let Some(Value::String(seal_hex)) = envelope.get("seal") else {
        return false;
    };
    let Some(Value::String(sender_pem)) = envelope.get("sender") else {
        return false;
    };
    let Ok(public_key) = load_public_key(sender_pem) else {
        return false;
    };

    let pruned = without_fields(envelope, SEAL_EXCLUDED_FIELDS);
    let digest_hex = root_hash_hex(&Value::Object(pruned));
    verify_hex_digest(&digest_hex, seal_hex, &public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use serde_json::json;

    fn test_keypair() -> (String, String) {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate key");
        let public_key = RsaPublicKey::from(&private_key);
        let private_pem = private_key
            .to_pkcs1_pem(rsa::pkcs8::LineEnding::LF)
            .expect("encode private pem")
            .to_string();
        let public_pem = rsa::pkcs1::EncodeRsaPublicKey::to_pkcs1_pem(
            &public_key,
            rsa::pkcs8::LineEnding::LF,
        )
        .expect("encode public pem");
        (private_pem, public_pem)
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (private_pem, public_pem) = test_keypair();
        let mut item = Map::new();
        item.insert("name".into(), json!("n"));
        item.insert("value".into(), json!("v"));
        item.insert("public_key".into(), json!(public_pem));
        item.insert("timestamp".into(), json!(1.0));
        item.insert("expires".into(), json!(0.0));
        item.insert("created_with".into(), json!("0.1"));
        item.insert(
            "key".into(),
            json!(crate::hash::derive_key(&public_pem, "n")),
        );

        let signature = sign_item(&item, &private_pem).expect("sign");
        item.insert("signature".into(), json!(signature));

        assert!(verify_item(&item));
    }

    #[test]
    fn tampering_with_a_signed_field_flips_verification_to_false() {
        let (private_pem, public_pem) = test_keypair();
        let mut item = Map::new();
        item.insert("name".into(), json!("n"));
        item.insert("value".into(), json!("v"));
        item.insert("public_key".into(), json!(public_pem));
        item.insert("timestamp".into(), json!(1.0));
        item.insert("expires".into(), json!(0.0));
        item.insert("created_with".into(), json!("0.1"));
        item.insert(
            "key".into(),
            json!(crate::hash::derive_key(&public_pem, "n")),
        );

        let signature = sign_item(&item, &private_pem).expect("sign");
        item.insert("signature".into(), json!(signature));
        item.insert("value".into(), json!("v2"));

        assert!(!verify_item(&item));
    }

    #[test]
    fn verify_item_rejects_missing_fields_without_panicking() {
        let item = Map::new();
        assert!(!verify_item(&item));
    }

    #[test]
    fn check_seal_round_trips() {
        let (private_pem, public_pem) = test_keypair();
        let mut envelope = Map::new();
        envelope.insert("uuid".into(), json!("abc"));
        envelope.insert("sender".into(), json!(public_pem));
        envelope.insert("recipient".into(), json!("def"));
        envelope.insert("reply_port".into(), json!(4000));
        envelope.insert("version".into(), json!("0.1"));
        envelope.insert("message".into(), json!("ping"));

        let seal = seal_envelope(&envelope, &private_pem).expect("seal");
        envelope.insert("seal".into(), json!(seal));

        assert!(check_seal(&envelope));
    }

    #[test]
    fn check_seal_rejects_tampered_envelope() {
        let (private_pem, public_pem) = test_keypair();
        let mut envelope = Map::new();
        envelope.insert("uuid".into(), json!("abc"));
        envelope.insert("sender".into(), json!(public_pem));
        envelope.insert("recipient".into(), json!("def"));
        envelope.insert("reply_port".into(), json!(4000));
        envelope.insert("version".into(), json!("0.1"));
        envelope.insert("message".into(), json!("ping"));

        let seal = seal_envelope(&envelope, &private_pem).expect("seal");
        envelope.insert("seal".into(), json!(seal));
        envelope.insert("recipient".into(), json!("tampered"));

        assert!(!check_seal(&envelope));
    }

    #[test]
    fn check_seal_rejects_malformed_public_key() {
        let mut envelope = Map::new();
        envelope.insert("sender".into(), json!("not a pem key"));
        envelope.insert("seal".into(), json!("deadbeef"));
        assert!(!check_seal(&envelope));
    }
}
