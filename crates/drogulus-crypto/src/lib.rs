//! # drogulus-crypto
//!
//! Cryptographic primitives for the drogulus DHT: canonical content
//! hashing, key derivation, and RSA-based item/envelope signing.
//!
//! No algorithm negotiation is permitted — the cryptographic suite is
//! fixed to SHA-512 content hashing and PKCS#1 v1.5 RSA signatures, matching
//! the reference implementation this protocol is distilled from.
//!
//! ## Modules
//!
//! - [`hash`] — canonical `root_hash` content hashing and `derive_key`
//! - [`sign`] — RSA item signatures and envelope seals

pub mod hash;
pub mod sign;

/// Error types for cryptographic operations.
///
/// Verification (`sign::verify_item`, `sign::check_seal`) never returns
/// this type — a verification failure is indistinguishable from malformed
/// input and both simply yield `false`. This enum only covers the
/// key-loading and signing side, where a caller needs to know *why* an
/// operation could not be performed.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A PEM-encoded key could not be parsed as PKCS#1 RSA.
    #[error("malformed RSA key")]
    MalformedKey,

    /// The RSA signing operation itself failed (e.g. message too long for
    /// the key's modulus).
    #[error("signing operation failed")]
    SigningFailed,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
