//! 512-bit identifiers and XOR distance.

use std::fmt;
use std::str::FromStr;

/// The width, in bytes, of the identifier space (512 bits).
pub const IDENTIFIER_BYTES: usize = 64;

/// A 512-bit value in the Kademlia ID space, stored big-endian.
///
/// Printed and parsed as a 128-character lowercase hex string. Ordering is
/// unsigned big-endian integer order, matching the "integer view of the ID
/// space" the routing table reasons about for bucket ranges.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier([u8; IDENTIFIER_BYTES]);

/// Failure parsing an [`Identifier`] from text.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierParseError {
    #[error("identifier must be exactly {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("identifier contains non-hex characters")]
    InvalidHex,
}

impl Identifier {
    /// The zero identifier, `0x00...00`.
    pub const ZERO: Identifier = Identifier([0u8; IDENTIFIER_BYTES]);

    /// The maximum identifier, `0xff...ff`.
    pub const MAX: Identifier = Identifier([0xffu8; IDENTIFIER_BYTES]);

    pub fn from_bytes(bytes: [u8; IDENTIFIER_BYTES]) -> Self {
        Identifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_BYTES] {
        &self.0
    }

    /// SHA-512 of `data`, as an identifier.
    pub fn from_sha512(data: &[u8]) -> Self {
        use sha2::{Digest, Sha512};
        let digest: [u8; IDENTIFIER_BYTES] = Sha512::digest(data).into();
        Identifier(digest)
    }

    /// Bitwise XOR distance to `other`. Smaller is closer.
    pub fn distance(&self, other: &Identifier) -> Identifier {
        let mut out = [0u8; IDENTIFIER_BYTES];
        for i in 0..IDENTIFIER_BYTES {
            out[i] = self.0[i] ^ other.0[i];
        }
        Identifier(out)
    }

    /// Big-endian unsigned 512-bit integer value, as a hex string with no
    /// leading `0x`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_hex())
    }
}

impl FromStr for Identifier {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != IDENTIFIER_BYTES * 2 {
            return Err(IdentifierParseError::WrongLength {
                expected: IDENTIFIER_BYTES * 2,
                actual: s.len(),
            });
        }
        let decoded = hex::decode(s).map_err(|_| IdentifierParseError::InvalidHex)?;
        let mut bytes = [0u8; IDENTIFIER_BYTES];
        bytes.copy_from_slice(&decoded);
        Ok(Identifier(bytes))
    }
}

impl serde::Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Identifier::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let id = Identifier::from_sha512(b"PUB");
        let text = id.to_hex();
        assert_eq!(text.len(), 128);
        let parsed: Identifier = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distance_is_symmetric_and_zero_for_self() {
        let a = Identifier::from_sha512(b"a");
        let b = Identifier::from_sha512(b"b");
        assert_eq!(a.distance(&a), Identifier::ZERO);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn ordering_is_unsigned_big_endian() {
        let low = Identifier::from_bytes([0u8; IDENTIFIER_BYTES]);
        let mut high_bytes = [0u8; IDENTIFIER_BYTES];
        high_bytes[0] = 1;
        let high = Identifier::from_bytes(high_bytes);
        assert!(low < high);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            "abc".parse::<Identifier>(),
            Err(IdentifierParseError::WrongLength { .. })
        ));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "g".repeat(128);
        assert!(matches!(
            bad.parse::<Identifier>(),
            Err(IdentifierParseError::InvalidHex)
        ));
    }
}
