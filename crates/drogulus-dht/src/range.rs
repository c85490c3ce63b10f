//! Arithmetic over `[0, 2^512]`, the closed superset of the 512-bit
//! identifier space the routing table's bucket ranges are drawn from.
//!
//! A [`crate::bucket::Bucket`]'s `range_max` may legitimately equal `2^512`
//! (the single root bucket spans `[0, 2^512)` before any split), one past
//! the largest representable [`drogulus_types::Identifier`]. [`Bound`]
//! widens the 64-byte identifier by one leading byte so that value is
//! representable, and implements the handful of big-endian operations
//! (compare, average, increment-free midpoint) the routing table needs.

use drogulus_types::Identifier;

const WIDTH: usize = 65;

/// A value in `[0, 2^512]`, stored as a 65-byte big-endian unsigned
/// integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bound([u8; WIDTH]);

impl Bound {
    /// The lower end of the whole ID space, `0`.
    pub const ZERO: Bound = Bound([0u8; WIDTH]);

    /// One past the largest identifier, `2^512`.
    pub fn max_exclusive() -> Bound {
        let mut bytes = [0u8; WIDTH];
        bytes[0] = 1;
        Bound(bytes)
    }

    pub fn from_identifier(id: &Identifier) -> Bound {
        let mut bytes = [0u8; WIDTH];
        bytes[1..].copy_from_slice(id.as_bytes());
        Bound(bytes)
    }

    /// The identifier equal to this bound, or `None` if this bound is
    /// `2^512` (one past the last identifier, unrepresentable as one).
    pub fn to_identifier(&self) -> Option<Identifier> {
        if self.0[0] != 0 {
            return None;
        }
        let mut id_bytes = [0u8; 64];
        id_bytes.copy_from_slice(&self.0[1..]);
        Some(Identifier::from_bytes(id_bytes))
    }

    /// `true` if `min <= id < max` for this value acting as `min` and the
    /// given `max`.
    pub fn contains(min: Bound, max: Bound, id: &Identifier) -> bool {
        let as_bound = Bound::from_identifier(id);
        min <= as_bound && as_bound < max
    }

    /// The integer midpoint `(min + max) / 2`, rounding down.
    pub fn midpoint(min: Bound, max: Bound) -> Bound {
        let sum = add_with_carry(&min.0, &max.0);
        let shifted = shift_right_one(&sum);
        let mut bytes = [0u8; WIDTH];
        bytes.copy_from_slice(&shifted[1..]);
        Bound(bytes)
    }
}

impl std::fmt::Debug for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bound(0x{})", hex::encode(self.0))
    }
}

/// `a + b`, both `WIDTH` bytes, returned as `WIDTH + 1` bytes so the carry
/// out of the top byte is never lost.
fn add_with_carry(a: &[u8; WIDTH], b: &[u8; WIDTH]) -> [u8; WIDTH + 1] {
    let mut out = [0u8; WIDTH + 1];
    let mut carry = 0u16;
    for i in 0..WIDTH {
        let av = a[WIDTH - 1 - i] as u16;
        let bv = b[WIDTH - 1 - i] as u16;
        let sum = av + bv + carry;
        out[WIDTH - i] = (sum & 0xFF) as u8;
        carry = sum >> 8;
    }
    out[0] = carry as u8;
    out
}

/// Shift a `WIDTH + 1`-byte big-endian integer right by one bit.
fn shift_right_one(a: &[u8; WIDTH + 1]) -> [u8; WIDTH + 1] {
    let mut out = [0u8; WIDTH + 1];
    let mut carry = 0u8;
    for i in 0..WIDTH + 1 {
        let cur = a[i];
        out[i] = (cur >> 1) | (carry << 7);
        carry = cur & 1;
    }
    out
}

/// Sample a uniformly random identifier within `[min, max)`.
///
/// Uses rejection sampling over the minimal byte range covering `max -
/// min`, which is fast in practice since bucket ranges are powers of two
/// (or close to it after splits).
pub fn random_in_range(min: Bound, max: Bound) -> Identifier {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 64];
        rng.fill_bytes(&mut bytes);
        let candidate = Identifier::from_bytes(bytes);
        if Bound::contains(min, max, &candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_exclusive_is_one_past_identifier_max() {
        let max = Bound::max_exclusive();
        assert!(max.to_identifier().is_none());
        let top = Bound::from_identifier(&Identifier::MAX);
        assert!(top < max);
    }

    #[test]
    fn midpoint_of_full_range_is_two_to_the_511() {
        let mid = Bound::midpoint(Bound::ZERO, Bound::max_exclusive());
        let id = mid.to_identifier().expect("midpoint of full range fits an identifier");
        let mut expected = [0u8; 64];
        expected[0] = 0x80;
        assert_eq!(id, Identifier::from_bytes(expected));
    }

    #[test]
    fn contains_respects_half_open_range() {
        let min = Bound::ZERO;
        let max = Bound::from_identifier(&Identifier::from_bytes({
            let mut b = [0u8; 64];
            b[63] = 10;
            b
        }));
        let inside = Identifier::from_bytes({
            let mut b = [0u8; 64];
            b[63] = 9;
            b
        });
        let outside = Identifier::from_bytes({
            let mut b = [0u8; 64];
            b[63] = 10;
            b
        });
        assert!(Bound::contains(min, max, &inside));
        assert!(!Bound::contains(min, max, &outside));
    }

    #[test]
    fn random_in_range_stays_within_bounds() {
        let min = Bound::ZERO;
        let max = Bound::from_identifier(&Identifier::from_bytes({
            let mut b = [0u8; 64];
            b[63] = 4;
            b
        }));
        for _ in 0..20 {
            let sample = random_in_range(min, max);
            assert!(Bound::contains(min, max, &sample));
        }
    }
}
