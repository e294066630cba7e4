//! Protocol identifier types.

use std::{cmp::Ordering, fmt, ops::RangeInclusive};

#[cfg(feature = "codec")]
use bincode::{Decode, Encode};
use rand::{thread_rng, Fill, Rng};

/// A 160-bit identifier that implements a non-euclidian XOR-based distance metric.
///
/// The bytes are big-endian: byte 0 is the most significant, so the derived ordering on
/// identifiers (and on [`Distance`]) is the numeric ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "codec", derive(Encode, Decode))]
pub struct Id {
    bytes: [u8; Self::BYTES],
}

/// The XOR of two identifiers, interpreted as an unsigned big-endian integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance([u8; Id::BYTES]);

impl Distance {
    /// The zero distance, only ever observed between an identifier and itself.
    pub const ZERO: Distance = Distance([0u8; Id::BYTES]);

    /// Returns the bytes backing the distance.
    pub fn bytes(&self) -> [u8; Id::BYTES] {
        self.0
    }
}

impl Id {
    /// The size of the identifier in bytes.
    pub const BYTES: usize = 20;

    /// The size of the identifier in bits.
    pub const BITS: usize = 20 * 8;

    /// Creates a new identifier from the supplied bytes.
    pub fn new(bytes: [u8; Self::BYTES]) -> Self {
        Id { bytes }
    }

    /// Returns the bytes backing the identifier.
    pub fn bytes(&self) -> [u8; Self::BYTES] {
        self.bytes
    }

    /// Convenience function for working with small identifiers, the value occupies the
    /// least-significant bytes.
    pub fn from_u64(raw: u64) -> Self {
        let mut bytes = [0u8; Self::BYTES];
        bytes[Self::BYTES - 8..].copy_from_slice(&raw.to_be_bytes());

        Self { bytes }
    }

    /// Generates a random identifier.
    pub fn rand() -> Self {
        let mut rng = thread_rng();
        let mut bytes = [0u8; Self::BYTES];
        let _res = bytes.try_fill(&mut rng);
        // Sanity check this doesn't fail in debug mode.
        debug_assert!(_res.is_ok());

        Self { bytes }
    }

    /// Computes the XOR-based distance between two identifiers.
    pub fn distance(&self, other: &Id) -> Distance {
        let mut xor = [0u8; Self::BYTES];
        for (d, (a, b)) in xor.iter_mut().zip(self.bytes.iter().zip(other.bytes.iter())) {
            *d = a ^ b;
        }

        Distance(xor)
    }

    /// Orders `a` and `b` by their distance to `self`.
    pub fn cmp_distance(&self, a: &Id, b: &Id) -> Ordering {
        self.distance(a).cmp(&self.distance(b))
    }

    /// Computes the log2 of the XOR-based distance between two identifiers, `None` if they are
    /// equal.
    pub fn log2_distance(&self, other: &Id) -> Option<u32> {
        // The bytes are big-endian, the first non-zero byte of the XOR holds the
        // most-significant differing bit. Byte `i` covers bits `(19 - i) * 8..(20 - i) * 8`.
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(&a, &b)| a ^ b)
            .enumerate()
            .find(|(_, byte)| byte != &0b0)
            .map(|(i, byte)| Self::msb(byte) + (((Self::BYTES - 1 - i) as u32) << 3))
    }

    /// Returns the identifier "one away" from this one: the last byte is incremented, wrapping
    /// around without carrying into the rest of the identifier.
    pub fn adjacent(&self) -> Id {
        let mut bytes = self.bytes;
        bytes[Self::BYTES - 1] = bytes[Self::BYTES - 1].wrapping_add(1);

        Id { bytes }
    }

    /// Returns the range of identifiers whose log2 distance to `self` is `i`. Bucket 0 also
    /// covers `self`, so the ranges for `0..BITS` partition the identifier space.
    pub fn bucket_range(&self, i: u32) -> RangeInclusive<Id> {
        debug_assert!((i as usize) < Self::BITS);

        let mut min = *self;
        let mut max = *self;

        if i > 0 {
            min.flip_bit(i);
            max.flip_bit(i);
        }

        for bit in 0..i {
            min.set_bit(bit, false);
            max.set_bit(bit, true);
        }

        if i == 0 {
            min.set_bit(0, false);
            max.set_bit(0, true);
        }

        min..=max
    }

    /// Draws a uniformly random identifier from an inclusive range produced by
    /// [`bucket_range`](Self::bucket_range).
    pub fn random_in_range(range: &RangeInclusive<Id>) -> Id {
        let mut rng = thread_rng();
        let (start, end) = (range.start(), range.end());

        // Bucket ranges share a common prefix and span every combination of the bits below it.
        let mut bytes = [0u8; Self::BYTES];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let free: u8 = start.bytes[i] ^ end.bytes[i];
            let noise: u8 = rng.gen();
            *byte = (start.bytes[i] & !free) | (noise & free);
        }

        Id { bytes }
    }

    fn bit_position(bit: u32) -> (usize, u8) {
        let byte = Self::BYTES - 1 - (bit as usize >> 3);
        (byte, 1 << (bit & 7))
    }

    fn flip_bit(&mut self, bit: u32) {
        let (byte, mask) = Self::bit_position(bit);
        self.bytes[byte] ^= mask;
    }

    fn set_bit(&mut self, bit: u32, value: bool) {
        let (byte, mask) = Self::bit_position(bit);
        if value {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }
    }

    // Returns the position of the most-significant bit set in a byte (0-indexed).
    fn msb(n: u8) -> u32 {
        debug_assert_ne!(n, 0);
        // Safety: can't be 0 - 1.
        u8::BITS - n.leading_zeros() - 1
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first four bytes are plenty to tell identifiers apart in logs.
        for byte in &self.bytes[..4] {
            write!(f, "{byte:02x}")?;
        }

        write!(f, "..")
    }
}
