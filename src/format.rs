//! Constants and helpers shared by the writer and reader side of the wire format.
//!
//! # Dynamic numbers
//!
//! A signed 64-bit integer is written as a short bit header followed by its magnitude in
//! big-endian bytes. `S` is the sign bit, `0` for positive and `1` for negative.
//!
//! | Bits                 | Payload  | Magnitude           | Total bits |
//! |----------------------|----------|---------------------|-----------:|
//! | `0`                  | none     | value is zero       | 1          |
//! | `1 S 0`              | none     | 1                   | 3          |
//! | `1 S 1 0`            | 1 byte   | up to `u8::MAX`     | 12         |
//! | `1 S 1 1 0`          | 2 bytes  | up to `u16::MAX`    | 21         |
//! | `1 S 1 1 1 0`        | 4 bytes  | up to `u32::MAX`    | 38         |
//! | `1 S 1 1 1 1`        | 8 bytes  | anything larger     | 70         |
//!
//! The payload bytes are written with byte-level writes, so they straddle byte boundaries
//! whenever the stream is not aligned.

use zerocopy::byteorder::{BE, U16, U32, U64};
use zerocopy::{FromBytes, IntoBytes};

/// Number of bits in a byte.
pub const BITS_IN_BYTE: u8 = 8;

/// Returns a mask selecting the `n` low-order bits of a byte. `n` must be at most 8.
#[inline(always)]
pub const fn low_order_mask(n: u8) -> u8 {
    debug_assert!(n <= BITS_IN_BYTE);
    (0xffu16 >> (BITS_IN_BYTE - n)) as u8
}

/// The width class chosen for the magnitude of a non-zero dynamic number.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MagnitudeTier {
    /// Magnitude is exactly 1; no payload.
    One,
    /// One payload byte.
    U8,
    /// Two payload bytes.
    U16,
    /// Four payload bytes.
    U32,
    /// Eight payload bytes.
    U64,
}

impl MagnitudeTier {
    /// Selects the smallest tier that can hold `magnitude`. `magnitude` must be non-zero.
    pub const fn for_magnitude(magnitude: u64) -> Self {
        if magnitude == 1 {
            Self::One
        } else if magnitude <= u8::MAX as u64 {
            Self::U8
        } else if magnitude <= u16::MAX as u64 {
            Self::U16
        } else if magnitude <= u32::MAX as u64 {
            Self::U32
        } else {
            Self::U64
        }
    }

    /// The tier bits that follow the sign bit, as `(bits, count)` in MSB-first order.
    pub const fn header(self) -> (u64, u32) {
        match self {
            Self::One => (0b0, 1),
            Self::U8 => (0b10, 2),
            Self::U16 => (0b110, 3),
            Self::U32 => (0b1110, 4),
            Self::U64 => (0b1111, 4),
        }
    }

    /// Number of payload bytes following the header.
    pub const fn byte_len(self) -> usize {
        match self {
            Self::One => 0,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Total encoded length in bits, including the leading non-zero bit and the sign bit.
    pub const fn encoded_bits(self) -> u32 {
        2 + self.header().1 + self.byte_len() as u32 * BITS_IN_BYTE as u32
    }

    /// Serializes `magnitude` into `buf` using this tier's width, big-endian, and returns the
    /// used prefix of `buf`. Bits of `magnitude` above the tier's width are ignored.
    pub fn encode(self, magnitude: u64, buf: &mut [u8; 8]) -> &[u8] {
        let len = self.byte_len();
        match self {
            Self::One => {}
            Self::U8 => buf[0] = magnitude as u8,
            Self::U16 => buf[..len].copy_from_slice(U16::<BE>::new(magnitude as u16).as_bytes()),
            Self::U32 => buf[..len].copy_from_slice(U32::<BE>::new(magnitude as u32).as_bytes()),
            Self::U64 => buf[..len].copy_from_slice(U64::<BE>::new(magnitude).as_bytes()),
        }
        &buf[..len]
    }

    /// Deserializes a magnitude from exactly [`Self::byte_len`] big-endian bytes.
    ///
    /// Returns `None` if `bytes` has the wrong length.
    pub fn decode(self, bytes: &[u8]) -> Option<u64> {
        match self {
            Self::One => bytes.is_empty().then_some(1),
            Self::U8 => match *bytes {
                [b] => Some(u64::from(b)),
                _ => None,
            },
            Self::U16 => U16::<BE>::read_from_bytes(bytes).ok().map(|v| u64::from(v.get())),
            Self::U32 => U32::<BE>::read_from_bytes(bytes).ok().map(|v| u64::from(v.get())),
            Self::U64 => U64::<BE>::read_from_bytes(bytes).ok().map(|v| v.get()),
        }
    }
}

/// Combines a decoded magnitude and sign into a signed value.
///
/// The magnitude of `i64::MIN` is `2^63`, which only fits as a negative value. Returns `None`
/// for magnitudes that no `i64` has.
pub const fn apply_sign(magnitude: u64, negative: bool) -> Option<i64> {
    if negative {
        if magnitude <= i64::MIN.unsigned_abs() {
            Some((magnitude as i64).wrapping_neg())
        } else {
            None
        }
    } else if magnitude <= i64::MAX as u64 {
        Some(magnitude as i64)
    } else {
        None
    }
}

/// Returns the number of bits [`crate::BitWriter::write_dynamic_number`] emits for `value`.
pub const fn dynamic_number_bits(value: i64) -> u32 {
    if value == 0 {
        1
    } else {
        MagnitudeTier::for_magnitude(value.unsigned_abs()).encoded_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks() {
        assert_eq!(low_order_mask(0), 0x00);
        assert_eq!(low_order_mask(1), 0x01);
        assert_eq!(low_order_mask(3), 0x07);
        assert_eq!(low_order_mask(7), 0x7f);
        assert_eq!(low_order_mask(8), 0xff);
    }

    #[test]
    fn tier_boundaries() {
        let cases: &[(u64, MagnitudeTier)] = &[
            (1, MagnitudeTier::One),
            (2, MagnitudeTier::U8),
            (255, MagnitudeTier::U8),
            (256, MagnitudeTier::U16),
            (65535, MagnitudeTier::U16),
            (65536, MagnitudeTier::U32),
            (4294967295, MagnitudeTier::U32),
            (4294967296, MagnitudeTier::U64),
            (i64::MAX as u64, MagnitudeTier::U64),
            (i64::MIN.unsigned_abs(), MagnitudeTier::U64),
        ];

        for &(magnitude, tier) in cases {
            assert_eq!(MagnitudeTier::for_magnitude(magnitude), tier, "magnitude = {magnitude}");
        }
    }

    #[test]
    fn encoded_lengths() {
        assert_eq!(dynamic_number_bits(0), 1);
        assert_eq!(dynamic_number_bits(1), 3);
        assert_eq!(dynamic_number_bits(-1), 3);
        assert_eq!(dynamic_number_bits(-255), 12);
        assert_eq!(dynamic_number_bits(256), 21);
        assert_eq!(dynamic_number_bits(-65536), 38);
        assert_eq!(dynamic_number_bits(4294967296), 70);
        assert_eq!(dynamic_number_bits(i64::MIN), 70);
    }

    #[test]
    fn encode_big_endian() {
        let mut buf = [0u8; 8];
        assert_eq!(MagnitudeTier::One.encode(1, &mut buf), &[] as &[u8]);
        assert_eq!(MagnitudeTier::U8.encode(0xab, &mut buf), &[0xab]);
        assert_eq!(MagnitudeTier::U16.encode(0x0102, &mut buf), &[0x01, 0x02]);
        assert_eq!(
            MagnitudeTier::U32.encode(0xdeadbeef, &mut buf),
            &[0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(
            MagnitudeTier::U64.encode(0x0102030405060708, &mut buf),
            &[1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(MagnitudeTier::U16.decode(&[0x01, 0x02]), Some(0x0102));
        assert_eq!(MagnitudeTier::U16.decode(&[0x01]), None);
        assert_eq!(MagnitudeTier::U8.decode(&[]), None);
        assert_eq!(MagnitudeTier::One.decode(&[0]), None);
    }

    #[test]
    fn min_value_sign() {
        assert_eq!(apply_sign(i64::MIN.unsigned_abs(), true), Some(i64::MIN));
        assert_eq!(apply_sign(i64::MIN.unsigned_abs(), false), None);
        assert_eq!(apply_sign(i64::MAX as u64, false), Some(i64::MAX));
        assert_eq!(apply_sign(u64::MAX, true), None);
        assert_eq!(apply_sign(5, true), Some(-5));
    }
}
