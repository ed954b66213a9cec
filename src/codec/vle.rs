// Nibble-based variable-length integer code and zig-zag mapping.
//
// Each field is 5 bits: one continuation bit followed by a 4-bit payload
// nibble. Nibbles are emitted least-significant first; the continuation
// bit is set on every field except the last.
//
//   value 0x2A  ->  [1 1010] [0 0010]

use super::bitstream::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

/// Width of one VLE field (continuation bit + nibble).
pub const FIELD_BITS: u32 = 5;

const NIBBLE_MASK: u32 = 0xF;
const CONTINUATION: u32 = 1 << 4;

/// A `u32` never needs more than eight nibbles.
pub const MAX_VLE_FIELDS: usize = 8;

// ---------------------------------------------------------------------------
// Zig-zag
// ---------------------------------------------------------------------------

/// Map a signed delta onto the non-negative integers:
/// `0, -1, 1, -2, 2, ...` becomes `0, 1, 2, 3, 4, ...`.
#[inline]
pub fn zigzag_encode(delta: i32) -> u32 {
    (delta.wrapping_shl(1) ^ (delta >> 31)) as u32
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append `value` as a sequence of VLE fields.
#[inline]
pub fn write_vle(w: &mut BitWriter, mut value: u32) {
    loop {
        let nibble = value & NIBBLE_MASK;
        value >>= 4;
        let field = if value != 0 {
            nibble | CONTINUATION
        } else {
            nibble
        };
        w.put_bits(field, FIELD_BITS);
        if value == 0 {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Read one VLE-coded integer.
///
/// Running out of input surfaces as `UnexpectedEndOfStream`; a
/// continuation bit on the eighth field is `CorruptStream`.
pub fn read_vle(r: &mut BitReader<'_>) -> Result<u32> {
    let mut value: u32 = 0;
    for i in 0..MAX_VLE_FIELDS {
        let field = r.read_bits(FIELD_BITS)?;
        value |= (field & NIBBLE_MASK) << (4 * i);
        if field & CONTINUATION == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::corrupt("variable-length integer exceeds 32 bits"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
