// Bit-granular writer and reader over a byte buffer.
//
// Fields are packed most-significant-bit first, both within a field and
// within each output byte. The writer pads its final partial byte with
// zero bits.

use crate::error::{CodecError, Result};

/// Widest field accepted by `write_bits` / `read_bits`.
pub const MAX_FIELD_BITS: u32 = 32;

fn check_width(n_bits: u32) -> Result<()> {
    if n_bits == 0 || n_bits > MAX_FIELD_BITS {
        return Err(CodecError::invalid(format!(
            "bit field width must be in 1..={MAX_FIELD_BITS}, got {n_bits}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Appends variable-width bit fields to a growable byte buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    /// Pending bits not yet flushed to `buf` (always fewer than 8 between calls).
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer whose buffer can hold `bytes` without reallocating.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: Vec::with_capacity(bytes),
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Append the low `n_bits` of `value`, MSB first.
    pub fn write_bits(&mut self, value: u32, n_bits: u32) -> Result<()> {
        check_width(n_bits)?;
        self.put_bits(value, n_bits);
        Ok(())
    }

    /// Unchecked variant for callers that use a fixed, valid width.
    #[inline]
    pub(crate) fn put_bits(&mut self, value: u32, n_bits: u32) {
        debug_assert!((1..=MAX_FIELD_BITS).contains(&n_bits));
        let mask = if n_bits == 32 {
            u64::from(u32::MAX)
        } else {
            (1u64 << n_bits) - 1
        };
        self.acc = (self.acc << n_bits) | (u64::from(value) & mask);
        self.acc_bits += n_bits;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.buf.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1u64 << self.acc_bits) - 1;
    }

    /// Total number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8 + self.acc_bits as usize
    }

    /// Pad the final partial byte with zeros and return the buffer.
    pub fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.buf.push((self.acc << (8 - self.acc_bits)) as u8);
        }
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Consumes variable-width bit fields from a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit position of the next unread bit.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits left, including any zero padding at the end.
    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    /// Read an `n_bits`-wide field. The cursor does not move on failure.
    pub fn read_bits(&mut self, n_bits: u32) -> Result<u32> {
        check_width(n_bits)?;
        let available = self.bits_remaining();
        if (n_bits as usize) > available {
            return Err(CodecError::UnexpectedEndOfStream {
                needed: n_bits,
                available,
            });
        }

        let mut value: u32 = 0;
        let mut remaining = n_bits;
        while remaining > 0 {
            let byte = self.data[self.pos / 8];
            let offset = (self.pos % 8) as u32;
            let take = (8 - offset).min(remaining);
            let bits = (u32::from(byte) >> (8 - offset - take)) & ((1u32 << take) - 1);
            value = (value << take) | bits;
            self.pos += take as usize;
            remaining -= take;
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
