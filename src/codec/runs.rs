// Alternating skip-run / entry layout shared by RVL and TRVL.
//
// A block is a sequence of VLE fields:
//
//   run(k0) entry run(k1) entry ... run(kn) [entry]
//
// `run(k)` skips `k` pixels (zeros for RVL, unchanged pixels for TRVL) and
// is followed by exactly one entry for the next pixel. A zero-length run
// separates adjacent entries. Nothing is written once the last pixel is
// covered, so a frame that ends on an entry has no trailing run.

use super::bitstream::{BitReader, BitWriter};
use super::vle::{self, FIELD_BITS};
use crate::error::{CodecError, Result};

/// Encode `len` pixels. `skip(i)` classifies pixel `i`; `entry(i)` yields
/// the code for a non-skipped pixel and is called in pixel order.
pub(crate) fn encode<S, E>(len: usize, mut skip: S, mut entry: E) -> Vec<u8>
where
    S: FnMut(usize) -> bool,
    E: FnMut(usize) -> u32,
{
    // Most depth blocks land well under one byte per pixel.
    let mut w = BitWriter::with_capacity(len / 2 + 8);
    let mut i = 0usize;
    loop {
        let start = i;
        while i < len && skip(i) {
            i += 1;
        }
        vle::write_vle(&mut w, (i - start) as u32);
        if i == len {
            break;
        }
        vle::write_vle(&mut w, entry(i));
        i += 1;
        if i == len {
            break;
        }
    }
    w.finish()
}

/// Walk a block covering exactly `len` pixels, handing each entry to
/// `entry(i, code)`. Skipped pixels are left to the caller.
pub(crate) fn decode<E>(block: &[u8], len: usize, mut entry: E) -> Result<()>
where
    E: FnMut(usize, u32) -> Result<()>,
{
    let mut r = BitReader::new(block);
    let mut i = 0usize;
    loop {
        let run = read_field(&mut r, i, len)? as usize;
        if run > len - i {
            return Err(CodecError::corrupt(format!(
                "run of {run} at pixel {i} overruns frame of {len} pixels"
            )));
        }
        i += run;
        if i == len {
            break;
        }
        let code = read_field(&mut r, i, len)?;
        entry(i, code)?;
        i += 1;
        if i == len {
            break;
        }
    }

    // Only the zero padding of the final byte may follow.
    let trailing = r.bits_remaining();
    if trailing >= 8 {
        return Err(CodecError::corrupt(format!(
            "{trailing} bits of trailing data after {len} pixels"
        )));
    }
    Ok(())
}

fn read_field(r: &mut BitReader<'_>, at: usize, len: usize) -> Result<u32> {
    vle::read_vle(r).map_err(|e| match e {
        CodecError::UnexpectedEndOfStream { .. } => CodecError::corrupt(format!(
            "stream exhausted after {at} of {len} pixels"
        )),
        other => other,
    })
}

/// Upper bound on the encoded size of a block, in bytes.
pub fn max_block_len(len: usize) -> usize {
    // Worst case per pixel: zero-length run plus an eight-field entry.
    let max_fields = len
        .saturating_mul(1 + vle::MAX_VLE_FIELDS)
        .saturating_add(1);
    max_fields.saturating_mul(FIELD_BITS as usize).div_ceil(8)
}

/// Zero-filled pixel buffer of `len` elements, or `None` if the allocation
/// fails. Frame sizes can come straight from untrusted headers.
pub(crate) fn zeroed<T: Copy + Default>(len: usize) -> Option<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, T::default());
    Some(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
