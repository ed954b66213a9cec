// RVL: single-frame lossless run-length + variable-length depth codec.
//
// Zero pixels are run-length coded; each non-zero pixel is coded as the
// zig-zag mapped difference from the previous non-zero pixel (starting
// from 0). Both share the nibble VLE code. Stateless and thread-safe.

use log::trace;

use super::runs;
use super::vle::{zigzag_decode, zigzag_encode};
use crate::error::{CodecError, Result};

/// Wire identifier stored in container headers.
pub const RVL_NAME: &str = "RVL";

/// Compress one depth frame.
pub fn encode(frame: &[i16]) -> Vec<u8> {
    let mut previous: i32 = 0;
    let block = runs::encode(
        frame.len(),
        |i| frame[i] == 0,
        |i| {
            let value = i32::from(frame[i]);
            let delta = value - previous;
            previous = value;
            zigzag_encode(delta)
        },
    );
    trace!("rvl: encoded {} pixels into {} bytes", frame.len(), block.len());
    block
}

/// Reconstruct a frame of `frame_size` pixels from an RVL block.
pub fn decode(block: &[u8], frame_size: usize) -> Result<Vec<i16>> {
    check_frame_size(frame_size)?;
    let mut frame = runs::zeroed::<i16>(frame_size).ok_or_else(|| {
        CodecError::corrupt(format!("cannot allocate a frame of {frame_size} pixels"))
    })?;
    let mut previous: i32 = 0;
    runs::decode(block, frame_size, |i, code| {
        let value = previous + zigzag_decode(code);
        let pixel = i16::try_from(value).map_err(|_| {
            CodecError::corrupt(format!("pixel {i} decodes to {value}, outside i16"))
        })?;
        if pixel == 0 {
            return Err(CodecError::corrupt(format!(
                "pixel {i} decodes to zero inside a non-zero span"
            )));
        }
        frame[i] = pixel;
        previous = value;
        Ok(())
    })?;
    trace!("rvl: decoded {} bytes into {frame_size} pixels", block.len());
    Ok(frame)
}

// ---------------------------------------------------------------------------
// Fixed-size wrappers
// ---------------------------------------------------------------------------

pub(crate) fn check_frame_len(frame: &[i16], frame_size: usize) -> Result<()> {
    if frame.len() != frame_size {
        return Err(CodecError::invalid(format!(
            "frame has {} pixels, codec expects {frame_size}",
            frame.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_frame_size(frame_size: usize) -> Result<()> {
    if frame_size == 0 {
        return Err(CodecError::invalid("frame size must be positive"));
    }
    Ok(())
}

/// RVL encoder bound to a frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RvlEncoder {
    frame_size: usize,
}

impl RvlEncoder {
    pub fn new(frame_size: usize) -> Result<Self> {
        check_frame_size(frame_size)?;
        Ok(Self { frame_size })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn encode(&self, frame: &[i16]) -> Result<Vec<u8>> {
        check_frame_len(frame, self.frame_size)?;
        Ok(encode(frame))
    }
}

/// RVL decoder bound to a frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RvlDecoder {
    frame_size: usize,
}

impl RvlDecoder {
    pub fn new(frame_size: usize) -> Result<Self> {
        check_frame_size(frame_size)?;
        Ok(Self { frame_size })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn decode(&self, block: &[u8]) -> Result<Vec<i16>> {
        decode(block, self.frame_size)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bitstream::BitReader;
    use crate::codec::vle::read_vle;

    fn fields(block: &[u8], count: usize) -> Vec<u32> {
        let mut r = BitReader::new(block);
        (0..count).map(|_| read_vle(&mut r).unwrap()).collect()
    }

    #[test]
    fn concrete_scenario() {
        let frame = [0, 0, 0, 5, 5, 0, 0, 7];
        let block = encode(&frame);
        // run(3) 10 run(0) 0 run(2) 4
        assert_eq!(fields(&block, 6), vec![3, 10, 0, 0, 2, 4]);
        assert_eq!(block.len(), 4); // 30 bits
        assert_eq!(decode(&block, 8).unwrap(), frame);
    }

    #[test]
    fn zero_frame_is_one_run() {
        let frame = vec![0i16; 1000];
        let block = encode(&frame);
        // 1000 = 0x3E8 -> three nibbles, 15 bits
        assert_eq!(fields(&block, 1), vec![1000]);
        assert_eq!(block.len(), 2);
        assert_eq!(decode(&block, 1000).unwrap(), frame);
    }

    #[test]
    fn single_pixel_frames() {
        for v in [0i16, 1, -1, i16::MAX, i16::MIN] {
            let block = encode(&[v]);
            assert_eq!(decode(&block, 1).unwrap(), vec![v]);
        }
    }

    #[test]
    fn extreme_magnitudes() {
        let frame = [i16::MAX, i16::MIN, i16::MAX, 0, i16::MIN, -1, 1];
        let block = encode(&frame);
        assert_eq!(decode(&block, frame.len()).unwrap(), frame);
    }

    #[test]
    fn alternating_single_pixel_runs() {
        let frame: Vec<i16> = (0..64).map(|i| if i % 2 == 0 { 0 } else { 100 + i }).collect();
        let block = encode(&frame);
        assert_eq!(decode(&block, frame.len()).unwrap(), frame);
    }

    #[test]
    fn encoding_is_deterministic() {
        let frame: Vec<i16> = (0..500).map(|i| ((i * 37) % 900) as i16).collect();
        assert_eq!(encode(&frame), encode(&frame));
    }

    #[test]
    fn zero_frame_size_rejected() {
        assert!(matches!(decode(&[], 0), Err(CodecError::InvalidArgument(_))));
        assert!(RvlEncoder::new(0).is_err());
        assert!(RvlDecoder::new(0).is_err());
    }

    #[test]
    fn truncated_block_is_corrupt() {
        let frame = [0, 0, 0, 5, 5, 0, 0, 7];
        let block = encode(&frame);
        assert!(matches!(
            decode(&block[..2], 8),
            Err(CodecError::CorruptStream(_))
        ));
    }

    #[test]
    fn decoding_into_larger_frame_is_corrupt() {
        let block = encode(&[1, 2, 3]);
        assert!(matches!(decode(&block, 4), Err(CodecError::CorruptStream(_))));
    }

    #[test]
    fn unallocatable_frame_is_corrupt() {
        let frame_size = isize::MAX as usize / 2;
        assert!(matches!(
            decode(&[0b0000_1000], frame_size),
            Err(CodecError::CorruptStream(_))
        ));
    }

    #[test]
    fn wrapper_checks_length() {
        let enc = RvlEncoder::new(4).unwrap();
        assert!(matches!(
            enc.encode(&[1, 2, 3]),
            Err(CodecError::InvalidArgument(_))
        ));
        let block = enc.encode(&[1, 0, 0, 2]).unwrap();
        assert_eq!(RvlDecoder::new(4).unwrap().decode(&block).unwrap(), vec![1, 0, 0, 2]);
    }
}
