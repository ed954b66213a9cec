// TRVL: temporal RVL.
//
// Each session keeps a reference frame. Per pixel, the encoder decides an
// "effective" value for the current frame:
//
//   - |frame - reference| > change_threshold  ->  frame value, counter reset
//   - otherwise the counter is bumped; when it reaches
//     invalidation_threshold the pixel is forced to 0 (invalid) and the
//     counter reset, else the reference value is held.
//
// Pixels whose effective value differs from the reference are coded as
// zig-zag deltas against the reference; runs of untouched pixels use the
// RVL run layout. The decoder only applies the transmitted deltas, so it
// never has to recompute invalidation.
//
// Sessions must see frames in production order. There is no in-band
// desynchronisation check: a skipped or reordered block silently corrupts
// every later frame until the next keyframe.

use log::{debug, trace};

use super::runs::{self, zeroed};
use super::rvl::{check_frame_len, check_frame_size};
use super::vle::{zigzag_decode, zigzag_encode};
use crate::error::{CodecError, Result};

/// Wire identifier stored in container headers.
pub const TRVL_NAME: &str = "TRVL";

pub const DEFAULT_CHANGE_THRESHOLD: u32 = 10;
pub const DEFAULT_INVALIDATION_THRESHOLD: u32 = 2;

fn unallocatable(frame_size: usize) -> CodecError {
    CodecError::invalid(format!("cannot allocate session buffers for {frame_size} pixels"))
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Encoder tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrvlConfig {
    /// Minimum absolute difference (exclusive) for a pixel to count as changed.
    pub change_threshold: u32,
    /// Consecutive unchanged frames after which a pixel is reset to 0.
    /// Must be positive.
    pub invalidation_threshold: u32,
}

impl Default for TrvlConfig {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
            invalidation_threshold: DEFAULT_INVALIDATION_THRESHOLD,
        }
    }
}

impl TrvlConfig {
    /// Every difference is transmitted and pixels are never invalidated in
    /// practice (the counter would need `u32::MAX` idle frames).
    pub fn lossless() -> Self {
        Self {
            change_threshold: 0,
            invalidation_threshold: u32::MAX,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.invalidation_threshold == 0 {
            return Err(CodecError::invalid("invalidation threshold must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Stateful TRVL encoder session.
#[derive(Debug, Clone)]
pub struct TrvlEncoder {
    config: TrvlConfig,
    reference: Vec<i16>,
    counters: Vec<u32>,
    /// Effective values of the frame being encoded; swapped with `reference`.
    effective: Vec<i16>,
    frames_encoded: u64,
    last_changed: usize,
}

impl TrvlEncoder {
    pub fn new(frame_size: usize, config: TrvlConfig) -> Result<Self> {
        check_frame_size(frame_size)?;
        config.validate()?;
        let (Some(reference), Some(counters), Some(effective)) =
            (zeroed(frame_size), zeroed(frame_size), zeroed(frame_size))
        else {
            return Err(unallocatable(frame_size));
        };
        debug!(
            "trvl: encoder session: {frame_size} pixels, change threshold {}, invalidation threshold {}",
            config.change_threshold, config.invalidation_threshold
        );
        Ok(Self {
            config,
            reference,
            counters,
            effective,
            frames_encoded: 0,
            last_changed: 0,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.reference.len()
    }

    pub fn config(&self) -> TrvlConfig {
        self.config
    }

    /// The last effective frame, i.e. what a synchronised decoder holds.
    pub fn reference(&self) -> &[i16] {
        &self.reference
    }

    /// Frames encoded since construction or the last reset.
    pub fn frames_processed(&self) -> u64 {
        self.frames_encoded
    }

    /// Pixels transmitted in the most recent block.
    pub fn last_changed(&self) -> usize {
        self.last_changed
    }

    /// Drop all session state, as if freshly constructed.
    pub fn reset(&mut self) {
        self.reference.fill(0);
        self.counters.fill(0);
        self.frames_encoded = 0;
        self.last_changed = 0;
    }

    /// Encode the next frame of the sequence.
    pub fn encode(&mut self, frame: &[i16]) -> Result<Vec<u8>> {
        check_frame_len(frame, self.frame_size())?;
        self.classify(frame);
        Ok(self.emit())
    }

    /// Encode `frame` exactly, relative to an all-zero reference.
    ///
    /// The session is reset first, so a decoder that calls
    /// [`TrvlDecoder::decode_keyframe`] on this block is synchronised
    /// regardless of what it saw before.
    pub fn encode_keyframe(&mut self, frame: &[i16]) -> Result<Vec<u8>> {
        check_frame_len(frame, self.frame_size())?;
        let at = self.frames_encoded;
        self.reset();
        self.effective.copy_from_slice(frame);
        debug!("trvl: keyframe after {at} frames");
        Ok(self.emit())
    }

    /// Compute effective values and update invalidation counters.
    fn classify(&mut self, frame: &[i16]) {
        let threshold = self.config.change_threshold;
        let limit = self.config.invalidation_threshold;
        let pixels = frame
            .iter()
            .zip(&self.reference)
            .zip(self.counters.iter_mut())
            .zip(self.effective.iter_mut());

        for (((&value, &held), counter), out) in pixels {
            let diff = (i32::from(value) - i32::from(held)).unsigned_abs();
            *out = if diff > threshold {
                *counter = 0;
                value
            } else {
                *counter += 1;
                if *counter >= limit {
                    *counter = 0;
                    0
                } else {
                    held
                }
            };
        }
    }

    /// Code `effective` against `reference`, then promote it.
    fn emit(&mut self) -> Vec<u8> {
        let effective = &self.effective;
        let reference = &self.reference;
        let mut changed = 0usize;
        let block = runs::encode(
            effective.len(),
            |i| effective[i] == reference[i],
            |i| {
                changed += 1;
                zigzag_encode(i32::from(effective[i]) - i32::from(reference[i]))
            },
        );

        std::mem::swap(&mut self.reference, &mut self.effective);
        self.last_changed = changed;
        self.frames_encoded += 1;
        trace!(
            "trvl: frame {}: {changed}/{} pixels changed, {} bytes",
            self.frames_encoded,
            self.reference.len(),
            block.len()
        );
        block
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Stateful TRVL decoder session.
#[derive(Debug, Clone)]
pub struct TrvlDecoder {
    reference: Vec<i16>,
    /// Frame under reconstruction; only promoted once the block decodes cleanly.
    scratch: Vec<i16>,
    frames_decoded: u64,
}

impl TrvlDecoder {
    pub fn new(frame_size: usize) -> Result<Self> {
        check_frame_size(frame_size)?;
        let (Some(reference), Some(scratch)) = (zeroed(frame_size), zeroed(frame_size)) else {
            return Err(unallocatable(frame_size));
        };
        debug!("trvl: decoder session: {frame_size} pixels");
        Ok(Self {
            reference,
            scratch,
            frames_decoded: 0,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.reference.len()
    }

    /// The last reconstructed frame.
    pub fn reference(&self) -> &[i16] {
        &self.reference
    }

    /// Frames decoded since construction or the last reset.
    pub fn frames_processed(&self) -> u64 {
        self.frames_decoded
    }

    pub fn reset(&mut self) {
        self.reference.fill(0);
        self.frames_decoded = 0;
    }

    /// Decode the next block of the sequence.
    ///
    /// On error the session is left exactly as it was.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<i16>> {
        self.scratch.copy_from_slice(&self.reference);
        self.apply(block)
    }

    /// Decode a block produced by [`TrvlEncoder::encode_keyframe`].
    pub fn decode_keyframe(&mut self, block: &[u8]) -> Result<Vec<i16>> {
        self.scratch.fill(0);
        let frame = self.apply(block)?;
        self.frames_decoded = 1;
        Ok(frame)
    }

    fn apply(&mut self, block: &[u8]) -> Result<Vec<i16>> {
        let frame_size = self.frame_size();
        let scratch = &mut self.scratch;
        runs::decode(block, frame_size, |i, code| {
            let delta = zigzag_decode(code);
            if delta == 0 {
                return Err(CodecError::corrupt(format!(
                    "pixel {i} flagged as changed with a zero delta"
                )));
            }
            let value = i32::from(scratch[i]) + delta;
            scratch[i] = i16::try_from(value).map_err(|_| {
                CodecError::corrupt(format!("pixel {i} decodes to {value}, outside i16"))
            })?;
            Ok(())
        })?;

        std::mem::swap(&mut self.reference, &mut self.scratch);
        self.frames_decoded += 1;
        trace!(
            "trvl: decoded frame {} from {} bytes",
            self.frames_decoded,
            block.len()
        );
        Ok(self.reference.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
