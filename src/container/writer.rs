// Streaming container writer.
//
// Writes the header line up front, then one `u32` big-endian length plus
// block per frame. There is no trailer: the reader stops at end of stream.

use std::io::Write;

use log::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::header::ContainerHeader;
use super::stack::FrameStack;
use crate::codec::Encoder;
use crate::error::{CodecError, Result};

/// Size of the length prefix in front of every block.
pub const RECORD_PREFIX_LEN: usize = 4;

/// Encodes frames through a borrowed encoder session and frames the blocks.
///
/// The encoder is borrowed rather than owned so a TRVL session can keep
/// going after the container is finished.
pub struct ContainerWriter<'e, W: Write> {
    inner: W,
    header: ContainerHeader,
    encoder: &'e mut Encoder,
    frames_written: usize,
    bytes_written: u64,
}

impl<'e, W: Write> ContainerWriter<'e, W> {
    /// Validate `encoder` against `header` and write the header line.
    pub fn new(mut inner: W, header: ContainerHeader, encoder: &'e mut Encoder) -> Result<Self> {
        if header.codec() != encoder.kind() {
            return Err(CodecError::CodecMismatch {
                stored: header.codec().name().to_string(),
                requested: encoder.name().to_string(),
            });
        }
        if header.frame_size() != encoder.frame_size() {
            return Err(CodecError::invalid(format!(
                "header declares {} pixels per frame, encoder expects {}",
                header.frame_size(),
                encoder.frame_size()
            )));
        }
        let line = header.to_line();
        inner.write_all(line.as_bytes())?;
        Ok(Self {
            inner,
            header,
            encoder,
            frames_written: 0,
            bytes_written: line.len() as u64,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Bytes emitted so far, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Encode and append one frame. Returns the block size.
    pub fn write_frame(&mut self, frame: &[i16]) -> Result<usize> {
        self.check_room()?;
        let block = self.encoder.encode(frame)?;
        self.write_block(&block)?;
        Ok(block.len())
    }

    fn check_room(&self) -> Result<()> {
        if self.frames_written >= self.header.frame_count() {
            return Err(CodecError::invalid(format!(
                "container declares {} frames, all already written",
                self.header.frame_count()
            )));
        }
        Ok(())
    }

    fn write_block(&mut self, block: &[u8]) -> Result<()> {
        let len = u32::try_from(block.len()).map_err(|_| {
            CodecError::invalid(format!("block of {} bytes exceeds u32 length", block.len()))
        })?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(block)?;
        self.frames_written += 1;
        self.bytes_written += (RECORD_PREFIX_LEN + block.len()) as u64;
        trace!(
            "container: record {} ({} bytes)",
            self.frames_written,
            block.len()
        );
        Ok(())
    }

    /// Flush and return the sink. Fails if fewer frames were written than
    /// the header declares.
    pub fn finish(mut self) -> Result<W> {
        if self.frames_written != self.header.frame_count() {
            return Err(CodecError::invalid(format!(
                "container declares {} frames, {} written",
                self.header.frame_count(),
                self.frames_written
            )));
        }
        self.inner.flush()?;
        debug!(
            "container: finished {} {} frames, {} bytes",
            self.frames_written, self.header.codec(), self.bytes_written
        );
        Ok(self.inner)
    }
}

/// Encode a whole stack into container bytes.
pub fn save(stack: &FrameStack, encoder: &mut Encoder) -> Result<Vec<u8>> {
    #[cfg(feature = "parallel")]
    let stateless = matches!(encoder, Encoder::Rvl(_));

    let header = stack.header(encoder.kind());
    let mut writer = ContainerWriter::new(Vec::new(), header, encoder)?;

    #[cfg(feature = "parallel")]
    if stateless {
        // RVL blocks are independent of each other.
        let blocks: Vec<Vec<u8>> = stack
            .data()
            .par_chunks_exact(stack.frame_size())
            .map(crate::codec::rvl::encode)
            .collect();
        for block in &blocks {
            writer.check_room()?;
            writer.write_block(block)?;
        }
        return writer.finish();
    }

    for frame in stack.frames() {
        writer.write_frame(frame)?;
    }
    writer.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
