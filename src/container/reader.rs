// Streaming container reader.
//
// Reads the header line, then `u32` big-endian length plus block records
// until end of stream. End of stream is only clean on a record boundary.

use std::io::{ErrorKind, Read};

use log::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::header::ContainerHeader;
use super::stack::FrameStack;
use super::writer::RECORD_PREFIX_LEN;
use crate::codec::{Decoder, runs};
use crate::error::{CodecError, Result};

const BLOCK_PREALLOC: usize = 64 * 1024;

/// Decodes the records of one container through a single decoder session.
pub struct ContainerReader<R: Read> {
    inner: R,
    header: ContainerHeader,
    decoder: Decoder,
    max_block_len: usize,
    frames_read: usize,
    done: bool,
}

impl<R: Read> ContainerReader<R> {
    /// Read the header. With `decoder == None` a fresh decoder is built from
    /// the stored codec name; a supplied decoder must match it.
    pub fn new(mut inner: R, decoder: Option<Decoder>) -> Result<Self> {
        let header = ContainerHeader::decode(&mut inner)?;
        let decoder = match decoder {
            Some(d) if d.kind() != header.codec() => {
                return Err(CodecError::CodecMismatch {
                    stored: header.codec().name().to_string(),
                    requested: d.name().to_string(),
                });
            }
            Some(d) if d.frame_size() != header.frame_size() => {
                return Err(CodecError::invalid(format!(
                    "header declares {} pixels per frame, decoder expects {}",
                    header.frame_size(),
                    d.frame_size()
                )));
            }
            Some(d) => d,
            // The frame size came from the stream, so a decoder that cannot
            // be built for it means the header is bad.
            None => Decoder::for_kind(header.codec(), header.frame_size()).map_err(|e| match e {
                CodecError::InvalidArgument(msg) => CodecError::CorruptStream(msg),
                other => other,
            })?,
        };
        Ok(Self {
            inner,
            max_block_len: runs::max_block_len(header.frame_size()),
            header,
            decoder,
            frames_read: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Hand back the decoder, e.g. to continue a TRVL session elsewhere.
    pub fn into_decoder(self) -> Decoder {
        self.decoder
    }

    /// Return the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decode the next frame, or `None` once every declared frame was read
    /// and the stream ended.
    pub fn next_frame(&mut self) -> Result<Option<Vec<i16>>> {
        let Some(block) = self.next_block()? else {
            return Ok(None);
        };
        let frame = self.decoder.decode(&block)?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    /// Next raw block, with record count and size checks applied.
    fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; RECORD_PREFIX_LEN];
        let got = read_full(&mut self.inner, &mut prefix)?;
        let expected = self.header.frame_count();

        if got == 0 {
            if self.frames_read != expected {
                return Err(CodecError::corrupt(format!(
                    "container declares {expected} frames, stream ends after {}",
                    self.frames_read
                )));
            }
            debug!("container: read {} frames", self.frames_read);
            return Ok(None);
        }
        if got < RECORD_PREFIX_LEN {
            return Err(CodecError::corrupt("truncated record length"));
        }
        if self.frames_read >= expected {
            return Err(CodecError::corrupt(format!(
                "container declares {expected} frames, found more records"
            )));
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.max_block_len {
            return Err(CodecError::corrupt(format!(
                "record of {len} bytes exceeds the {} byte bound for this frame size",
                self.max_block_len
            )));
        }
        // Grow with the bytes actually present rather than the claimed length.
        let mut block = Vec::with_capacity(len.min(BLOCK_PREALLOC));
        (&mut self.inner).take(len as u64).read_to_end(&mut block)?;
        if block.len() != len {
            return Err(CodecError::corrupt(format!(
                "truncated record: {} of {len} bytes",
                block.len()
            )));
        }
        trace!("container: record {} ({len} bytes)", self.frames_read + 1);
        Ok(Some(block))
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<Vec<i16>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows; returns the bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Parse only the header of in-memory container bytes.
pub fn read_header(bytes: &[u8]) -> Result<ContainerHeader> {
    let mut cursor = bytes;
    ContainerHeader::decode(&mut cursor)
}

/// Decode a whole container into a stack.
pub fn load(bytes: &[u8], decoder: Option<Decoder>) -> Result<FrameStack> {
    let mut reader = ContainerReader::new(bytes, decoder)?;
    let shape = reader.header().shape().to_vec();
    let dtype = reader.header().dtype().to_string();

    // The declared shape is untrusted; grow as records arrive.
    let mut data = Vec::new();

    #[cfg(feature = "parallel")]
    if matches!(reader.decoder(), Decoder::Rvl(_)) {
        let frame_size = reader.header().frame_size();
        let mut blocks = Vec::new();
        while let Some(block) = reader.next_block()? {
            blocks.push(block);
            reader.frames_read += 1;
        }
        let frames: Vec<Vec<i16>> = blocks
            .par_iter()
            .map(|block| crate::codec::rvl::decode(block, frame_size))
            .collect::<Result<_>>()?;
        for frame in &frames {
            data.extend_from_slice(frame);
        }
        return FrameStack::with_dtype(shape, dtype, data);
    }

    while let Some(frame) = reader.next_frame()? {
        data.extend_from_slice(&frame);
    }
    FrameStack::with_dtype(shape, dtype, data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecKind, Encoder, TrvlConfig, TrvlDecoder};
    use crate::container::writer::save;

    fn sample_stack() -> FrameStack {
        FrameStack::from_frames(
            &[2, 3],
            [
                [0i16, 0, 500, 501, 502, 0],
                [0, 0, 500, 520, 502, 7],
                [1, 1, 1, 1, 1, 1],
            ],
        )
        .unwrap()
    }

    #[test]
    fn load_inverts_save() {
        let stack = sample_stack();
        for mut enc in [
            Encoder::rvl(6).unwrap(),
            Encoder::trvl(6, TrvlConfig::lossless()).unwrap(),
        ] {
            let bytes = save(&stack, &mut enc).unwrap();
            assert_eq!(load(&bytes, None).unwrap(), stack);
        }
    }

    #[test]
    fn iterator_yields_every_frame() {
        let stack = sample_stack();
        let bytes = save(&stack, &mut Encoder::rvl(6).unwrap()).unwrap();
        let reader = ContainerReader::new(&bytes[..], None).unwrap();
        assert_eq!(reader.header().codec(), CodecKind::Rvl);
        let frames: Vec<Vec<i16>> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1], stack.frame(1).unwrap());
    }

    #[test]
    fn codec_mismatch_reported() {
        let bytes = save(&sample_stack(), &mut Encoder::rvl(6).unwrap()).unwrap();
        let trvl = Decoder::Trvl(TrvlDecoder::new(6).unwrap());
        match load(&bytes, Some(trvl)) {
            Err(CodecError::CodecMismatch { stored, requested }) => {
                assert_eq!(stored, "RVL");
                assert_eq!(requested, "TRVL");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn truncation_is_corrupt() {
        let bytes = save(&sample_stack(), &mut Encoder::rvl(6).unwrap()).unwrap();
        let header_len = read_header(&bytes).unwrap().to_line().len();

        // Missing whole records, a partial prefix, a partial block.
        for cut in [header_len, header_len + 2, bytes.len() - 1] {
            assert!(
                matches!(load(&bytes[..cut], None), Err(CodecError::CorruptStream(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn extra_and_oversized_records_are_corrupt() {
        let mut bytes = save(&sample_stack(), &mut Encoder::rvl(6).unwrap()).unwrap();
        let mut extra = bytes.clone();
        extra.extend_from_slice(&[0, 0, 0, 1, 0b0011_0000]);
        assert!(matches!(load(&extra, None), Err(CodecError::CorruptStream(_))));

        let header_len = read_header(&bytes).unwrap().to_line().len();
        bytes[header_len..header_len + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(load(&bytes, None), Err(CodecError::CorruptStream(_))));
    }

    #[test]
    fn empty_container_loads() {
        let stack = FrameStack::new(vec![0, 4, 4], Vec::new()).unwrap();
        let bytes = save(&stack, &mut Encoder::rvl(16).unwrap()).unwrap();
        assert_eq!(bytes, b"!(0, 4, 4); int16; RVL\n");
        assert_eq!(load(&bytes, None).unwrap(), stack);
    }
}
