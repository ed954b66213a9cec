// File-level helpers for raw depth frames.
//
// Provides `encode_file()` and `decode_file()` that convert between a raw
// file of little-endian `i16` frames and a container, with buffered I/O.
// A streaming SHA-256 of the container bytes is computed when the
// `file-io` feature is enabled.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::codec::{CodecKind, Decoder, Encoder};
use crate::container::{ContainerHeader, ContainerReader, ContainerWriter, DTYPE_INT16};
use crate::error::{CodecError, Result};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    /// Raw input size in bytes.
    pub raw_size: u64,
    /// Container output size in bytes, header included.
    pub container_size: u64,
    /// Frames written.
    pub frames: usize,
    /// Full container shape, frame count first.
    pub shape: Vec<usize>,
    pub codec: CodecKind,
    /// SHA-256 of the container (if `file-io` feature is enabled).
    pub container_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    /// Container input size in bytes.
    pub container_size: u64,
    /// Raw output size in bytes.
    pub raw_size: u64,
    pub frames: usize,
    pub shape: Vec<usize>,
    pub dtype: String,
    pub codec: CodecKind,
    /// SHA-256 of the container (if `file-io` feature is enabled).
    pub container_sha256: Option<[u8; 32]>,
}

impl EncodeStats {
    /// Container size over raw size.
    pub fn ratio(&self) -> f64 {
        ratio(self.container_size, self.raw_size)
    }
}

impl DecodeStats {
    pub fn ratio(&self) -> f64 {
        ratio(self.container_size, self.raw_size)
    }
}

fn ratio(compressed: u64, raw: u64) -> f64 {
    if raw == 0 {
        0.0
    } else {
        compressed as f64 / raw as f64
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// Raw frame bytes
// ---------------------------------------------------------------------------

/// Bytes per raw pixel.
pub const PIXEL_BYTES: usize = 2;

/// Reinterpret little-endian bytes as pixels. A trailing odd byte is ignored.
pub fn pixels_from_le_bytes(raw: &[u8]) -> Vec<i16> {
    raw.chunks_exact(PIXEL_BYTES)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Append the little-endian bytes of `pixels` to `out`.
pub fn pixels_to_le_bytes(pixels: &[i16], out: &mut Vec<u8>) {
    out.reserve(pixels.len() * PIXEL_BYTES);
    for p in pixels {
        out.extend_from_slice(&p.to_le_bytes());
    }
}

// ---------------------------------------------------------------------------
// encode_file
// ---------------------------------------------------------------------------

/// Encode a raw file of back-to-back frames into a container at `output_path`.
///
/// `frame_shape` is the per-frame shape (e.g. `[height, width]`); its
/// product must equal the encoder's frame size. The frame count is derived
/// from the input length, which must be a whole number of frames.
///
/// The encoder is borrowed so a TRVL session can continue across files.
pub fn encode_file(
    input_path: &Path,
    output_path: &Path,
    frame_shape: &[usize],
    encoder: &mut Encoder,
) -> Result<EncodeStats> {
    let frame_size = encoder.frame_size();
    if frame_shape.iter().product::<usize>() != frame_size || frame_shape.is_empty() {
        return Err(CodecError::invalid(format!(
            "frame shape {frame_shape:?} does not hold {frame_size} pixels"
        )));
    }

    let input = File::open(input_path)?;
    let raw_size = input.metadata()?.len();
    let frame_bytes = frame_size
        .checked_mul(PIXEL_BYTES)
        .ok_or_else(|| CodecError::invalid(format!("{frame_size} pixels per frame overflows")))?;
    if raw_size % frame_bytes as u64 != 0 {
        return Err(CodecError::invalid(format!(
            "input of {raw_size} bytes is not a whole number of {frame_bytes}-byte frames"
        )));
    }
    let frames = usize::try_from(raw_size / frame_bytes as u64)
        .map_err(|_| CodecError::invalid("input too large for this platform"))?;

    let mut shape = Vec::with_capacity(frame_shape.len() + 1);
    shape.push(frames);
    shape.extend_from_slice(frame_shape);
    let header = ContainerHeader::new(shape.clone(), DTYPE_INT16, encoder.kind())?;
    let codec = header.codec();

    let mut reader = BufReader::with_capacity(BUF_SIZE, input);
    let sink = Tap::new(BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?));
    let mut writer = ContainerWriter::new(sink, header, encoder)?;

    let mut raw = vec![0u8; frame_bytes];
    for _ in 0..frames {
        reader.read_exact(&mut raw)?;
        writer.write_frame(&pixels_from_le_bytes(&raw))?;
    }

    let (_, container_size, container_sha256) = writer.finish()?.into_parts();
    debug!(
        "encode_file: {frames} frames, {raw_size} -> {container_size} bytes ({})",
        codec
    );

    Ok(EncodeStats {
        raw_size,
        container_size,
        frames,
        shape,
        codec,
        container_sha256,
    })
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Decode a container file into raw little-endian frames at `output_path`.
///
/// With `decoder == None` the decoder is chosen from the container header.
pub fn decode_file(
    input_path: &Path,
    output_path: &Path,
    decoder: Option<Decoder>,
) -> Result<DecodeStats> {
    let input = File::open(input_path)?;
    let source = Tap::new(BufReader::with_capacity(BUF_SIZE, input));
    let mut reader = ContainerReader::new(source, decoder)?;
    let header = reader.header().clone();

    // From here on the output exists; a failure removes it again.
    let output = File::create(output_path)?;
    let raw_size = match write_frames(&mut reader, output) {
        Ok(n) => n,
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(output_path) {
                debug!("decode_file: removing {}: {rm}", output_path.display());
            }
            return Err(e);
        }
    };

    let frames = reader.frames_read();
    let (_, container_size, container_sha256) = reader.into_inner().into_parts();
    debug!(
        "decode_file: {frames} frames, {container_size} -> {raw_size} bytes ({})",
        header.codec()
    );

    Ok(DecodeStats {
        container_size,
        raw_size,
        frames,
        shape: header.shape().to_vec(),
        dtype: header.dtype().to_string(),
        codec: header.codec(),
        container_sha256,
    })
}

/// Stream every remaining frame to `output`; returns the raw bytes written.
fn write_frames<R: Read>(reader: &mut ContainerReader<R>, output: File) -> Result<u64> {
    let mut output_writer = BufWriter::with_capacity(BUF_SIZE, output);
    let mut raw = Vec::new();
    let mut raw_size = 0u64;
    while let Some(frame) = reader.next_frame()? {
        raw.clear();
        pixels_to_le_bytes(&frame, &mut raw);
        output_writer.write_all(&raw)?;
        raw_size += raw.len() as u64;
    }
    output_writer.flush()?;
    Ok(raw_size)
}

// ---------------------------------------------------------------------------
// Counting/hashing tap over the container stream
// ---------------------------------------------------------------------------

/// Passes bytes through while counting them and, with `file-io`, hashing them.
struct Tap<T> {
    inner: T,
    bytes: u64,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<T> Tap<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            bytes: 0,
            #[cfg(feature = "file-io")]
            hasher: sha2::Sha256::new(),
        }
    }

    fn record(&mut self, data: &[u8]) {
        self.bytes += data.len() as u64;
        #[cfg(feature = "file-io")]
        self.hasher.update(data);
    }

    fn into_parts(self) -> (T, u64, Option<[u8; 32]>) {
        #[cfg(feature = "file-io")]
        let digest = Some(self.hasher.finalize().into());
        #[cfg(not(feature = "file-io"))]
        let digest: Option<[u8; 32]> = None;
        (self.inner, self.bytes, digest)
    }
}

impl<W: Write> Write for Tap<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.record(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<R: Read> Read for Tap<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.record(&buf[..n]);
        Ok(n)
    }
}

/// Lowercase hex of a digest, for display.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
