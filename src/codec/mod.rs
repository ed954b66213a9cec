// Depth-frame codecs.
//
// # Modules
//
// - `bitstream`  MSB-first bit writer/reader
// - `vle`        nibble variable-length integers and zig-zag mapping
// - `runs`       alternating skip-run / entry block layout
// - `rvl`        stateless single-frame codec
// - `trvl`       stateful temporal codec
//
// `Encoder` and `Decoder` close over the two codecs so callers (and the
// container) can dispatch on the wire name without trait objects.

pub mod bitstream;
pub mod runs;
pub mod rvl;
pub mod trvl;
pub mod vle;

use std::fmt;
use std::str::FromStr;

use crate::error::{CodecError, Result};

pub use rvl::{RVL_NAME, RvlDecoder, RvlEncoder};
pub use trvl::{TRVL_NAME, TrvlConfig, TrvlDecoder, TrvlEncoder};

// ---------------------------------------------------------------------------
// Codec identifier
// ---------------------------------------------------------------------------

/// Codec family, as named in container headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    Rvl,
    Trvl,
}

impl CodecKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Rvl => RVL_NAME,
            Self::Trvl => TRVL_NAME,
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            RVL_NAME => Ok(Self::Rvl),
            TRVL_NAME => Ok(Self::Trvl),
            other => Err(CodecError::corrupt(format!("unknown codec name '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Any encoder the container can drive.
#[derive(Debug, Clone)]
pub enum Encoder {
    Rvl(RvlEncoder),
    Trvl(TrvlEncoder),
}

impl Encoder {
    pub fn rvl(frame_size: usize) -> Result<Self> {
        RvlEncoder::new(frame_size).map(Self::Rvl)
    }

    pub fn trvl(frame_size: usize, config: TrvlConfig) -> Result<Self> {
        TrvlEncoder::new(frame_size, config).map(Self::Trvl)
    }

    pub fn kind(&self) -> CodecKind {
        match self {
            Self::Rvl(_) => CodecKind::Rvl,
            Self::Trvl(_) => CodecKind::Trvl,
        }
    }

    /// Wire name written to container headers.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn frame_size(&self) -> usize {
        match self {
            Self::Rvl(e) => e.frame_size(),
            Self::Trvl(e) => e.frame_size(),
        }
    }

    /// Encode the next frame. For TRVL this advances the session.
    pub fn encode(&mut self, frame: &[i16]) -> Result<Vec<u8>> {
        match self {
            Self::Rvl(e) => e.encode(frame),
            Self::Trvl(e) => e.encode(frame),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Any decoder the container can drive.
#[derive(Debug, Clone)]
pub enum Decoder {
    Rvl(RvlDecoder),
    Trvl(TrvlDecoder),
}

impl Decoder {
    /// Build a fresh decoder for `kind`; TRVL needs nothing beyond the frame size.
    pub fn for_kind(kind: CodecKind, frame_size: usize) -> Result<Self> {
        match kind {
            CodecKind::Rvl => RvlDecoder::new(frame_size).map(Self::Rvl),
            CodecKind::Trvl => TrvlDecoder::new(frame_size).map(Self::Trvl),
        }
    }

    pub fn kind(&self) -> CodecKind {
        match self {
            Self::Rvl(_) => CodecKind::Rvl,
            Self::Trvl(_) => CodecKind::Trvl,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn frame_size(&self) -> usize {
        match self {
            Self::Rvl(d) => d.frame_size(),
            Self::Trvl(d) => d.frame_size(),
        }
    }

    /// Decode the next block. For TRVL this advances the session.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<i16>> {
        match self {
            Self::Rvl(d) => d.decode(block),
            Self::Trvl(d) => d.decode(block),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for kind in [CodecKind::Rvl, CodecKind::Trvl] {
            assert_eq!(kind.name().parse::<CodecKind>().unwrap(), kind);
        }
        assert_eq!(CodecKind::Trvl.to_string(), "TRVL");
        assert!("rvl".parse::<CodecKind>().is_err());
    }

    #[test]
    fn dispatch_matches_direct_calls() {
        let frame = [0, 12, 12, 0, 900, -3];
        let mut enc = Encoder::rvl(6).unwrap();
        assert_eq!(enc.encode(&frame).unwrap(), rvl::encode(&frame));

        let mut enc = Encoder::trvl(6, TrvlConfig::lossless()).unwrap();
        let mut dec = Decoder::for_kind(CodecKind::Trvl, 6).unwrap();
        assert_eq!(enc.name(), dec.name());
        let block = enc.encode(&frame).unwrap();
        assert_eq!(dec.decode(&block).unwrap(), frame);
    }

    #[test]
    fn sessions_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Encoder>();
        assert_send::<Decoder>();
    }
}
