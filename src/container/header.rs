// Container header line.
//
//   !{shape}; {dtype}; {codec_name}\n
//
// `shape` is a tuple such as `(3, 480, 640)`: the first dimension counts
// frames, the remaining ones multiply to the per-frame pixel count.
// `dtype` is an opaque element tag carried byte-for-byte.

use std::io::{ErrorKind, Read, Write};

use log::debug;

use crate::codec::CodecKind;
use crate::error::{CodecError, Result};

pub const HEADER_MARKER: u8 = b'!';
pub const HEADER_SEPARATOR: char = ';';

/// Element tag written when the caller does not supply one.
pub const DTYPE_INT16: &str = "int16";

/// Longest header line accepted when reading.
pub const MAX_HEADER_LEN: usize = 4096;

/// Parsed container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    shape: Vec<usize>,
    dtype: String,
    codec: CodecKind,
}

impl ContainerHeader {
    pub fn new(shape: Vec<usize>, dtype: impl Into<String>, codec: CodecKind) -> Result<Self> {
        let dtype = dtype.into();
        check_shape(&shape).map_err(CodecError::InvalidArgument)?;
        check_dtype(&dtype).map_err(CodecError::InvalidArgument)?;
        Ok(Self {
            shape,
            dtype,
            codec,
        })
    }

    /// Build from a shape and dtype that already passed `new`'s checks.
    pub(crate) fn from_validated(shape: Vec<usize>, dtype: String, codec: CodecKind) -> Self {
        debug_assert!(check_shape(&shape).is_ok() && check_dtype(&dtype).is_ok());
        Self {
            shape,
            dtype,
            codec,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> &str {
        &self.dtype
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    /// Number of frame records the container declares.
    pub fn frame_count(&self) -> usize {
        self.shape[0]
    }

    /// Pixels per frame.
    pub fn frame_size(&self) -> usize {
        // Checked at construction.
        self.shape[1..].iter().product()
    }

    /// The header line, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{}{}{HEADER_SEPARATOR} {}{HEADER_SEPARATOR} {}\n",
            HEADER_MARKER as char,
            format_shape(&self.shape),
            self.dtype,
            self.codec.name()
        )
    }

    /// Write the header line.
    pub fn encode<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(self.to_line().as_bytes())
    }

    /// Read and parse a header line, consuming exactly through its newline.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self> {
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];
        loop {
            match r.read(&mut byte) {
                Ok(0) => return Err(CodecError::corrupt("container header is not terminated")),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
            if line.len() > MAX_HEADER_LEN {
                return Err(CodecError::corrupt(format!(
                    "container header exceeds {MAX_HEADER_LEN} bytes"
                )));
            }
        }
        let line = std::str::from_utf8(&line)
            .ok()
            .filter(|s| s.is_ascii())
            .ok_or_else(|| CodecError::corrupt("container header is not ASCII"))?;
        let header = Self::parse_line(line)?;
        debug!(
            "container: header shape {}, dtype {}, codec {}",
            format_shape(&header.shape),
            header.dtype,
            header.codec
        );
        Ok(header)
    }

    /// Parse a header line with or without its trailing newline.
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let body = line
            .strip_prefix(HEADER_MARKER as char)
            .ok_or_else(|| CodecError::corrupt("container header must start with '!'"))?;

        let fields: Vec<&str> = body.split(HEADER_SEPARATOR).map(str::trim).collect();
        let [shape, dtype, codec] = fields.as_slice() else {
            return Err(CodecError::corrupt(format!(
                "container header has {} fields, expected 3",
                fields.len()
            )));
        };

        let shape = parse_shape(shape)?;
        check_shape(&shape).map_err(CodecError::CorruptStream)?;
        check_dtype(dtype).map_err(CodecError::CorruptStream)?;
        let codec = codec.parse::<CodecKind>()?;
        Ok(Self {
            shape,
            dtype: (*dtype).to_string(),
            codec,
        })
    }
}

// ---------------------------------------------------------------------------
// Shape tuples
// ---------------------------------------------------------------------------

/// Tuple notation: `(3, 480, 640)`, or `(3,)` for a single dimension.
pub fn format_shape(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
    if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    }
}

/// Parse tuple notation; tolerates a trailing comma and missing spaces.
pub fn parse_shape(s: &str) -> Result<Vec<usize>> {
    let inner = s
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| CodecError::corrupt(format!("shape '{s}' is not a tuple")))?;

    let mut parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.last() == Some(&"") {
        parts.pop();
    }
    parts
        .into_iter()
        .map(|p| {
            p.parse::<usize>()
                .map_err(|e| CodecError::corrupt(format!("shape dimension '{p}': {e}")))
        })
        .collect()
}

fn check_shape(shape: &[usize]) -> std::result::Result<(), String> {
    if shape.len() < 2 {
        return Err(format!(
            "shape {} needs a frame dimension plus at least one pixel dimension",
            format_shape(shape)
        ));
    }
    let frame_size = shape[1..]
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format!("shape {} overflows", format_shape(shape)))?;
    if frame_size == 0 {
        return Err(format!("shape {} has no pixels per frame", format_shape(shape)));
    }
    // One frame of i16 pixels must fit in a single allocation.
    if frame_size > isize::MAX as usize / std::mem::size_of::<i16>() {
        return Err(format!(
            "shape {} has more pixels per frame than can be addressed",
            format_shape(shape)
        ));
    }
    // The whole stack must be addressable as one buffer.
    frame_size
        .checked_mul(shape[0])
        .ok_or_else(|| format!("shape {} overflows", format_shape(shape)))?;
    Ok(())
}

fn check_dtype(dtype: &str) -> std::result::Result<(), String> {
    let ok = !dtype.is_empty()
        && dtype.is_ascii()
        && !dtype.contains(HEADER_SEPARATOR)
        && !dtype.chars().any(|c| c.is_ascii_control())
        && dtype.trim() == dtype;
    if ok {
        Ok(())
    } else {
        Err(format!("invalid dtype tag '{dtype}'"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn line_format() {
        let h = ContainerHeader::new(vec![3, 480, 640], DTYPE_INT16, CodecKind::Trvl).unwrap();
        assert_eq!(h.to_line(), "!(3, 480, 640); int16; TRVL\n");
        assert_eq!(h.frame_count(), 3);
        assert_eq!(h.frame_size(), 480 * 640);
    }

    #[test]
    fn decode_stops_at_newline() {
        let mut cur = Cursor::new(b"!(2, 4); float16; RVL\n\x00\x00\x00\x01".to_vec());
        let h = ContainerHeader::decode(&mut cur).unwrap();
        assert_eq!(h.shape(), &[2, 4]);
        assert_eq!(h.dtype(), "float16");
        assert_eq!(h.codec(), CodecKind::Rvl);
        assert_eq!(cur.position(), 22);
    }

    #[test]
    fn shape_forms() {
        assert_eq!(parse_shape("(5,)").unwrap(), vec![5]);
        assert_eq!(parse_shape("(1,2,3)").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_shape(" ( 7 , 8 ) ").unwrap(), vec![7, 8]);
        assert_eq!(format_shape(&[5]), "(5,)");
        assert!(parse_shape("[1, 2]").is_err());
        assert!(parse_shape("(1, x)").is_err());
    }

    #[test]
    fn malformed_lines_are_corrupt() {
        for line in [
            "(2, 4); int16; RVL",
            "!(2, 4); int16",
            "!(2, 4); int16; RVL; extra",
            "!(2, 0); int16; RVL",
            "!(2,); int16; RVL",
            "!(2, 4); ; RVL",
            "!(2, 4); int16; LZ4",
            "!(1, 4611686018427387904); int16; RVL",
            "!(1, 2, 2305843009213693952); int16; TRVL",
        ] {
            assert!(
                matches!(
                    ContainerHeader::parse_line(line),
                    Err(CodecError::CorruptStream(_))
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn unterminated_and_oversized_headers() {
        let mut cur = Cursor::new(b"!(2, 4); int16; RVL".to_vec());
        assert!(matches!(
            ContainerHeader::decode(&mut cur),
            Err(CodecError::CorruptStream(_))
        ));

        let mut long = vec![b'!'; MAX_HEADER_LEN + 10];
        long.push(b'\n');
        assert!(matches!(
            ContainerHeader::decode(&mut Cursor::new(long)),
            Err(CodecError::CorruptStream(_))
        ));
    }

    /// Reader that fails with `Interrupted` before every successful read.
    struct Flaky<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Flaky<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn decode_retries_interrupted_reads() {
        let mut r = Flaky {
            data: b"!(2, 4); int16; TRVL\n",
            interrupt: false,
        };
        let h = ContainerHeader::decode(&mut r).unwrap();
        assert_eq!(h.codec(), CodecKind::Trvl);
        assert_eq!(h.frame_size(), 4);
    }

    #[test]
    fn constructor_validates() {
        assert!(matches!(
            ContainerHeader::new(vec![4], DTYPE_INT16, CodecKind::Rvl),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            ContainerHeader::new(vec![1, 2], "in;t", CodecKind::Rvl),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(ContainerHeader::new(vec![0, 2, 2], DTYPE_INT16, CodecKind::Rvl).is_ok());
    }
}
