// A shaped stack of depth frames held in one flat buffer.

use std::slice::ChunksExact;

use super::header::{ContainerHeader, DTYPE_INT16};
use crate::codec::CodecKind;
use crate::error::{CodecError, Result};

/// Frames of equal size stored back to back, with the shape and element
/// tag that describe them in a container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStack {
    shape: Vec<usize>,
    dtype: String,
    data: Vec<i16>,
}

impl FrameStack {
    /// `shape[0]` frames of `shape[1..].product()` pixels each, tagged `int16`.
    pub fn new(shape: Vec<usize>, data: Vec<i16>) -> Result<Self> {
        Self::with_dtype(shape, DTYPE_INT16, data)
    }

    pub fn with_dtype(shape: Vec<usize>, dtype: impl Into<String>, data: Vec<i16>) -> Result<Self> {
        // Reuse the header's shape/dtype rules; the codec is irrelevant here.
        let header = ContainerHeader::new(shape, dtype, CodecKind::Rvl)?;
        let expected = header.frame_count() * header.frame_size();
        if data.len() != expected {
            return Err(CodecError::invalid(format!(
                "shape holds {expected} pixels, data has {}",
                data.len()
            )));
        }
        Ok(Self {
            shape: header.shape().to_vec(),
            dtype: header.dtype().to_string(),
            data,
        })
    }

    /// Stack individual frames under a per-frame shape such as `[height, width]`.
    pub fn from_frames<I>(frame_shape: &[usize], frames: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[i16]>,
    {
        let frame_size: usize = frame_shape.iter().product();
        let mut data = Vec::new();
        let mut count = 0usize;
        for frame in frames {
            let frame = frame.as_ref();
            if frame.len() != frame_size {
                return Err(CodecError::invalid(format!(
                    "frame {count} has {} pixels, expected {frame_size}",
                    frame.len()
                )));
            }
            data.extend_from_slice(frame);
            count += 1;
        }
        let mut shape = Vec::with_capacity(frame_shape.len() + 1);
        shape.push(count);
        shape.extend_from_slice(frame_shape);
        Self::new(shape, data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> &str {
        &self.dtype
    }

    pub fn frame_count(&self) -> usize {
        self.shape[0]
    }

    pub fn frame_size(&self) -> usize {
        self.shape[1..].iter().product()
    }

    /// Frame `index`, or `None` past the end.
    pub fn frame(&self, index: usize) -> Option<&[i16]> {
        self.frames().nth(index)
    }

    pub fn frames(&self) -> ChunksExact<'_, i16> {
        self.data.chunks_exact(self.frame_size())
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    /// Header describing this stack when written with `codec`.
    pub fn header(&self, codec: CodecKind) -> ContainerHeader {
        ContainerHeader::from_validated(self.shape.clone(), self.dtype.clone(), codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_frames_builds_shape() {
        let stack = FrameStack::from_frames(&[2, 2], [[1i16, 2, 3, 4], [5, 6, 7, 8]]).unwrap();
        assert_eq!(stack.shape(), &[2, 2, 2]);
        assert_eq!(stack.frame_size(), 4);
        assert_eq!(stack.frame(1), Some(&[5, 6, 7, 8][..]));
        assert_eq!(stack.frame(2), None);
        assert_eq!(stack.frames().count(), 2);
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(matches!(
            FrameStack::new(vec![2, 3], vec![0; 5]),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            FrameStack::from_frames(&[3], [vec![1i16, 2, 3], vec![1, 2]]),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn dtype_is_kept() {
        let stack = FrameStack::with_dtype(vec![1, 2], "float16", vec![0x3C00, 0]).unwrap();
        assert_eq!(stack.dtype(), "float16");
        assert_eq!(stack.header(CodecKind::Trvl).to_line(), "!(1, 2); float16; TRVL\n");
    }
}
