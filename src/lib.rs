//! Oxidepth: lossless and lossy compression of 16-bit depth frames.
//!
//! The crate provides:
//! - RVL, a stateless run-length / variable-length codec (`codec::rvl`)
//! - TRVL, its temporal extension with per-pixel change detection (`codec::trvl`)
//! - A self-describing multi-frame container (`container`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use oxidepth::codec::{Encoder, TrvlConfig};
//! use oxidepth::container::{self, FrameStack};
//!
//! let frames = [[0i16, 0, 812, 815], [0, 0, 812, 840]];
//! let stack = FrameStack::from_frames(&[2, 2], frames).unwrap();
//!
//! let mut encoder = Encoder::trvl(4, TrvlConfig::default()).unwrap();
//! let bytes = container::save(&stack, &mut encoder).unwrap();
//! let decoded = container::load(&bytes, None).unwrap();
//! assert_eq!(decoded.shape(), stack.shape());
//! ```

pub mod codec;
pub mod container;
pub mod error;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use codec::{CodecKind, Decoder, Encoder};
pub use error::{CodecError, Result};
