// Depth-frame container.
//
// A single ASCII header line followed by length-prefixed codec blocks:
//
//   !(3, 480, 640); int16; TRVL\n
//   [u32 BE len][block] [u32 BE len][block] ...
//
// `save`/`load` work on whole in-memory stacks; `ContainerWriter` and
// `ContainerReader` stream one frame at a time.

pub mod header;
pub mod reader;
pub mod stack;
pub mod writer;

pub use header::{ContainerHeader, DTYPE_INT16, format_shape, parse_shape};
pub use reader::{ContainerReader, load, read_header};
pub use stack::FrameStack;
pub use writer::{ContainerWriter, RECORD_PREFIX_LEN, save};
