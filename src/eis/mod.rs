//! The block-compressed enhanced indexed sequence: an on-disk,
//! composition/permutation-encoded representation of a BWT symbol stream
//! supporting `rank` and `get`.

pub mod builder;
pub mod header;
pub mod reader;

pub use builder::{BuiltIndex, EisBuilder};
pub use header::Header;
pub use reader::{EisReader, Hint};
