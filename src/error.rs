//! The error taxonomy shared by every component in this crate.
//!
//! Construction errors unwind immediately and leave whatever was written of
//! the output file in place (the caller is expected to delete it, see the
//! build-time error semantics in the block-compressed EIS builder). Query
//! errors are returned from `open` and from any query that can observe
//! corrupt bytes; there is no recoverable failure mode once a bucket is
//! known to be corrupt.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An unsupported block/alphabet/stride combination was requested.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The on-disk format did not parse: bad magic, unknown tag, a
    /// composition index out of range, or an unexpected end of header.
    #[error("format corruption: {0}")]
    FormatCorruption(String),

    #[error(transparent)]
    IntegrityMismatch(#[from] IntegrityError),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::FormatCorruption(msg.into())
    }
}

/// Discrepancies the integrity verifier can detect between an index and an
/// independently supplied reference suffix array.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("sequence length mismatch: index reports {index}, reference reports {reference}")]
    LengthMismatch { index: usize, reference: usize },

    #[error(
        "locate mismatch at bwt position {bwt_pos}: index says {got}, reference says {expected}"
    )]
    LocateMismatch {
        bwt_pos: usize,
        got: usize,
        expected: usize,
    },

    #[error("terminator position mismatch: index says {got}, reference says {expected}")]
    TerminatorMismatch { got: usize, expected: usize },

    #[error(
        "LF-walk symbol mismatch at step {step}: index produced {got}, reference expected {expected}"
    )]
    LfWalkMismatch { step: usize, got: u8, expected: u8 },

    #[error(
        "context regeneration mismatch at text position {pos}: index produced {got}, reference expected {expected}"
    )]
    ContextMismatch { pos: usize, got: u8, expected: u8 },

    #[error("failed to load any context map file for base path {base}")]
    ContextMapLoadFailure { base: String },

    #[error("LF-walk requested on an index without the reversibility flag")]
    NotReversible,
}

pub type Result<T> = std::result::Result<T, Error>;
