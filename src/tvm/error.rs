//! Error types shared by the cell model, the BoC codec and the TL-B layer.

use thiserror::Error;

/// Result alias used across the `tvm` and `models` modules.
pub type Result<T> = std::result::Result<T, CellError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("value does not fit in {bits} bits")]
    OutOfRange { bits: usize },
    #[error("cell overflow: {bits} bits and {refs} references requested (max 1023 bits, 4 references)")]
    Overflow { bits: usize, refs: usize },
    #[error("cell underrun: requested {requested} {what}, {available} available")]
    Underrun {
        what: &'static str,
        requested: usize,
        available: usize,
    },
    #[error("malformed bag of cells: {0}")]
    MalformedBoc(#[from] BocError),
    #[error("unknown {ty} tag {tag:#b}")]
    UnknownVariant { ty: &'static str, tag: u64 },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("invalid cell: {0}")]
    InvalidCell(&'static str),
    #[error("invalid dictionary key: expected {expected} bits, got {actual}")]
    InvalidKey { expected: usize, actual: usize },
    #[error("dictionary key {0} is a prefix of another key or extends one")]
    KeyPrefixConflict(String),
}

impl CellError {
    pub(crate) fn bits_underrun(requested: usize, available: usize) -> Self {
        Self::Underrun {
            what: "bits",
            requested,
            available,
        }
    }

    pub(crate) fn refs_underrun(requested: usize, available: usize) -> Self {
        Self::Underrun {
            what: "references",
            requested,
            available,
        }
    }
}

/// Structural violations found while decoding a bag of cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BocError {
    #[error("unknown magic {0:#010x}")]
    UnknownMagic(u32),
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("invalid reference size {0}")]
    InvalidRefSize(usize),
    #[error("invalid offset size {0}")]
    InvalidOffsetSize(usize),
    #[error("bag has no roots")]
    NoRoots,
    #[error("unexpected root count {0}")]
    UnexpectedRootCount(usize),
    #[error("cell count {0} exceeds the limit")]
    TooManyCells(usize),
    #[error("root index {0} is out of bounds")]
    RootOutOfBounds(usize),
    #[error("absent cells are not supported")]
    AbsentCellsUnsupported,
    #[error("cell {cell} references index {reference}")]
    InvalidReference { cell: usize, reference: usize },
    #[error("cell {0} has more than 4 references")]
    TooManyReferences(usize),
    #[error("cell {0} has more than 1023 bits")]
    BitLenTooLarge(usize),
    #[error("cell {0} has an invalid completion tag")]
    InvalidPadding(usize),
    #[error("cell {0} does not match the offset index")]
    InvalidIndex(usize),
    #[error("cell {0} stored hashes do not match")]
    HashMismatch(usize),
    #[error("cell {0} is a pruned branch with stored hashes")]
    PrunedBranchWithHashes(usize),
    #[error("cell {cell} is invalid: {reason}")]
    InvalidCell { cell: usize, reason: &'static str },
    #[error("checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("{0} trailing bytes after cells")]
    TrailingData(usize),
    #[error("invalid textual encoding: {0}")]
    InvalidText(String),
}
