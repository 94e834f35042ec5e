//! TVM (TON Virtual Machine) data structures and utilities
//!
//! This module provides implementations of fundamental TON blockchain data structures:
//! - BitString: bit-exact storage with TON's completion-tag padding
//! - Cell: up to 1023 bits and 4 references, with level-aware hashes and depths
//! - CellBuilder / CellSlice: writing and reading cell contents
//! - BoC: Bag of Cells serialization format for encoding cells into byte arrays
//! - Dict: the Hashmap / HashmapE binary trie
//! - AugDict / PfxDict: augmented and prefix-free variants on the same labels
//! - Address: textual forms of standard internal addresses

pub mod address;
pub mod bitstring;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod dict;
pub mod dict_aug;
pub mod dict_pfx;
pub mod error;
pub mod exotic;
pub mod slice;
#[cfg(test)]
mod tests;

pub use address::{Address, AddressError};
pub use bitstring::BitString;
pub use boc::{
    BocOptions, DecodeOptions, base64_to_boc, boc_to_base64, boc_to_hex, deserialize_boc,
    deserialize_boc_ext, deserialize_boc_multi, hex_to_boc, serialize_boc, serialize_boc_ext,
};
pub use builder::CellBuilder;
pub use cell::{
    ArcCell, Cell, CellHash, CellType, LevelMask, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_LEVEL,
    MAX_CELL_REFS,
};
pub use dict::{Dict, DictIter, int_key, uint_key};
pub use dict_aug::{AugDict, AugDictIter, AugExtra};
pub use dict_pfx::{PfxDict, PfxDictIter};
pub use error::{BocError, CellError};
pub use exotic::{library_reference, merkle_proof, merkle_proof_root_hash, merkle_update, pruned_branch};
pub use slice::CellSlice;
