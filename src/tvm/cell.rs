//! Cell implementation for TON blockchain
//!
//! A cell is a fundamental data structure in TON that can store up to 1023 bits
//! of data and maintain up to 4 references to other cells. Cells are immutable:
//! hashes and depths for every significant level are computed once, when the
//! cell is created, from the already finalized children.

use crate::tvm::bitstring::BitString;
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::ops::BitOr;
use std::sync::Arc;

/// Maximum number of bits a cell can store
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have
pub const MAX_CELL_REFS: usize = 4;

/// Cell level range (0-3)
pub const MAX_CELL_LEVEL: u8 = 3;

/// Maximum depth of a cell tree
pub const MAX_CELL_DEPTH: u16 = 1024;

/// Shared, immutable cell handle
pub type ArcCell = Arc<Cell>;

/// 256-bit cell hash
pub type CellHash = [u8; 32];

const HASH_BYTES: usize = 32;
const DEPTH_BYTES: usize = 2;

/// Cell kind. Exotic kinds are identified by the first byte of their data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    Ordinary,
    PrunedBranch,
    LibraryReference,
    MerkleProof,
    MerkleUpdate,
}

impl CellType {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::PrunedBranch),
            2 => Some(Self::LibraryReference),
            3 => Some(Self::MerkleProof),
            4 => Some(Self::MerkleUpdate),
            _ => None,
        }
    }

    /// Type byte stored at the start of exotic cell data (0xff for ordinary)
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Ordinary => 0xff,
            Self::PrunedBranch => 1,
            Self::LibraryReference => 2,
            Self::MerkleProof => 3,
            Self::MerkleUpdate => 4,
        }
    }

    pub const fn is_exotic(self) -> bool {
        !matches!(self, Self::Ordinary)
    }

    pub const fn is_merkle(self) -> bool {
        matches!(self, Self::MerkleProof | Self::MerkleUpdate)
    }
}

/// Set of Merkle levels at which a cell has a distinct hash.
///
/// Bit `i` is set when the cell's hash changes at level `i + 1`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const EMPTY: Self = Self(0);

    /// Constructs a level mask, truncating extra bits
    pub const fn new(mask: u8) -> Self {
        Self(mask & 0b111)
    }

    /// Smallest mask that covers every level up to `level`
    pub const fn from_level(level: u8) -> Self {
        Self(match level {
            0 => 0,
            1 => 1,
            2 => 3,
            _ => 7,
        })
    }

    pub const fn mask(self) -> u8 {
        self.0
    }

    /// Highest level present in the mask
    pub const fn level(self) -> u8 {
        8 - self.0.leading_zeros() as u8
    }

    /// Number of distinct hashes a cell with this mask has
    pub const fn hash_count(self) -> usize {
        self.0.count_ones() as usize + 1
    }

    /// Index into the hash array for the given level
    pub const fn hash_index(self, level: u8) -> usize {
        self.apply(level).0.count_ones() as usize
    }

    /// Mask truncated to levels below or equal to `level`
    pub const fn apply(self, level: u8) -> Self {
        Self(self.0 & Self::from_level(level).0)
    }

    /// Whether a hash must be computed for `level`
    pub const fn is_significant(self, level: u8) -> bool {
        level == 0 || (self.0 >> (level - 1)) & 1 != 0
    }

    /// Mask as seen from a parent that shifts levels by `offset`
    pub const fn virtualize(self, offset: u8) -> Self {
        Self(self.0 >> offset)
    }
}

impl BitOr for LevelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for LevelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03b}", self.0)
    }
}

/// Represents a cell in the TON blockchain
#[derive(Clone)]
pub struct Cell {
    bits: BitString,
    references: Vec<ArcCell>,
    cell_type: CellType,
    level_mask: LevelMask,
    hashes: Vec<CellHash>,
    depths: Vec<u16>,
}

impl Cell {
    /// Creates a cell, validating its layout and computing its hashes.
    ///
    /// For exotic cells the kind is taken from the first data byte.
    pub fn new(bits: BitString, references: Vec<ArcCell>, is_exotic: bool) -> Result<Self> {
        if bits.len() > MAX_CELL_BITS || references.len() > MAX_CELL_REFS {
            return Err(CellError::Overflow {
                bits: bits.len(),
                refs: references.len(),
            });
        }

        let children_mask = references
            .iter()
            .fold(LevelMask::EMPTY, |acc, r| acc | r.level_mask);

        let (cell_type, level_mask) = if is_exotic {
            resolve_exotic(&bits, &references, children_mask)?
        } else {
            (CellType::Ordinary, children_mask)
        };

        let mut cell = Self {
            bits,
            references,
            cell_type,
            level_mask,
            hashes: Vec::new(),
            depths: Vec::new(),
        };
        cell.compute_hashes()?;
        Ok(cell)
    }

    /// Creates an ordinary leaf cell with the given data and bit length
    pub fn with_data(data: Vec<u8>, bit_len: usize) -> Result<Self> {
        Self::new(BitString::from_raw(data, bit_len)?, Vec::new(), false)
    }

    /// Returns a new empty ordinary cell
    pub fn empty() -> ArcCell {
        Arc::new(Self {
            bits: BitString::new(),
            references: Vec::new(),
            cell_type: CellType::Ordinary,
            level_mask: LevelMask::EMPTY,
            hashes: vec![EMPTY_CELL_HASH],
            depths: vec![0],
        })
    }

    fn compute_hashes(&mut self) -> Result<()> {
        let level = self.level_mask.level();
        let hash_count = self.level_mask.hash_count();
        let is_pruned = self.cell_type == CellType::PrunedBranch;
        let first_computed = if is_pruned { hash_count - 1 } else { 0 };
        let level_offset = self.cell_type.is_merkle() as u8;

        let d2 = self.d2();
        let mut hashes = Vec::with_capacity(hash_count - first_computed);
        let mut depths = Vec::with_capacity(hash_count - first_computed);

        let mut hash_i = 0;
        for level_i in 0..=level {
            if !self.level_mask.is_significant(level_i) {
                continue;
            }
            if hash_i < first_computed {
                hash_i += 1;
                continue;
            }

            let mut hasher = Sha256::new();
            let d1 = self.d1_with_mask(self.level_mask.apply(level_i));
            hasher.update([d1, d2]);

            match hashes.last() {
                Some(prev) if hash_i != first_computed => hasher.update(prev),
                _ => hasher.update(self.bits.to_padded_bytes()),
            }

            let child_level = level_i + level_offset;
            let mut depth = 0u16;
            for child in &self.references {
                let child_depth = child.depth(child_level);
                hasher.update(child_depth.to_be_bytes());
                depth = depth.max(child_depth + 1);
            }
            if depth > MAX_CELL_DEPTH {
                return Err(CellError::InvalidCell("cell depth exceeds 1024"));
            }
            for child in &self.references {
                hasher.update(Cell::hash(child, child_level));
            }

            hashes.push(hasher.finalize().into());
            depths.push(depth);
            hash_i += 1;
        }

        self.hashes = hashes;
        self.depths = depths;
        Ok(())
    }

    fn d1_with_mask(&self, mask: LevelMask) -> u8 {
        self.references.len() as u8 + 8 * self.cell_type.is_exotic() as u8 + 32 * mask.mask()
    }

    fn d2(&self) -> u8 {
        let bit_len = self.bits.len();
        (bit_len / 8 + bit_len.div_ceil(8)) as u8
    }

    /// Computes the cell's descriptors (2 bytes)
    ///
    /// First byte: `refs + 8 * exotic + 32 * level_mask`,
    /// second byte: `floor(bits / 8) + ceil(bits / 8)`.
    pub fn descriptors(&self) -> [u8; 2] {
        [self.d1_with_mask(self.level_mask), self.d2()]
    }

    /// Serializes the cell data with the completion tag if needed
    pub fn serialize_data(&self) -> Vec<u8> {
        self.bits.to_padded_bytes()
    }

    /// Returns the cell's data bits
    pub fn bits(&self) -> &BitString {
        &self.bits
    }

    /// Returns the cell's data
    pub fn data(&self) -> &[u8] {
        self.bits.as_raw_data()
    }

    /// Returns the number of bits in the cell
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Returns the cell's references
    pub fn references(&self) -> &[ArcCell] {
        &self.references
    }

    /// Returns the number of references
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Gets a reference by index
    pub fn reference(&self, index: usize) -> Option<&ArcCell> {
        self.references.get(index)
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Returns whether this is an exotic (special) cell
    pub fn is_exotic(&self) -> bool {
        self.cell_type.is_exotic()
    }

    pub fn level_mask(&self) -> LevelMask {
        self.level_mask
    }

    /// Returns the cell's level
    pub fn level(&self) -> u8 {
        self.level_mask.level()
    }

    /// Hash of the cell as seen at the given Merkle level
    pub fn hash(&self, level: u8) -> CellHash {
        let index = self.level_mask.hash_index(level);
        if self.cell_type == CellType::PrunedBranch {
            if let Some(stored) = self.pruned_hash(index) {
                return stored;
            }
            return self.hashes[0];
        }
        self.hashes[index.min(self.hashes.len() - 1)]
    }

    /// Depth of the cell as seen at the given Merkle level
    pub fn depth(&self, level: u8) -> u16 {
        let index = self.level_mask.hash_index(level);
        if self.cell_type == CellType::PrunedBranch {
            if let Some(stored) = self.pruned_depth(index) {
                return stored;
            }
            return self.depths[0];
        }
        self.depths[index.min(self.depths.len() - 1)]
    }

    /// Representation hash (hash at the highest level)
    pub fn repr_hash(&self) -> CellHash {
        self.hash(MAX_CELL_LEVEL)
    }

    /// Representation depth
    pub fn repr_depth(&self) -> u16 {
        self.depth(MAX_CELL_LEVEL)
    }

    fn pruned_hash(&self, index: usize) -> Option<CellHash> {
        if index + 1 >= self.level_mask.hash_count() {
            return None;
        }
        let offset = 2 + index * HASH_BYTES;
        let bytes = self.data().get(offset..offset + HASH_BYTES)?;
        let mut hash = [0u8; HASH_BYTES];
        hash.copy_from_slice(bytes);
        Some(hash)
    }

    fn pruned_depth(&self, index: usize) -> Option<u16> {
        let stored = self.level_mask.hash_count() - 1;
        if index >= stored {
            return None;
        }
        let offset = 2 + stored * HASH_BYTES + index * DEPTH_BYTES;
        let bytes = self.data().get(offset..offset + DEPTH_BYTES)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Opens a read cursor over the cell
    pub fn as_slice(self: &Arc<Self>) -> CellSlice {
        CellSlice::new(self.clone())
    }

    /// Renders the cell tree in fift-like notation, one cell per line.
    ///
    /// A cell reached again through another parent is printed as
    /// `<see line N>`, pointing at the 1-based line of its first rendering.
    pub fn display_tree(&self) -> String {
        let mut out = String::new();
        let mut seen = HashMap::new();
        let mut line = 0;
        self.write_tree(&mut out, 0, &mut seen, &mut line);
        out
    }

    fn write_tree(
        &self,
        out: &mut String,
        indent: usize,
        seen: &mut HashMap<CellHash, usize>,
        line: &mut usize,
    ) {
        *line += 1;
        let _ = write!(out, "{:indent$}", "", indent = indent);
        if let Some(first) = seen.get(&self.repr_hash()) {
            let _ = writeln!(out, "<see line {first}>");
            return;
        }
        seen.insert(self.repr_hash(), *line);
        if self.is_exotic() {
            let _ = write!(out, "{:?} ", self.cell_type);
        }
        let _ = writeln!(out, "{}", self.bits);
        for child in &self.references {
            child.write_tree(out, indent + 1, seen, line);
        }
    }
}

const EMPTY_CELL_HASH: CellHash = [
    0x96, 0xa2, 0x96, 0xd2, 0x24, 0xf2, 0x85, 0xc6, 0x7b, 0xee, 0x93, 0xc3, 0x0f, 0x8a, 0x30, 0x91,
    0x57, 0xf0, 0xda, 0xa3, 0x5d, 0xc5, 0xb8, 0x7e, 0x41, 0x0b, 0x78, 0x63, 0x0a, 0x09, 0xcf, 0xc7,
];

fn resolve_exotic(
    bits: &BitString,
    references: &[ArcCell],
    children_mask: LevelMask,
) -> Result<(CellType, LevelMask)> {
    const HASH_BITS: usize = 256;
    const DEPTH_BITS: usize = 16;

    let type_byte = bits
        .read_uint(0, 8)
        .map_err(|_| CellError::InvalidCell("exotic cell without type byte"))?;
    let cell_type = CellType::from_byte(type_byte as u8)
        .ok_or(CellError::InvalidCell("unknown exotic cell type"))?;

    match cell_type {
        CellType::PrunedBranch => {
            if !references.is_empty() {
                return Err(CellError::InvalidCell("pruned branch has references"));
            }
            let mask = bits
                .read_uint(8, 8)
                .map_err(|_| CellError::InvalidCell("pruned branch without level mask"))?;
            if mask == 0 || mask > 0b111 {
                return Err(CellError::InvalidCell("pruned branch level mask"));
            }
            let mask = LevelMask::new(mask as u8);
            let stored = mask.hash_count() - 1;
            if bits.len() != 16 + stored * (HASH_BITS + DEPTH_BITS) {
                return Err(CellError::InvalidCell("pruned branch length"));
            }
            Ok((cell_type, mask))
        }
        CellType::LibraryReference => {
            if bits.len() != 8 + HASH_BITS || !references.is_empty() {
                return Err(CellError::InvalidCell("library reference layout"));
            }
            Ok((cell_type, LevelMask::EMPTY))
        }
        CellType::MerkleProof => {
            if bits.len() != 8 + HASH_BITS + DEPTH_BITS || references.len() != 1 {
                return Err(CellError::InvalidCell("merkle proof layout"));
            }
            check_merkle_child(bits, 8, &references[0])?;
            Ok((cell_type, children_mask.virtualize(1)))
        }
        CellType::MerkleUpdate => {
            if bits.len() != 8 + 2 * (HASH_BITS + DEPTH_BITS) || references.len() != 2 {
                return Err(CellError::InvalidCell("merkle update layout"));
            }
            check_merkle_child(bits, 8, &references[0])?;
            check_merkle_child(bits, 8 + HASH_BITS, &references[1])?;
            Ok((cell_type, children_mask.virtualize(1)))
        }
        CellType::Ordinary => Err(CellError::InvalidCell("unknown exotic cell type")),
    }
}

/// A merkle cell stores the level-0 hash of each child right after the type
/// byte; the matching depths follow all stored hashes.
fn check_merkle_child(bits: &BitString, hash_offset: usize, child: &ArcCell) -> Result<()> {
    let stored = bits.range(hash_offset, 256)?;
    if stored.as_raw_data() != Cell::hash(child, 0) {
        return Err(CellError::InvalidCell("merkle child hash mismatch"));
    }
    Ok(())
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.repr_hash() == other.repr_hash()
    }
}

impl Eq for Cell {}

// Implemented by path so `Hash::hash` never shadows `Cell::hash` on `ArcCell`
impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::hash::Hash::hash(&self.repr_hash(), state);
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("type", &self.cell_type)
            .field("bits", &self.bits)
            .field("refs", &self.references.len())
            .field("hash", &hex::encode(self.repr_hash()))
            .finish()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_tree())
    }
}

impl Default for Cell {
    fn default() -> Self {
        Arc::unwrap_or_clone(Cell::empty())
    }
}
