//! Construction of exotic cells
//!
//! Pruned branches stand in for omitted subtrees by carrying their hashes and
//! depths. Merkle proofs and updates wrap such partial trees and commit to the
//! hash of the full tree, so a proof can be checked against a known root hash
//! without the omitted data.

use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, Cell, CellHash, CellType, LevelMask, MAX_CELL_LEVEL};
use crate::tvm::error::{CellError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Replaces `cell` with a pruned branch at the given Merkle depth
pub fn pruned_branch(cell: &Cell, merkle_depth: u8) -> Result<ArcCell> {
    if merkle_depth >= MAX_CELL_LEVEL {
        return Err(CellError::InvalidCell("merkle depth is too large"));
    }
    let original_mask = cell.level_mask();
    let mask = LevelMask::new(original_mask.mask() | (1 << merkle_depth));
    let levels: Vec<u8> = (0..=MAX_CELL_LEVEL)
        .filter(|&level| original_mask.is_significant(level))
        .collect();

    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_byte(CellType::PrunedBranch.to_byte())?;
    builder.store_byte(mask.mask())?;
    for &level in &levels {
        builder.store_bytes(&cell.hash(level))?;
    }
    for &level in &levels {
        builder.store_u16(cell.depth(level))?;
    }
    builder.build()
}

/// Creates a library reference cell pointing at the code with `hash`
pub fn library_reference(hash: &CellHash) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_byte(CellType::LibraryReference.to_byte())?;
    builder.store_bytes(hash)?;
    builder.build()
}

/// Builds a Merkle proof for `root` that keeps every cell whose
/// representation hash is in `keep` and prunes the rest.
///
/// The root itself is always kept.
pub fn merkle_proof(root: &ArcCell, keep: &HashSet<CellHash>) -> Result<ArcCell> {
    let mut cache = HashMap::new();
    let partial = copy_kept(root, keep, &mut cache)?;

    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_byte(CellType::MerkleProof.to_byte())?;
    builder.store_bytes(&root.hash(0))?;
    builder.store_u16(root.depth(0))?;
    builder.store_ref(partial)?;
    builder.build()
}

fn copy_kept(
    cell: &ArcCell,
    keep: &HashSet<CellHash>,
    cache: &mut HashMap<CellHash, ArcCell>,
) -> Result<ArcCell> {
    if let Some(copy) = cache.get(&cell.repr_hash()) {
        return Ok(copy.clone());
    }
    let mut references = Vec::with_capacity(cell.reference_count());
    for child in cell.references() {
        let copy = if keep.contains(&child.repr_hash()) {
            copy_kept(child, keep, cache)?
        } else {
            pruned_branch(child, 0)?
        };
        references.push(copy);
    }
    let copy = Arc::new(Cell::new(cell.bits().clone(), references, cell.is_exotic())?);
    cache.insert(cell.repr_hash(), copy.clone());
    Ok(copy)
}

/// Builds a Merkle update describing the transition from `old` to `new`
pub fn merkle_update(old: &ArcCell, new: &ArcCell) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    builder.set_exotic(true);
    builder.store_byte(CellType::MerkleUpdate.to_byte())?;
    builder.store_bytes(&old.hash(0))?;
    builder.store_bytes(&new.hash(0))?;
    builder.store_u16(old.depth(0))?;
    builder.store_u16(new.depth(0))?;
    builder.store_ref(old.clone())?;
    builder.store_ref(new.clone())?;
    builder.build()
}

/// Hash of the full tree a Merkle proof commits to
pub fn merkle_proof_root_hash(proof: &Cell) -> Result<CellHash> {
    if proof.cell_type() != CellType::MerkleProof {
        return Err(CellError::InvalidCell("not a merkle proof"));
    }
    let stored = proof.bits().range(8, 256)?;
    let mut hash = [0u8; 32];
    hash.copy_from_slice(stored.as_raw_data());
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::boc::{deserialize_boc, serialize_boc};

    fn tree() -> ArcCell {
        let mut left = CellBuilder::new();
        left.store_u32(1).unwrap();
        let left = left.build().unwrap();

        let mut right = CellBuilder::new();
        right.store_u32(2).unwrap();
        right.store_ref(Cell::empty()).unwrap();
        let right = right.build().unwrap();

        let mut root = CellBuilder::new();
        root.store_u16(0xABCD).unwrap();
        root.store_ref(left).unwrap();
        root.store_ref(right).unwrap();
        root.build().unwrap()
    }

    #[test]
    fn test_pruned_branch_keeps_hash() {
        let root = tree();
        let pruned = pruned_branch(&root, 0).unwrap();
        assert_eq!(pruned.cell_type(), CellType::PrunedBranch);
        assert_eq!(pruned.level(), 1);
        assert_eq!(pruned.hash(0), root.repr_hash());
        assert_eq!(pruned.depth(0), root.repr_depth());
        assert_ne!(pruned.repr_hash(), root.repr_hash());
        assert_eq!(pruned.bit_len(), 16 + 256 + 16);
    }

    #[test]
    fn test_merkle_proof_commits_to_root() {
        let root = tree();
        let keep = HashSet::from([root.references()[0].repr_hash()]);
        let proof = merkle_proof(&root, &keep).unwrap();

        assert_eq!(proof.cell_type(), CellType::MerkleProof);
        assert_eq!(proof.level(), 0);
        assert_eq!(merkle_proof_root_hash(&proof).unwrap(), root.repr_hash());

        let partial = &proof.references()[0];
        assert_eq!(partial.hash(0), root.repr_hash());
        assert_eq!(partial.references()[0].cell_type(), CellType::Ordinary);
        assert_eq!(partial.references()[1].cell_type(), CellType::PrunedBranch);

        let decoded = deserialize_boc(&serialize_boc(&proof, true).unwrap()).unwrap();
        assert_eq!(decoded.repr_hash(), proof.repr_hash());
        assert_eq!(decoded.references()[0].hash(0), root.repr_hash());
    }

    #[test]
    fn test_merkle_update() {
        let old = tree();
        let new = Cell::empty();
        let update = merkle_update(&old, &new).unwrap();
        assert_eq!(update.cell_type(), CellType::MerkleUpdate);
        assert_eq!(update.reference_count(), 2);
        assert_eq!(update.bit_len(), 8 + 2 * (256 + 16));
    }

    #[test]
    fn test_merkle_proof_rejects_wrong_hash() {
        let root = tree();
        let mut builder = CellBuilder::new();
        builder.set_exotic(true);
        builder.store_byte(CellType::MerkleProof.to_byte()).unwrap();
        builder.store_bytes(&[0u8; 32]).unwrap();
        builder.store_u16(root.repr_depth()).unwrap();
        builder.store_ref(root).unwrap();
        assert!(matches!(builder.build(), Err(CellError::InvalidCell(_))));
    }

    #[test]
    fn test_library_reference() {
        let lib = library_reference(&[7u8; 32]).unwrap();
        assert_eq!(lib.cell_type(), CellType::LibraryReference);
        assert_eq!(lib.level(), 0);
        assert_eq!(lib.bit_len(), 8 + 256);
    }
}
