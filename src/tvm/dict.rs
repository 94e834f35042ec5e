//! TON Dictionary (Hashmap) implementation
//!
//! Dictionaries in TON are binary Patricia tries stored in cells. Each node
//! starts with an edge label (the key bits shared by everything below it),
//! encoded in whichever of the three label forms is shortest. A node whose
//! label consumes the rest of the key is a leaf and holds the value inline;
//! any other node is a fork with exactly two references, the 0-branch and
//! the 1-branch.
//!
//! Updates copy the path from the root to the touched leaf and share every
//! other subtree with the previous version.

use crate::tvm::bitstring::BitString;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, MAX_CELL_BITS};
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;
use log::trace;
use std::collections::BTreeMap;

/// Dictionary with fixed-width keys (`HashmapE n X`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dict {
    key_bits: usize,
    root: Option<ArcCell>,
}

impl Dict {
    /// Creates an empty dictionary with the specified key size
    pub fn new(key_bits: usize) -> Self {
        Self {
            key_bits,
            root: None,
        }
    }

    /// Wraps an existing trie root
    pub fn from_root(key_bits: usize, root: Option<ArcCell>) -> Self {
        Self { key_bits, root }
    }

    /// Builds the canonical trie for a set of entries in one pass.
    ///
    /// Later duplicates of a key replace earlier ones.
    pub fn from_entries<I>(key_bits: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (BitString, CellSlice)>,
    {
        let mut sorted = BTreeMap::new();
        for (key, value) in entries {
            check_key(&key, key_bits)?;
            sorted.insert(key, value);
        }
        let entries: Vec<_> = sorted.into_iter().collect();
        let root = if entries.is_empty() {
            None
        } else {
            Some(build_subtree(&entries, 0, key_bits)?)
        };
        trace!("built dictionary with {} entries", entries.len());
        Ok(Self { key_bits, root })
    }

    /// Key width in bits
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Root cell of the trie, `None` for an empty dictionary
    pub fn root(&self) -> Option<&ArcCell> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up the value stored under `key`
    pub fn get(&self, key: &BitString) -> Result<Option<CellSlice>> {
        check_key(key, self.key_bits)?;
        let Some(mut node) = self.root.clone() else {
            return Ok(None);
        };

        let mut offset = 0;
        let mut remaining = self.key_bits;
        loop {
            let mut slice = CellSlice::new(node);
            let label = read_label(&mut slice, remaining)?;
            let rest = key.range(offset, remaining)?;
            if !rest.starts_with(&label) {
                return Ok(None);
            }
            if label.len() == remaining {
                return Ok(Some(slice));
            }
            let branch = rest.get(label.len()).unwrap_or(false);
            node = slice.preload_ref_at(branch as usize)?;
            offset += label.len() + 1;
            remaining -= label.len() + 1;
        }
    }

    /// Inserts or replaces the value stored under `key`
    pub fn set(&mut self, key: &BitString, value: &CellSlice) -> Result<()> {
        check_key(key, self.key_bits)?;
        let root = insert(self.root.as_ref(), key, self.key_bits, value)?;
        self.root = Some(root);
        Ok(())
    }

    /// Removes `key`, returning the previous value
    pub fn delete(&mut self, key: &BitString) -> Result<Option<CellSlice>> {
        check_key(key, self.key_bits)?;
        let Some(root) = self.root.as_ref() else {
            return Ok(None);
        };
        match remove(root, key, self.key_bits)? {
            Some((new_root, value)) => {
                self.root = new_root;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Stores `cell` as a single-reference value under `key`
    pub fn set_ref(&mut self, key: &BitString, cell: ArcCell) -> Result<()> {
        let mut value = CellBuilder::new();
        value.store_ref(cell)?;
        self.set(key, &value.to_slice()?)
    }

    /// Loads a value stored with [`Dict::set_ref`]
    pub fn get_ref(&self, key: &BitString) -> Result<Option<ArcCell>> {
        match self.get(key)? {
            Some(mut value) => value.load_ref().map(Some),
            None => Ok(None),
        }
    }

    /// Looks up an unsigned integer key
    pub fn get_uint(&self, key: u64) -> Result<Option<CellSlice>> {
        self.get(&uint_key(key, self.key_bits)?)
    }

    /// Sets a value for an unsigned integer key
    pub fn set_uint(&mut self, key: u64, value: &CellSlice) -> Result<()> {
        let key = uint_key(key, self.key_bits)?;
        self.set(&key, value)
    }

    /// Looks up a signed integer key
    pub fn get_int(&self, key: i64) -> Result<Option<CellSlice>> {
        self.get(&int_key(key, self.key_bits)?)
    }

    /// Sets a value for a signed integer key
    pub fn set_int(&mut self, key: i64, value: &CellSlice) -> Result<()> {
        let key = int_key(key, self.key_bits)?;
        self.set(&key, value)
    }

    /// Iterates over entries in ascending key order.
    ///
    /// The iterator walks the cells lazily; calling `iter` again restarts it.
    pub fn iter(&self) -> DictIter {
        DictIter {
            stack: self
                .root
                .iter()
                .map(|root| (root.clone(), BitString::new(), self.key_bits))
                .collect(),
        }
    }

    /// Stores the dictionary as `HashmapE`: a presence bit plus the root reference
    pub fn store(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_dict(self.root.clone())?;
        Ok(())
    }

    /// Loads a `HashmapE` with the given key width
    pub fn load(slice: &mut CellSlice, key_bits: usize) -> Result<Self> {
        let root = slice.load_dict()?;
        Ok(Self { key_bits, root })
    }
}

impl<'a> IntoIterator for &'a Dict {
    type Item = Result<(BitString, CellSlice)>;
    type IntoIter = DictIter;

    fn into_iter(self) -> DictIter {
        self.iter()
    }
}

/// Depth-first walk over dictionary entries
pub struct DictIter {
    stack: Vec<(ArcCell, BitString, usize)>,
}

impl DictIter {
    fn expand(
        &mut self,
        node: ArcCell,
        mut prefix: BitString,
        remaining: usize,
    ) -> Result<Option<(BitString, CellSlice)>> {
        let mut slice = CellSlice::new(node);
        let label = read_label(&mut slice, remaining)?;
        prefix.append(&label);
        if label.len() == remaining {
            return Ok(Some((prefix, slice)));
        }

        let left = slice.preload_ref_at(0)?;
        let right = slice.preload_ref_at(1)?;
        let child_remaining = remaining - label.len() - 1;

        let mut right_prefix = prefix.clone();
        right_prefix.push_bit(true);
        self.stack.push((right, right_prefix, child_remaining));
        prefix.push_bit(false);
        self.stack.push((left, prefix, child_remaining));
        Ok(None)
    }
}

impl Iterator for DictIter {
    type Item = Result<(BitString, CellSlice)>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, prefix, remaining)) = self.stack.pop() {
            match self.expand(node, prefix, remaining) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

pub(super) fn check_key(key: &BitString, key_bits: usize) -> Result<()> {
    if key.len() != key_bits {
        return Err(CellError::InvalidKey {
            expected: key_bits,
            actual: key.len(),
        });
    }
    Ok(())
}

/// Key bits for an unsigned integer
pub fn uint_key(value: u64, bits: usize) -> Result<BitString> {
    let mut builder = CellBuilder::new();
    builder.store_uint(value, bits)?;
    Ok(builder.bits().clone())
}

/// Key bits for a signed integer in two's complement
pub fn int_key(value: i64, bits: usize) -> Result<BitString> {
    let mut builder = CellBuilder::new();
    builder.store_int(value, bits)?;
    Ok(builder.bits().clone())
}

fn bits_for_len(max_len: usize) -> usize {
    (usize::BITS - max_len.leading_zeros()) as usize
}

/// Writes `label` using the shortest of `hml_short`, `hml_long` and `hml_same`.
///
/// `max_len` is the number of key bits still unresolved at this node.
pub(super) fn write_label(builder: &mut CellBuilder, label: &BitString, max_len: usize) -> Result<()> {
    let len = label.len();
    let len_bits = bits_for_len(max_len);

    let short_len = 2 + 2 * len;
    let long_len = 2 + len_bits + len;
    let same_len = 3 + len_bits;

    if len > 0 && same_len < long_len && same_len < short_len {
        if let Some(bit) = label.is_uniform(0, len) {
            builder.store_uint(0b110 | bit as u64, 3)?;
            builder.store_uint(len as u64, len_bits)?;
            return Ok(());
        }
    }

    if short_len <= MAX_CELL_BITS && short_len <= long_len {
        builder.store_bit(false)?;
        for _ in 0..len {
            builder.store_bit(true)?;
        }
        builder.store_bit(false)?;
    } else if long_len <= MAX_CELL_BITS {
        builder.store_uint(0b10, 2)?;
        builder.store_uint(len as u64, len_bits)?;
    } else {
        return Err(CellError::OutOfRange { bits: MAX_CELL_BITS });
    }
    builder.store_bitstring(label)?;
    Ok(())
}

pub(super) fn read_label(slice: &mut CellSlice, max_len: usize) -> Result<BitString> {
    let len_bits = bits_for_len(max_len);
    if len_bits == 0 && slice.is_data_empty() {
        return Ok(BitString::new());
    }

    let label = if !slice.load_bit()? {
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        check_label_len(len, max_len)?;
        slice.load_bits(len)?
    } else if !slice.load_bit()? {
        let len = slice.load_uint(len_bits)? as usize;
        check_label_len(len, max_len)?;
        slice.load_bits(len)?
    } else {
        let bit = slice.load_bit()?;
        let len = slice.load_uint(len_bits)? as usize;
        check_label_len(len, max_len)?;
        let mut label = BitString::with_capacity(len);
        label.push_repeated(bit, len);
        label
    };
    Ok(label)
}

fn check_label_len(len: usize, max_len: usize) -> Result<()> {
    if len > max_len {
        return Err(CellError::SchemaMismatch(format!(
            "dictionary label of {len} bits exceeds the remaining {max_len} key bits"
        )));
    }
    Ok(())
}

fn make_leaf(label: &BitString, max_len: usize, value: &CellSlice) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_slice(value)?;
    builder.build()
}

fn make_fork(label: &BitString, max_len: usize, left: ArcCell, right: ArcCell) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_ref(left)?;
    builder.store_ref(right)?;
    builder.build()
}

/// Re-labels a node that moved to a different depth, keeping its payload
fn relabel(label: &BitString, max_len: usize, payload: &CellSlice) -> Result<ArcCell> {
    make_leaf(label, max_len, payload)
}

pub(super) fn tail(bits: &BitString, from: usize) -> Result<BitString> {
    bits.range(from, bits.len() - from)
}

fn insert(
    node: Option<&ArcCell>,
    key: &BitString,
    max_len: usize,
    value: &CellSlice,
) -> Result<ArcCell> {
    let Some(node) = node else {
        return make_leaf(key, max_len, value);
    };

    let mut slice = CellSlice::new(node.clone());
    let label = read_label(&mut slice, max_len)?;
    let common = label.common_prefix_len(key);

    if common == label.len() {
        if label.len() == max_len {
            return make_leaf(key, max_len, value);
        }
        let branch = key.get(common).unwrap_or(false);
        let child_key = tail(key, common + 1)?;
        let child_len = max_len - common - 1;
        let children = [slice.preload_ref_at(0)?, slice.preload_ref_at(1)?];
        let updated = insert(Some(&children[branch as usize]), &child_key, child_len, value)?;
        let [left, right] = children;
        return if branch {
            make_fork(&label, max_len, left, updated)
        } else {
            make_fork(&label, max_len, updated, right)
        };
    }

    // keys diverge inside the label: split it with a new fork
    let child_len = max_len - common - 1;
    let existing = relabel(&tail(&label, common + 1)?, child_len, &slice)?;
    let added = make_leaf(&tail(key, common + 1)?, child_len, value)?;
    let prefix = key.range(0, common)?;
    if key.get(common).unwrap_or(false) {
        make_fork(&prefix, max_len, existing, added)
    } else {
        make_fork(&prefix, max_len, added, existing)
    }
}

/// Returns `None` when the key is absent, otherwise the replacement node
/// (`None` if the subtree became empty) and the removed value.
fn remove(
    node: &ArcCell,
    key: &BitString,
    max_len: usize,
) -> Result<Option<(Option<ArcCell>, CellSlice)>> {
    let mut slice = CellSlice::new(node.clone());
    let label = read_label(&mut slice, max_len)?;
    if !key.starts_with(&label) {
        return Ok(None);
    }
    if label.len() == max_len {
        return Ok(Some((None, slice)));
    }

    let branch = key.get(label.len()).unwrap_or(false);
    let child_key = tail(key, label.len() + 1)?;
    let child_len = max_len - label.len() - 1;
    let children = [slice.preload_ref_at(0)?, slice.preload_ref_at(1)?];

    let Some((updated, value)) = remove(&children[branch as usize], &child_key, child_len)? else {
        return Ok(None);
    };

    let [left, right] = children;
    let replacement = match updated {
        Some(child) if branch => make_fork(&label, max_len, left, child)?,
        Some(child) => make_fork(&label, max_len, child, right)?,
        None => {
            // only the sibling remains: merge it into this node
            let sibling = if branch { left } else { right };
            let mut sibling_slice = CellSlice::new(sibling);
            let sibling_label = read_label(&mut sibling_slice, child_len)?;
            let mut merged = label.clone();
            merged.push_bit(!branch);
            merged.append(&sibling_label);
            relabel(&merged, max_len, &sibling_slice)?
        }
    };
    Ok(Some((Some(replacement), value)))
}

/// Builds a subtree for sorted, unique entries sharing the first `offset` key bits
fn build_subtree(
    entries: &[(BitString, CellSlice)],
    offset: usize,
    max_len: usize,
) -> Result<ArcCell> {
    let (first_key, first_value) = &entries[0];
    if entries.len() == 1 {
        return make_leaf(&tail(first_key, offset)?, max_len, first_value);
    }

    let last_key = &entries[entries.len() - 1].0;
    let split_at = first_key.common_prefix_len(last_key);
    let label = first_key.range(offset, split_at - offset)?;
    let pivot = entries.partition_point(|(key, _)| !key.get(split_at).unwrap_or(false));

    let child_len = max_len - label.len() - 1;
    let left = build_subtree(&entries[..pivot], split_at + 1, child_len)?;
    let right = build_subtree(&entries[pivot..], split_at + 1, child_len)?;
    make_fork(&label, max_len, left, right)
}
