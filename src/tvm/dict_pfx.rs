//! Prefix dictionaries (`PfxHashmap n X` / `PfxHashmapE n X`)
//!
//! Keys have any length up to `n` bits, but no key may be a prefix of
//! another. After the label every node carries one bit: `phmn_leaf$0`
//! followed by the value, or `phmn_fork$1` with two references.

use crate::tvm::bitstring::BitString;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::ArcCell;
use crate::tvm::dict::{read_label, tail, write_label};
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;
use log::trace;
use std::collections::BTreeMap;

/// Prefix-free dictionary with keys of at most `max_key_bits` bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfxDict {
    max_key_bits: usize,
    root: Option<ArcCell>,
}

impl PfxDict {
    pub fn new(max_key_bits: usize) -> Self {
        Self {
            max_key_bits,
            root: None,
        }
    }

    /// Wraps an existing `PfxHashmap` root
    pub fn from_root(max_key_bits: usize, root: Option<ArcCell>) -> Self {
        Self { max_key_bits, root }
    }

    /// Builds the canonical trie from prefix-free entries.
    ///
    /// Later duplicates of a key replace earlier ones.
    pub fn from_entries<I>(max_key_bits: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (BitString, CellSlice)>,
    {
        let mut sorted = BTreeMap::new();
        for (key, value) in entries {
            check_key(&key, max_key_bits)?;
            sorted.insert(key, value);
        }
        let entries: Vec<_> = sorted.into_iter().collect();
        // a prefix sorts right before the keys extending it
        if let Some(pair) = entries.windows(2).find(|pair| pair[1].0.starts_with(&pair[0].0)) {
            return Err(CellError::KeyPrefixConflict(pair[0].0.to_string()));
        }
        let root = if entries.is_empty() {
            None
        } else {
            Some(build_subtree(&entries, 0, max_key_bits)?)
        };
        trace!("built prefix dictionary with {} entries", entries.len());
        Ok(Self { max_key_bits, root })
    }

    pub fn max_key_bits(&self) -> usize {
        self.max_key_bits
    }

    pub fn root(&self) -> Option<&ArcCell> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up the value stored under exactly `key`
    pub fn get(&self, key: &BitString) -> Result<Option<CellSlice>> {
        check_key(key, self.max_key_bits)?;
        Ok(self
            .find_prefix(key)?
            .filter(|(found, _)| found.len() == key.len())
            .map(|(_, value)| value))
    }

    /// Finds the stored key that is a prefix of `bits`, if any.
    ///
    /// Keys are prefix-free, so at most one can match.
    pub fn find_prefix(&self, bits: &BitString) -> Result<Option<(BitString, CellSlice)>> {
        let Some(mut node) = self.root.clone() else {
            return Ok(None);
        };

        let mut path = BitString::new();
        let mut remaining = self.max_key_bits;
        loop {
            let (label, is_fork, slice) = read_node(node, remaining)?;
            let rest = tail(bits, path.len().min(bits.len()))?;
            if !rest.starts_with(&label) {
                return Ok(None);
            }
            path.append(&label);
            if !is_fork {
                return Ok(Some((path, slice.leaf_value()?)));
            }
            let Some(branch) = rest.get(label.len()) else {
                return Ok(None);
            };
            path.push_bit(branch);
            node = slice.preload_ref_at(branch as usize)?;
            remaining -= label.len() + 1;
        }
    }

    /// Inserts or replaces the value under `key`.
    ///
    /// Fails with [`CellError::KeyPrefixConflict`] when `key` is a prefix of
    /// a stored key or a stored key is a prefix of it.
    pub fn set(&mut self, key: &BitString, value: &CellSlice) -> Result<()> {
        check_key(key, self.max_key_bits)?;
        let root = insert(self.root.as_ref(), key, self.max_key_bits, value)
            .map_err(|e| conflict_for(e, key))?;
        self.root = Some(root);
        Ok(())
    }

    /// Removes `key`, returning the previous value
    pub fn delete(&mut self, key: &BitString) -> Result<Option<CellSlice>> {
        check_key(key, self.max_key_bits)?;
        let Some(root) = self.root.as_ref() else {
            return Ok(None);
        };
        match remove(root, key, self.max_key_bits)? {
            Some((new_root, value)) => {
                self.root = new_root;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Iterates over entries in ascending key order
    pub fn iter(&self) -> PfxDictIter {
        PfxDictIter {
            stack: self
                .root
                .iter()
                .map(|root| (root.clone(), BitString::new(), self.max_key_bits))
                .collect(),
        }
    }

    /// Stores as `PfxHashmapE`: a presence bit plus the root reference
    pub fn store(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_dict(self.root.clone())?;
        Ok(())
    }

    pub fn load(slice: &mut CellSlice, max_key_bits: usize) -> Result<Self> {
        let root = slice.load_dict()?;
        Ok(Self { max_key_bits, root })
    }
}

impl<'a> IntoIterator for &'a PfxDict {
    type Item = Result<(BitString, CellSlice)>;
    type IntoIter = PfxDictIter;

    fn into_iter(self) -> PfxDictIter {
        self.iter()
    }
}

pub struct PfxDictIter {
    stack: Vec<(ArcCell, BitString, usize)>,
}

impl PfxDictIter {
    fn expand(
        &mut self,
        node: ArcCell,
        mut prefix: BitString,
        remaining: usize,
    ) -> Result<Option<(BitString, CellSlice)>> {
        let (label, is_fork, slice) = read_node(node, remaining)?;
        prefix.append(&label);
        if !is_fork {
            return Ok(Some((prefix, slice.leaf_value()?)));
        }

        let child_remaining = remaining - label.len() - 1;
        let mut right_prefix = prefix.clone();
        right_prefix.push_bit(true);
        self.stack
            .push((slice.preload_ref_at(1)?, right_prefix, child_remaining));
        prefix.push_bit(false);
        self.stack
            .push((slice.preload_ref_at(0)?, prefix, child_remaining));
        Ok(None)
    }
}

impl Iterator for PfxDictIter {
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

/// Slice positioned after a node label; the leaf/fork tag is still unread
struct NodeBody(CellSlice);

impl NodeBody {
    /// The value of a leaf
    fn leaf_value(&self) -> Result<CellSlice> {
        let mut value = self.0.clone();
        value.skip_bits(1)?;
        Ok(value)
    }

    fn preload_ref_at(&self, index: usize) -> Result<ArcCell> {
        self.0.preload_ref_at(index)
    }
}

fn read_node(node: ArcCell, max_len: usize) -> Result<(BitString, bool, NodeBody)> {
    let mut slice = CellSlice::new(node);
    let label = read_label(&mut slice, max_len)?;
    let is_fork = slice.preload_bit()?;
    if is_fork && label.len() >= max_len {
        return Err(CellError::SchemaMismatch(format!(
            "prefix dictionary fork with no key bits left after a {}-bit label",
            label.len()
        )));
    }
    Ok((label, is_fork, NodeBody(slice)))
}

fn check_key(key: &BitString, max_key_bits: usize) -> Result<()> {
    if key.len() > max_key_bits {
        return Err(CellError::InvalidKey {
            expected: max_key_bits,
            actual: key.len(),
        });
    }
    Ok(())
}

// inner calls only see key tails; report the full key
fn conflict_for(error: CellError, key: &BitString) -> CellError {
    match error {
        CellError::KeyPrefixConflict(_) => CellError::KeyPrefixConflict(key.to_string()),
        other => other,
    }
}

fn make_leaf(label: &BitString, max_len: usize, value: &CellSlice) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_bit(false)?;
    builder.store_slice(value)?;
    builder.build()
}

fn make_fork(label: &BitString, max_len: usize, left: ArcCell, right: ArcCell) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_bit(true)?;
    builder.store_ref(left)?;
    builder.store_ref(right)?;
    builder.build()
}

/// Moves a node under a new label; `body` keeps its tag and payload
fn relabel(label: &BitString, max_len: usize, body: &NodeBody) -> Result<ArcCell> {
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_slice(&body.0)?;
    builder.build()
}

fn insert(node: Option<&ArcCell>, key: &BitString, max_len: usize, value: &CellSlice) -> Result<ArcCell> {
    let Some(node) = node else {
        return make_leaf(key, max_len, value);
    };

    let (label, is_fork, body) = read_node(node.clone(), max_len)?;
    let common = label.common_prefix_len(key);

    if common == label.len() {
        if key.len() == label.len() {
            return if is_fork {
                Err(CellError::KeyPrefixConflict(String::new()))
            } else {
                make_leaf(key, max_len, value)
            };
        }
        if !is_fork {
            return Err(CellError::KeyPrefixConflict(String::new()));
        }
        let branch = key.get(common).unwrap_or(false);
        let child_key = tail(key, common + 1)?;
        let child_len = max_len - common - 1;
        let children = [body.preload_ref_at(0)?, body.preload_ref_at(1)?];
        let updated = insert(Some(&children[branch as usize]), &child_key, child_len, value)?;
        let [left, right] = children;
        return if branch {
            make_fork(&label, max_len, left, updated)
        } else {
            make_fork(&label, max_len, updated, right)
        };
    }
    if common == key.len() {
        return Err(CellError::KeyPrefixConflict(String::new()));
    }

    let child_len = max_len - common - 1;
    let existing = relabel(&tail(&label, common + 1)?, child_len, &body)?;
    let added = make_leaf(&tail(key, common + 1)?, child_len, value)?;
    let prefix = key.range(0, common)?;
    if key.get(common).unwrap_or(false) {
        make_fork(&prefix, max_len, existing, added)
    } else {
        make_fork(&prefix, max_len, added, existing)
    }
}

fn remove(
    node: &ArcCell,
    key: &BitString,
    max_len: usize,
) -> Result<Option<(Option<ArcCell>, CellSlice)>> {
    let (label, is_fork, body) = read_node(node.clone(), max_len)?;
    if !key.starts_with(&label) {
        return Ok(None);
    }
    if !is_fork {
        return Ok(if key.len() == label.len() {
            Some((None, body.leaf_value()?))
        } else {
            None
        });
    }
    let Some(branch) = key.get(label.len()) else {
        return Ok(None);
    };

    let child_key = tail(key, label.len() + 1)?;
    let child_len = max_len - label.len() - 1;
    let children = [body.preload_ref_at(0)?, body.preload_ref_at(1)?];
    let Some((updated, value)) = remove(&children[branch as usize], &child_key, child_len)? else {
        return Ok(None);
    };

    let [left, right] = children;
    let replacement = match updated {
        Some(child) if branch => make_fork(&label, max_len, left, child)?,
        Some(child) => make_fork(&label, max_len, child, right)?,
        None => {
            let sibling = if branch { left } else { right };
            let (sibling_label, _, sibling_body) = read_node(sibling, child_len)?;
            let mut merged = label.clone();
            merged.push_bit(!branch);
            merged.append(&sibling_label);
            relabel(&merged, max_len, &sibling_body)?
        }
    };
    Ok(Some((Some(replacement), value)))
}

/// Builds a subtree for sorted prefix-free entries sharing `offset` key bits
fn build_subtree(entries: &[(BitString, CellSlice)], offset: usize, max_len: usize) -> Result<ArcCell> {
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
