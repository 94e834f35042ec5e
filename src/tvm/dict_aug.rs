//! Augmented dictionaries (`HashmapAug n X Y` / `HashmapAugE n X Y`)
//!
//! Same trie and labels as [`Dict`], but every node also carries an extra
//! value of type `Y`: leaves store `extra:Y value:X` after the label, forks
//! store `extra:Y` computed from the extras of their two children. The root
//! extra therefore aggregates the whole dictionary.

use crate::tvm::bitstring::BitString;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::ArcCell;
use crate::tvm::dict::{Dict, DictIter, check_key, read_label, tail, write_label};
use crate::tvm::error::Result;
use crate::tvm::slice::CellSlice;
use log::trace;
use std::collections::BTreeMap;

/// Extra value kept at every node of an [`AugDict`]
pub trait AugExtra: Sized + Clone + Default {
    fn load_extra(slice: &mut CellSlice) -> Result<Self>;

    fn store_extra(&self, builder: &mut CellBuilder) -> Result<()>;

    /// Extra of a fork from the extras of its 0- and 1-branch
    fn combine(left: &Self, right: &Self) -> Result<Self>;
}

/// Dictionary with fixed-width keys and per-node extras
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugDict<E> {
    key_bits: usize,
    root: Option<ArcCell>,
    extra: E,
}

impl<E: AugExtra> AugDict<E> {
    pub fn new(key_bits: usize) -> Self {
        Self {
            key_bits,
            root: None,
            extra: E::default(),
        }
    }

    /// Wraps a `HashmapAug` root, reading the aggregate extra from it
    pub fn from_root(key_bits: usize, root: Option<ArcCell>) -> Result<Self> {
        let extra = match &root {
            Some(root) => node_extra(root, key_bits)?,
            None => E::default(),
        };
        Ok(Self {
            key_bits,
            root,
            extra,
        })
    }

    /// Builds the canonical trie from `(key, extra, value)` entries.
    ///
    /// Later duplicates of a key replace earlier ones.
    pub fn from_entries<I>(key_bits: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (BitString, E, CellSlice)>,
    {
        let mut sorted = BTreeMap::new();
        for (key, extra, value) in entries {
            check_key(&key, key_bits)?;
            sorted.insert(key, (extra, value));
        }
        let entries: Vec<_> = sorted.into_iter().collect();
        let (root, extra) = if entries.is_empty() {
            (None, E::default())
        } else {
            let (root, extra) = build_subtree(&entries, 0, key_bits)?;
            (Some(root), extra)
        };
        trace!("built augmented dictionary with {} entries", entries.len());
        Ok(Self {
            key_bits,
            root,
            extra,
        })
    }

    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    pub fn root(&self) -> Option<&ArcCell> {
        self.root.as_ref()
    }

    /// Aggregate extra of the whole dictionary; the default value when empty
    pub fn root_extra(&self) -> &E {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Looks up the extra and value stored under `key`
    pub fn get(&self, key: &BitString) -> Result<Option<(E, CellSlice)>> {
        match self.as_dict().get(key)? {
            Some(mut slice) => {
                let extra = E::load_extra(&mut slice)?;
                Ok(Some((extra, slice)))
            }
            None => Ok(None),
        }
    }

    /// Inserts or replaces an entry, recomputing extras along its path
    pub fn set(&mut self, key: &BitString, extra: &E, value: &CellSlice) -> Result<()> {
        check_key(key, self.key_bits)?;
        let (root, root_extra) = insert(self.root.as_ref(), key, self.key_bits, extra, value)?;
        self.root = Some(root);
        self.extra = root_extra;
        Ok(())
    }

    /// Removes `key`, returning its extra and value
    pub fn delete(&mut self, key: &BitString) -> Result<Option<(E, CellSlice)>> {
        check_key(key, self.key_bits)?;
        let Some(root) = self.root.as_ref() else {
            return Ok(None);
        };
        let Some((replacement, removed)) = remove(root, key, self.key_bits)? else {
            return Ok(None);
        };
        match replacement {
            Some((root, extra)) => {
                self.root = Some(root);
                self.extra = extra;
            }
            None => {
                self.root = None;
                self.extra = E::default();
            }
        }
        Ok(Some(removed))
    }

    /// Iterates over `(key, extra, value)` in ascending key order
    pub fn iter(&self) -> AugDictIter<E> {
        AugDictIter {
            inner: self.as_dict().iter(),
            _extra: std::marker::PhantomData,
        }
    }

    /// Stores as `HashmapAugE`: presence bit, optional root reference, root extra
    pub fn store(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_dict(self.root.clone())?;
        self.extra.store_extra(builder)
    }

    /// Loads a `HashmapAugE` with the given key width
    pub fn load(slice: &mut CellSlice, key_bits: usize) -> Result<Self> {
        let root = slice.load_dict()?;
        let extra = E::load_extra(slice)?;
        Ok(Self {
            key_bits,
            root,
            extra,
        })
    }

    // lookups and iteration only walk labels and references
    fn as_dict(&self) -> Dict {
        Dict::from_root(self.key_bits, self.root.clone())
    }
}

/// Entries of an [`AugDict`] in key order
pub struct AugDictIter<E> {
    inner: DictIter,
    _extra: std::marker::PhantomData<E>,
}

impl<E: AugExtra> Iterator for AugDictIter<E> {
    type Item = Result<(BitString, E, CellSlice)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        Some(entry.and_then(|(key, mut slice)| {
            let extra = E::load_extra(&mut slice)?;
            Ok((key, extra, slice))
        }))
    }
}

/// Extra stored right after the label, in both leaves and forks
fn node_extra<E: AugExtra>(node: &ArcCell, max_len: usize) -> Result<E> {
    let mut slice = CellSlice::new(node.clone());
    read_label(&mut slice, max_len)?;
    E::load_extra(&mut slice)
}

fn make_leaf<E: AugExtra>(
    label: &BitString,
    max_len: usize,
    extra: &E,
    value: &CellSlice,
) -> Result<(ArcCell, E)> {
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    extra.store_extra(&mut builder)?;
    builder.store_slice(value)?;
    Ok((builder.build()?, extra.clone()))
}

fn make_fork<E: AugExtra>(
    label: &BitString,
    max_len: usize,
    (left, left_extra): (ArcCell, E),
    (right, right_extra): (ArcCell, E),
) -> Result<(ArcCell, E)> {
    let extra = E::combine(&left_extra, &right_extra)?;
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_ref(left)?;
    builder.store_ref(right)?;
    extra.store_extra(&mut builder)?;
    Ok((builder.build()?, extra))
}

/// Moves a node under a new label; `payload` is everything after the old one
fn relabel<E: AugExtra>(label: &BitString, max_len: usize, payload: &CellSlice) -> Result<(ArcCell, E)> {
    let extra = E::load_extra(&mut payload.clone())?;
    let mut builder = CellBuilder::new();
    write_label(&mut builder, label, max_len)?;
    builder.store_slice(payload)?;
    Ok((builder.build()?, extra))
}

fn with_extra<E: AugExtra>(node: ArcCell, max_len: usize) -> Result<(ArcCell, E)> {
    let extra = node_extra(&node, max_len)?;
    Ok((node, extra))
}

fn insert<E: AugExtra>(
    node: Option<&ArcCell>,
    key: &BitString,
    max_len: usize,
    extra: &E,
    value: &CellSlice,
) -> Result<(ArcCell, E)> {
    let Some(node) = node else {
        return make_leaf(key, max_len, extra, value);
    };

    let mut slice = CellSlice::new(node.clone());
    let label = read_label(&mut slice, max_len)?;
    let common = label.common_prefix_len(key);

    if common == label.len() {
        if label.len() == max_len {
            return make_leaf(key, max_len, extra, value);
        }
        let branch = key.get(common).unwrap_or(false);
        let child_len = max_len - common - 1;
        let [left, right] = [slice.preload_ref_at(0)?, slice.preload_ref_at(1)?];
        let child_key = tail(key, common + 1)?;
        return if branch {
            let updated = insert(Some(&right), &child_key, child_len, extra, value)?;
            make_fork(&label, max_len, with_extra(left, child_len)?, updated)
        } else {
            let updated = insert(Some(&left), &child_key, child_len, extra, value)?;
            make_fork(&label, max_len, updated, with_extra(right, child_len)?)
        };
    }

    let child_len = max_len - common - 1;
    let existing = relabel(&tail(&label, common + 1)?, child_len, &slice)?;
    let added = make_leaf(&tail(key, common + 1)?, child_len, extra, value)?;
    let prefix = key.range(0, common)?;
    if key.get(common).unwrap_or(false) {
        make_fork(&prefix, max_len, existing, added)
    } else {
        make_fork(&prefix, max_len, added, existing)
    }
}

type Removed<E> = (Option<(ArcCell, E)>, (E, CellSlice));

fn remove<E: AugExtra>(node: &ArcCell, key: &BitString, max_len: usize) -> Result<Option<Removed<E>>> {
    let mut slice = CellSlice::new(node.clone());
    let label = read_label(&mut slice, max_len)?;
    if !key.starts_with(&label) {
        return Ok(None);
    }
    if label.len() == max_len {
        let extra = E::load_extra(&mut slice)?;
        return Ok(Some((None, (extra, slice))));
    }

    let branch = key.get(label.len()).unwrap_or(false);
    let child_key = tail(key, label.len() + 1)?;
    let child_len = max_len - label.len() - 1;
    let [left, right] = [slice.preload_ref_at(0)?, slice.preload_ref_at(1)?];
    let target = if branch { &right } else { &left };

    let Some((updated, removed)) = remove::<E>(target, &child_key, child_len)? else {
        return Ok(None);
    };

    let replacement = match updated {
        Some(child) if branch => make_fork(&label, max_len, with_extra(left, child_len)?, child)?,
        Some(child) => make_fork(&label, max_len, child, with_extra(right, child_len)?)?,
        None => {
            let sibling = if branch { left } else { right };
            let mut sibling_slice = CellSlice::new(sibling);
            let sibling_label = read_label(&mut sibling_slice, child_len)?;
            let mut merged = label.clone();
            merged.push_bit(!branch);
            merged.append(&sibling_label);
            relabel(&merged, max_len, &sibling_slice)?
        }
    };
    Ok(Some((Some(replacement), removed)))
}

fn build_subtree<E: AugExtra>(
    entries: &[(BitString, (E, CellSlice))],
    offset: usize,
    max_len: usize,
) -> Result<(ArcCell, E)> {
    let (first_key, (first_extra, first_value)) = &entries[0];
    if entries.len() == 1 {
        return make_leaf(&tail(first_key, offset)?, max_len, first_extra, first_value);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::boc::hex_to_boc;
    use crate::tvm::dict::uint_key;
    use crate::tvm::error::CellError;

    /// uint32 extra summed at forks
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    struct Sum(u32);

    impl AugExtra for Sum {
        fn load_extra(slice: &mut CellSlice) -> Result<Self> {
            Ok(Self(slice.load_u32()?))
        }

        fn store_extra(&self, builder: &mut CellBuilder) -> Result<()> {
            builder.store_u32(self.0)?;
            Ok(())
        }

        fn combine(left: &Self, right: &Self) -> Result<Self> {
            left.0
                .checked_add(right.0)
                .map(Self)
                .ok_or(CellError::OutOfRange { bits: 32 })
        }
    }

    fn value(v: u32) -> CellSlice {
        let mut builder = CellBuilder::new();
        builder.store_u32(v).unwrap();
        builder.to_slice().unwrap()
    }

    /// keys 1..=n, value 3i, extra (3i)^2
    fn squares(n: u64) -> AugDict<Sum> {
        AugDict::from_entries(
            32,
            (1..=n).map(|i| {
                let v = 3 * i as u32;
                (uint_key(i, 32).unwrap(), Sum(v * v), value(v))
            }),
        )
        .unwrap()
    }

    fn stored(dict: &AugDict<Sum>) -> ArcCell {
        let mut builder = CellBuilder::new();
        dict.store(&mut builder).unwrap();
        builder.build().unwrap()
    }

    // HashmapAugE 32 uint32 uint32 buffers produced by the reference node
    const EMPTY: &str = "b5ee9c720101010100070000090000000040";
    const ONE: &str = "b5ee9c7201010201001700010980000004c001001aa0000000010000000900000003";
    const TWO: &str = "b5ee9c7201010401002800010980000016c001020bcf00000016c0020300115000000090000000380011400000024000000068";
    const TEN: &str = "b5ee9c720101140100c8000109800006c4c001020bce000006c4c0020302090000013b200405020940000089d8101102090000001fa0060702090000011ba00a0b001150000000900000003802090000001d60080900110000000900000001a0001100000014400000026002090000005c600c0d0209000000bf600e0f001100000024000000032000110000003840000003e000110000005100000004a000110000006e400000056002090000014660121300114000003840000001e800110000009000000006200011000000b640000006e0";

    #[test]
    fn test_matches_reference_cells() {
        for (n, hex) in [(0, EMPTY), (1, ONE), (2, TWO), (10, TEN)] {
            let reference = hex_to_boc(hex).unwrap();
            assert_eq!(stored(&squares(n)).repr_hash(), reference.repr_hash(), "{n} entries");
        }
    }

    #[test]
    fn test_load_reference_dictionary() {
        let cell = hex_to_boc(TEN).unwrap();
        let mut slice = cell.as_slice();
        let dict = AugDict::<Sum>::load(&mut slice, 32).unwrap();
        slice.end_parse().unwrap();
        assert_eq!(dict.root_extra(), &Sum(3465));

        let entries: Vec<(u64, u32, u32)> = dict
            .iter()
            .map(|entry| {
                let (key, extra, mut value) = entry.unwrap();
                (key.read_uint(0, 32).unwrap(), extra.0, value.load_u32().unwrap())
            })
            .collect();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0], (1, 9, 3));
        assert_eq!(entries[9], (10, 900, 30));

        let (extra, mut value) = dict.get(&uint_key(7, 32).unwrap()).unwrap().unwrap();
        assert_eq!(extra, Sum(441));
        assert_eq!(value.load_u32().unwrap(), 21);
        assert!(dict.get(&uint_key(11, 32).unwrap()).unwrap().is_none());

        // a bare HashmapAug root carries the same aggregate
        let root = AugDict::<Sum>::from_root(32, dict.root().cloned()).unwrap();
        assert_eq!(root.root_extra(), &Sum(3465));
    }

    #[test]
    fn test_incremental_matches_bulk_build() {
        let mut dict = AugDict::<Sum>::new(32);
        for i in [7u64, 2, 10, 1, 5, 9, 3, 8, 4, 6] {
            let v = 3 * i as u32;
            dict.set(&uint_key(i, 32).unwrap(), &Sum(v * v), &value(v))
                .unwrap();
        }
        let bulk = squares(10);
        assert_eq!(dict, bulk);
        assert_eq!(dict.root_extra(), &Sum(3465));
    }

    #[test]
    fn test_delete_updates_extras() {
        let mut dict = squares(10);
        let (extra, mut removed) = dict.delete(&uint_key(10, 32).unwrap()).unwrap().unwrap();
        assert_eq!(extra, Sum(900));
        assert_eq!(removed.load_u32().unwrap(), 30);
        assert_eq!(dict, squares(9));
        assert_eq!(dict.root_extra(), &Sum(3465 - 900));
        assert!(dict.delete(&uint_key(10, 32).unwrap()).unwrap().is_none());

        for i in 1..=9 {
            dict.delete(&uint_key(i, 32).unwrap()).unwrap();
        }
        assert!(dict.is_empty());
        assert_eq!(dict.root_extra(), &Sum(0));
        assert_eq!(stored(&dict).repr_hash(), hex_to_boc(EMPTY).unwrap().repr_hash());
    }

    #[test]
    fn test_replacing_a_value_updates_the_root_extra() {
        let mut dict = squares(2);
        dict.set(&uint_key(1, 32).unwrap(), &Sum(100), &value(0))
            .unwrap();
        assert_eq!(dict.root_extra(), &Sum(136));
    }

    #[test]
    fn test_extra_overflow_is_reported() {
        let mut dict = AugDict::<Sum>::new(8);
        dict.set(&uint_key(1, 8).unwrap(), &Sum(u32::MAX), &value(0))
            .unwrap();
        assert_eq!(
            dict.set(&uint_key(2, 8).unwrap(), &Sum(1), &value(0))
                .unwrap_err(),
            CellError::OutOfRange { bits: 32 }
        );
    }
}
