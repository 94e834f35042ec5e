//! Slice implementation for reading data from cells
//!
//! A `CellSlice` is a window over a cell: a range of its bits and a range of
//! its references. Every `load_*` advances the window start and fails with
//! [`CellError::Underrun`] when the window is too short; every `preload_*`
//! reads the same data without moving.

use crate::tvm::address::Address;
use crate::tvm::bitstring::BitString;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::ArcCell;
use crate::tvm::error::{CellError, Result};
use num_bigint::{BigInt, BigUint};

/// A read cursor over a cell
#[derive(Debug, Clone)]
pub struct CellSlice {
    cell: ArcCell,
    bits_start: usize,
    bits_end: usize,
    refs_start: usize,
    refs_end: usize,
}

impl CellSlice {
    /// Creates a new slice covering the whole cell
    pub fn new(cell: ArcCell) -> Self {
        let bits_end = cell.bit_len();
        let refs_end = cell.reference_count();
        Self {
            cell,
            bits_start: 0,
            bits_end,
            refs_start: 0,
            refs_end,
        }
    }

    /// Returns the number of remaining bits
    pub fn remaining_bits(&self) -> usize {
        self.bits_end - self.bits_start
    }

    /// Returns the number of remaining references
    pub fn remaining_refs(&self) -> usize {
        self.refs_end - self.refs_start
    }

    /// Checks if neither bits nor references remain
    pub fn is_empty(&self) -> bool {
        self.remaining_bits() == 0 && self.remaining_refs() == 0
    }

    /// Checks if no bits remain
    pub fn is_data_empty(&self) -> bool {
        self.remaining_bits() == 0
    }

    /// Gets the underlying cell
    pub fn cell(&self) -> &ArcCell {
        &self.cell
    }

    /// Gets the current bit position
    pub fn bit_position(&self) -> usize {
        self.bits_start
    }

    /// Gets the current reference position
    pub fn ref_position(&self) -> usize {
        self.refs_start
    }

    fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.remaining_bits() {
            return Err(CellError::bits_underrun(bits, self.remaining_bits()));
        }
        Ok(())
    }

    fn ensure_refs(&self, refs: usize) -> Result<()> {
        if refs > self.remaining_refs() {
            return Err(CellError::refs_underrun(refs, self.remaining_refs()));
        }
        Ok(())
    }

    /// Skips a number of bits
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        self.ensure_bits(n)?;
        self.bits_start += n;
        Ok(())
    }

    /// Skips a number of references
    pub fn skip_refs(&mut self, n: usize) -> Result<()> {
        self.ensure_refs(n)?;
        self.refs_start += n;
        Ok(())
    }

    /// Peeks the bit at `offset` from the current position
    pub fn preload_bit_at(&self, offset: usize) -> Result<bool> {
        self.ensure_bits(offset + 1)?;
        self.cell
            .bits()
            .get(self.bits_start + offset)
            .ok_or_else(|| CellError::bits_underrun(1, 0))
    }

    /// Peeks a single bit
    pub fn preload_bit(&self) -> Result<bool> {
        self.preload_bit_at(0)
    }

    /// Loads a single bit
    pub fn load_bit(&mut self) -> Result<bool> {
        let bit = self.preload_bit()?;
        self.bits_start += 1;
        Ok(bit)
    }

    /// Loads a boolean stored as one bit
    pub fn load_bool(&mut self) -> Result<bool> {
        self.load_bit()
    }

    /// Peeks an unsigned integer of up to 64 bits
    pub fn preload_uint(&self, bits: usize) -> Result<u64> {
        if bits > 64 {
            return Err(CellError::OutOfRange { bits });
        }
        self.ensure_bits(bits)?;
        self.cell.bits().read_uint(self.bits_start, bits)
    }

    /// Loads an unsigned integer of up to 64 bits
    pub fn load_uint(&mut self, bits: usize) -> Result<u64> {
        let value = self.preload_uint(bits)?;
        self.bits_start += bits;
        Ok(value)
    }

    /// Peeks a signed integer of up to 64 bits
    pub fn preload_int(&self, bits: usize) -> Result<i64> {
        let unsigned = self.preload_uint(bits)?;
        if bits == 0 || bits == 64 {
            return Ok(unsigned as i64);
        }
        if unsigned >> (bits - 1) & 1 == 1 {
            Ok((unsigned | (u64::MAX << bits)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Loads a signed integer of up to 64 bits
    pub fn load_int(&mut self, bits: usize) -> Result<i64> {
        let value = self.preload_int(bits)?;
        self.bits_start += bits;
        Ok(value)
    }

    /// Loads a byte (8 bits)
    pub fn load_u8(&mut self) -> Result<u8> {
        Ok(self.load_uint(8)? as u8)
    }

    /// Loads a u16 value (16 bits, big-endian)
    pub fn load_u16(&mut self) -> Result<u16> {
        Ok(self.load_uint(16)? as u16)
    }

    /// Loads a u32 value (32 bits, big-endian)
    pub fn load_u32(&mut self) -> Result<u32> {
        Ok(self.load_uint(32)? as u32)
    }

    /// Loads a u64 value (64 bits, big-endian)
    pub fn load_u64(&mut self) -> Result<u64> {
        self.load_uint(64)
    }

    /// Loads a signed byte
    pub fn load_i8(&mut self) -> Result<i8> {
        Ok(self.load_int(8)? as i8)
    }

    /// Loads a i32 value
    pub fn load_i32(&mut self) -> Result<i32> {
        Ok(self.load_int(32)? as i32)
    }

    /// Peeks `n` bits as a bit string
    pub fn preload_bits(&self, n: usize) -> Result<BitString> {
        self.ensure_bits(n)?;
        self.cell.bits().range(self.bits_start, n)
    }

    /// Loads `n` bits as a bit string
    pub fn load_bits(&mut self, n: usize) -> Result<BitString> {
        let bits = self.preload_bits(n)?;
        self.bits_start += n;
        Ok(bits)
    }

    /// Loads `n` whole bytes
    pub fn load_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.load_bits(n * 8)?.as_raw_data().to_vec())
    }

    /// Loads exactly `N` bytes into an array
    pub fn load_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bits = self.preload_bits(N * 8)?;
        let mut result = [0u8; N];
        result.copy_from_slice(bits.as_raw_data());
        self.bits_start += N * 8;
        Ok(result)
    }

    /// Loads a 256-bit value
    pub fn load_u256(&mut self) -> Result<[u8; 32]> {
        self.load_array::<32>()
    }

    /// Loads an arbitrary precision unsigned integer
    pub fn load_big_uint(&mut self, bits: usize) -> Result<BigUint> {
        let raw = self.preload_bits(bits)?;
        self.bits_start += bits;
        Ok(BigUint::from_bytes_be(raw.as_raw_data()) >> (raw.as_raw_data().len() * 8 - bits))
    }

    /// Loads an arbitrary precision signed integer
    pub fn load_big_int(&mut self, bits: usize) -> Result<BigInt> {
        if bits == 0 {
            return Ok(BigInt::from(0u8));
        }
        let negative = self.preload_bit()?;
        let unsigned = BigInt::from(self.load_big_uint(bits)?);
        if negative {
            Ok(unsigned - (BigInt::from(1u8) << bits))
        } else {
            Ok(unsigned)
        }
    }

    /// Loads a `VarUInteger` whose byte count takes `len_bits` bits
    pub fn load_var_uint(&mut self, len_bits: usize) -> Result<u64> {
        let mut cursor = self.clone();
        let byte_len = cursor.load_uint(len_bits)? as usize;
        if byte_len > 8 {
            return Err(CellError::OutOfRange { bits: 64 });
        }
        let value = cursor.load_uint(byte_len * 8)?;
        *self = cursor;
        Ok(value)
    }

    /// Loads a `VarUInteger` wider than 64 bits
    pub fn load_var_big_uint(&mut self, len_bits: usize) -> Result<BigUint> {
        let mut cursor = self.clone();
        let byte_len = cursor.load_uint(len_bits)? as usize;
        let value = cursor.load_big_uint(byte_len * 8)?;
        *self = cursor;
        Ok(value)
    }

    /// Loads coins (`VarUInteger 16`)
    pub fn load_coins(&mut self) -> Result<u128> {
        let mut cursor = self.clone();
        let byte_len = cursor.load_uint(4)? as usize;
        let bytes = cursor.load_bytes(byte_len)?;
        let value = bytes
            .iter()
            .fold(0u128, |acc, &byte| (acc << 8) | byte as u128);
        *self = cursor;
        Ok(value)
    }

    /// Peeks the reference at `index` from the current position
    pub fn preload_ref_at(&self, index: usize) -> Result<ArcCell> {
        self.ensure_refs(index + 1)?;
        self.cell
            .reference(self.refs_start + index)
            .cloned()
            .ok_or_else(|| CellError::refs_underrun(1, 0))
    }

    /// Peeks the next reference
    pub fn preload_ref(&self) -> Result<ArcCell> {
        self.preload_ref_at(0)
    }

    /// Loads a reference to another cell
    pub fn load_ref(&mut self) -> Result<ArcCell> {
        let cell = self.preload_ref()?;
        self.refs_start += 1;
        Ok(cell)
    }

    /// Loads an optional reference (Maybe ^Cell)
    pub fn load_maybe_ref(&mut self) -> Result<Option<ArcCell>> {
        if !self.preload_bit()? {
            self.bits_start += 1;
            return Ok(None);
        }
        self.ensure_refs(1)?;
        self.bits_start += 1;
        self.load_ref().map(Some)
    }

    /// Loads a dictionary root (`HashmapE`)
    pub fn load_dict(&mut self) -> Result<Option<ArcCell>> {
        self.load_maybe_ref()
    }

    /// Loads a standard address or `addr_none`
    pub fn load_address(&mut self) -> Result<Option<Address>> {
        let mut cursor = self.clone();
        let tag = cursor.load_uint(2)?;
        let address = match tag {
            0b00 => None,
            0b10 => {
                if cursor.load_bit()? {
                    return Err(CellError::SchemaMismatch(
                        "anycast addresses are not supported here".to_string(),
                    ));
                }
                let workchain = cursor.load_i8()?;
                let hash_part = cursor.load_u256()?;
                Some(Address::new(workchain, hash_part))
            }
            _ => {
                return Err(CellError::UnknownVariant {
                    ty: "MsgAddressInt",
                    tag,
                });
            }
        };
        *self = cursor;
        Ok(address)
    }

    /// Loads bytes stored with snake encoding
    pub fn load_snake_bytes(&mut self) -> Result<Vec<u8>> {
        if self.remaining_bits() % 8 != 0 {
            return Err(CellError::SchemaMismatch(
                "snake data is not byte aligned".to_string(),
            ));
        }
        let mut result = self.load_bytes(self.remaining_bits() / 8)?;
        let mut next = if self.remaining_refs() > 0 {
            Some(self.load_ref()?)
        } else {
            None
        };
        while let Some(cell) = next {
            let mut slice = CellSlice::new(cell);
            if slice.remaining_bits() % 8 != 0 {
                return Err(CellError::SchemaMismatch(
                    "snake data is not byte aligned".to_string(),
                ));
            }
            result.extend(slice.load_bytes(slice.remaining_bits() / 8)?);
            next = slice.load_ref().ok();
        }
        Ok(result)
    }

    /// Loads a string stored with snake encoding
    pub fn load_snake_string(&mut self) -> Result<String> {
        let bytes = self.load_snake_bytes()?;
        String::from_utf8(bytes).map_err(|e| CellError::SchemaMismatch(e.to_string()))
    }

    /// Splits off the next `bits` bits and `refs` references as a new slice
    pub fn load_slice(&mut self, bits: usize, refs: usize) -> Result<CellSlice> {
        self.ensure_bits(bits)?;
        self.ensure_refs(refs)?;
        let result = Self {
            cell: self.cell.clone(),
            bits_start: self.bits_start,
            bits_end: self.bits_start + bits,
            refs_start: self.refs_start,
            refs_end: self.refs_start + refs,
        };
        self.bits_start += bits;
        self.refs_start += refs;
        Ok(result)
    }

    /// Whether the remaining bits start with `prefix`
    pub fn starts_with(&self, prefix: &BitString) -> bool {
        self.preload_bits(prefix.len())
            .map(|bits| &bits == prefix)
            .unwrap_or(false)
    }

    /// Consumes `prefix` if the remaining bits start with it
    pub fn try_load_prefix(&mut self, prefix: &BitString) -> bool {
        if self.starts_with(prefix) {
            self.bits_start += prefix.len();
            true
        } else {
            false
        }
    }

    /// Remaining bits as a bit string
    pub fn remaining_bitstring(&self) -> BitString {
        self.preload_bits(self.remaining_bits()).unwrap_or_default()
    }

    /// Remaining references
    pub fn remaining_references(&self) -> &[ArcCell] {
        &self.cell.references()[self.refs_start..self.refs_end]
    }

    /// Loads all remaining bits
    pub fn load_remaining_bits(&mut self) -> BitString {
        let bits = self.remaining_bitstring();
        self.bits_start = self.bits_end;
        bits
    }

    /// Loads all remaining references
    pub fn load_remaining_refs(&mut self) -> Vec<ArcCell> {
        let refs = self.remaining_references().to_vec();
        self.refs_start = self.refs_end;
        refs
    }

    /// Fails unless the whole slice has been consumed
    pub fn end_parse(&self) -> Result<()> {
        if !self.is_empty() {
            return Err(CellError::SchemaMismatch(format!(
                "{} bits and {} references left unread",
                self.remaining_bits(),
                self.remaining_refs()
            )));
        }
        Ok(())
    }

    /// Copies the unread part into a new ordinary cell
    pub fn to_cell(&self) -> Result<ArcCell> {
        let mut builder = CellBuilder::new();
        builder.store_slice(self)?;
        builder.build()
    }

    /// Rewinds the slice to the start of its window in the cell
    pub fn reset(&mut self) {
        self.bits_start = 0;
        self.refs_start = 0;
        self.bits_end = self.cell.bit_len();
        self.refs_end = self.cell.reference_count();
    }
}

impl From<ArcCell> for CellSlice {
    fn from(cell: ArcCell) -> Self {
        Self::new(cell)
    }
}

impl From<&ArcCell> for CellSlice {
    fn from(cell: &ArcCell) -> Self {
        Self::new(cell.clone())
    }
}

impl PartialEq for CellSlice {
    fn eq(&self, other: &Self) -> bool {
        self.remaining_bitstring() == other.remaining_bitstring()
            && self.remaining_references().len() == other.remaining_references().len()
            && self
                .remaining_references()
                .iter()
                .zip(other.remaining_references())
                .all(|(a, b)| a.repr_hash() == b.repr_hash())
    }
}

impl Eq for CellSlice {}
