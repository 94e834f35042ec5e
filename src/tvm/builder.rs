//! Builder for constructing cells
//!
//! `CellBuilder` accumulates up to 1023 bits and 4 references and turns them
//! into an immutable [`Cell`]. Every `store_*` call checks the limits first
//! and leaves the builder untouched on error, so a failed store can be
//! followed by a smaller one.
//!
//! # Examples
//!
//! ```rust
//! use ton_codec::tvm::{Address, CellBuilder};
//!
//! let mut builder = CellBuilder::new();
//! builder.store_uint(0x0f8a7ea5, 32).unwrap();
//! builder.store_coins(1_000_000_000).unwrap();
//! builder.store_address(Some(&Address::new(0, [0u8; 32]))).unwrap();
//!
//! let cell = builder.build().unwrap();
//! assert_eq!(cell.bit_len(), 32 + 4 + 32 + 267);
//! ```

use crate::tvm::address::Address;
use crate::tvm::bitstring::BitString;
use crate::tvm::cell::{ArcCell, Cell, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;
use num_bigint::{BigInt, BigUint, Sign};
use std::sync::Arc;

/// Mutable accumulator producing an immutable cell
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    bits: BitString,
    references: Vec<ArcCell>,
    is_exotic: bool,
}

impl CellBuilder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all stored data so the builder can be reused
    pub fn reset(&mut self) -> &mut Self {
        self.bits = BitString::new();
        self.references.clear();
        self.is_exotic = false;
        self
    }

    /// Marks the resulting cell as exotic. Its kind is read from the first data byte.
    pub fn set_exotic(&mut self, is_exotic: bool) -> &mut Self {
        self.is_exotic = is_exotic;
        self
    }

    /// Returns the number of bits used
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Returns the number of references
    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    /// Returns the number of available bits
    pub fn available_bits(&self) -> usize {
        MAX_CELL_BITS - self.bits.len()
    }

    /// Returns the number of available references
    pub fn available_refs(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Data stored so far
    pub fn bits(&self) -> &BitString {
        &self.bits
    }

    fn ensure_capacity(&self, bits: usize, refs: usize) -> Result<()> {
        let total_bits = self.bits.len() + bits;
        let total_refs = self.references.len() + refs;
        if total_bits > MAX_CELL_BITS || total_refs > MAX_CELL_REFS {
            return Err(CellError::Overflow {
                bits: total_bits,
                refs: total_refs,
            });
        }
        Ok(())
    }

    /// Stores a single bit
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_capacity(1, 0)?;
        self.bits.push_bit(bit);
        Ok(self)
    }

    /// Stores a boolean value as a single bit
    pub fn store_bool(&mut self, value: bool) -> Result<&mut Self> {
        self.store_bit(value)
    }

    /// Stores `bit_len` leading bits of `data`
    pub fn store_bits(&mut self, data: &[u8], bit_len: usize) -> Result<&mut Self> {
        self.ensure_capacity(bit_len, 0)?;
        self.bits.append_raw(data, 0, bit_len)?;
        Ok(self)
    }

    /// Stores a bit string
    pub fn store_bitstring(&mut self, bits: &BitString) -> Result<&mut Self> {
        self.ensure_capacity(bits.len(), 0)?;
        self.bits.append(bits);
        Ok(self)
    }

    /// Stores `count` zero bits
    pub fn store_zeros(&mut self, count: usize) -> Result<&mut Self> {
        self.ensure_capacity(count, 0)?;
        self.bits.push_repeated(false, count);
        Ok(self)
    }

    /// Stores a byte
    pub fn store_byte(&mut self, byte: u8) -> Result<&mut Self> {
        self.store_uint(byte as u64, 8)
    }

    /// Stores multiple bytes
    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.store_bits(bytes, bytes.len() * 8)
    }

    /// Stores a u16 value
    pub fn store_u16(&mut self, value: u16) -> Result<&mut Self> {
        self.store_uint(value as u64, 16)
    }

    /// Stores a u32 value
    pub fn store_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.store_uint(value as u64, 32)
    }

    /// Stores a u64 value
    pub fn store_u64(&mut self, value: u64) -> Result<&mut Self> {
        self.store_uint(value, 64)
    }

    /// Stores an unsigned integer with specific bit length.
    ///
    /// Widths above 64 bits are zero-extended on the left.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::OutOfRange { bits });
        }
        self.ensure_capacity(bits, 0)?;
        if bits > 64 {
            self.bits.push_repeated(false, bits - 64);
            self.bits.push_uint(value, 64)?;
        } else {
            self.bits.push_uint(value, bits)?;
        }
        Ok(self)
    }

    /// Stores a signed integer in two's complement.
    ///
    /// Widths above 64 bits are sign-extended on the left.
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        let fits = match bits {
            0 => value == 0,
            1..=63 => {
                let half = 1i64 << (bits - 1);
                (-half..half).contains(&value)
            }
            _ => true,
        };
        if !fits {
            return Err(CellError::OutOfRange { bits });
        }
        self.ensure_capacity(bits, 0)?;
        if bits > 64 {
            self.bits.push_repeated(value < 0, bits - 64);
            self.bits.push_uint(value as u64, 64)?;
        } else if bits > 0 {
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            self.bits.push_uint(value as u64 & mask, bits)?;
        }
        Ok(self)
    }

    /// Stores an arbitrary precision unsigned integer
    pub fn store_big_uint(&mut self, value: &BigUint, bits: usize) -> Result<&mut Self> {
        let significant = value.bits() as usize;
        if significant > bits {
            return Err(CellError::OutOfRange { bits });
        }
        self.ensure_capacity(bits, 0)?;
        let bytes = value.to_bytes_be();
        self.bits.push_repeated(false, bits - significant);
        self.bits
            .append_raw(&bytes, bytes.len() * 8 - significant, significant)?;
        Ok(self)
    }

    /// Stores an arbitrary precision signed integer in two's complement
    pub fn store_big_int(&mut self, value: &BigInt, bits: usize) -> Result<&mut Self> {
        if bits == 0 {
            if value.sign() != Sign::NoSign {
                return Err(CellError::OutOfRange { bits });
            }
            return Ok(self);
        }
        let half = BigInt::from(1u8) << (bits - 1);
        if *value >= half || *value < -&half {
            return Err(CellError::OutOfRange { bits });
        }
        let unsigned = if value.sign() == Sign::Minus {
            value + (half << 1)
        } else {
            value.clone()
        };
        let unsigned = unsigned
            .to_biguint()
            .ok_or(CellError::OutOfRange { bits })?;
        self.store_big_uint(&unsigned, bits)
    }

    /// Stores a `VarUInteger`: a `len_bits` byte count followed by the
    /// big-endian magnitude
    pub fn store_var_uint(&mut self, value: u64, len_bits: usize) -> Result<&mut Self> {
        self.store_var_big_uint(&BigUint::from(value), len_bits)
    }

    /// Stores a `VarUInteger` wider than 64 bits
    pub fn store_var_big_uint(&mut self, value: &BigUint, len_bits: usize) -> Result<&mut Self> {
        let byte_len = (value.bits() as usize).div_ceil(8);
        if len_bits < 64 && (byte_len as u64) >> len_bits != 0 {
            return Err(CellError::OutOfRange { bits: len_bits });
        }
        self.ensure_capacity(len_bits + byte_len * 8, 0)?;
        self.store_uint(byte_len as u64, len_bits)?;
        if byte_len > 0 {
            self.store_big_uint(value, byte_len * 8)?;
        }
        Ok(self)
    }

    /// Stores coins (`VarUInteger 16`). Zero is a single 4-bit zero nibble.
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self> {
        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > 15 {
            return Err(CellError::OutOfRange { bits: 120 });
        }
        self.ensure_capacity(4 + byte_len * 8, 0)?;
        self.store_uint(byte_len as u64, 4)?;
        let bytes = amount.to_be_bytes();
        self.store_bytes(&bytes[16 - byte_len..])
    }

    /// Stores a reference to another cell
    pub fn store_ref(&mut self, cell: ArcCell) -> Result<&mut Self> {
        self.ensure_capacity(0, 1)?;
        self.references.push(cell);
        Ok(self)
    }

    /// Stores an optional reference (Maybe ^Cell)
    pub fn store_maybe_ref(&mut self, cell: Option<ArcCell>) -> Result<&mut Self> {
        match cell {
            Some(c) => {
                self.ensure_capacity(1, 1)?;
                self.store_bit(true)?;
                self.store_ref(c)?;
            }
            None => {
                self.store_bit(false)?;
            }
        }
        Ok(self)
    }

    /// Stores a dictionary root (`HashmapE`)
    pub fn store_dict(&mut self, root: Option<ArcCell>) -> Result<&mut Self> {
        self.store_maybe_ref(root)
    }

    /// Stores the contents of another cell
    pub fn store_cell(&mut self, cell: &Cell) -> Result<&mut Self> {
        self.ensure_capacity(cell.bit_len(), cell.reference_count())?;
        self.bits.append(cell.bits());
        self.references.extend(cell.references().iter().cloned());
        Ok(self)
    }

    /// Stores the unread part of a slice
    pub fn store_slice(&mut self, slice: &CellSlice) -> Result<&mut Self> {
        self.ensure_capacity(slice.remaining_bits(), slice.remaining_refs())?;
        self.bits.append(&slice.remaining_bitstring());
        self.references.extend(slice.remaining_references().iter().cloned());
        Ok(self)
    }

    /// Stores a short string inline
    pub fn store_string(&mut self, s: &str) -> Result<&mut Self> {
        self.store_bytes(s.as_bytes())
    }

    /// Stores a string using snake encoding, optionally prefixed with the
    /// 0x00 text tag
    pub fn store_snake_string(&mut self, s: &str, with_prefix: bool) -> Result<&mut Self> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        if with_prefix {
            bytes.push(0x00);
        }
        bytes.extend_from_slice(s.as_bytes());
        self.store_snake_bytes(&bytes)
    }

    /// Stores bytes using snake encoding: whatever does not fit in this cell
    /// continues in a chain of references
    pub fn store_snake_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let available = self.available_bits() / 8;
        if bytes.len() <= available {
            return self.store_bytes(bytes);
        }
        self.ensure_capacity(available * 8, 1)?;

        let mut tail = CellBuilder::new();
        tail.store_snake_bytes(&bytes[available..])?;
        let tail = tail.build()?;

        self.store_bytes(&bytes[..available])?;
        self.store_ref(tail)
    }

    /// Stores a standard address (`addr_std` without anycast) or `addr_none`
    pub fn store_address(&mut self, address: Option<&Address>) -> Result<&mut Self> {
        match address {
            None => self.store_uint(0b00, 2),
            Some(addr) => {
                self.ensure_capacity(2 + 1 + 8 + 256, 0)?;
                self.store_uint(0b10, 2)?;
                self.store_bit(false)?;
                self.store_int(addr.workchain as i64, 8)?;
                self.store_bytes(&addr.hash_part)
            }
        }
    }

    /// Builds the cell
    pub fn build(self) -> Result<ArcCell> {
        Cell::new(self.bits, self.references, self.is_exotic).map(Arc::new)
    }

    /// Alias for [`CellBuilder::build`]
    pub fn end_cell(self) -> Result<ArcCell> {
        self.build()
    }

    /// Builds the cell and opens a slice over it
    pub fn to_slice(self) -> Result<CellSlice> {
        Ok(CellSlice::new(self.build()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let mut builder = CellBuilder::new();
        builder.store_u32(0x12345678).unwrap();
        builder.store_byte(0xFF).unwrap();

        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 40);
        assert_eq!(cell.data(), &[0x12, 0x34, 0x56, 0x78, 0xFF]);
    }

    #[test]
    fn test_builder_capacity_boundary() {
        let mut builder = CellBuilder::new();
        builder.store_zeros(1023).unwrap();
        for _ in 0..4 {
            builder.store_ref(Cell::empty()).unwrap();
        }
        assert_eq!(builder.available_bits(), 0);
        assert_eq!(builder.available_refs(), 0);

        assert_eq!(
            builder.clone().store_bit(false).unwrap_err(),
            CellError::Overflow { bits: 1024, refs: 4 }
        );
        assert_eq!(
            builder.clone().store_ref(Cell::empty()).unwrap_err(),
            CellError::Overflow { bits: 1023, refs: 5 }
        );

        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 1023);
        assert_eq!(cell.reference_count(), 4);
    }

    #[test]
    fn test_failed_store_leaves_builder_untouched() {
        let mut builder = CellBuilder::new();
        builder.store_zeros(1020).unwrap();
        assert!(builder.store_byte(0xAA).is_err());
        assert_eq!(builder.bit_len(), 1020);
        builder.store_uint(0b101, 3).unwrap();
        assert_eq!(builder.bit_len(), 1023);
    }

    #[test]
    fn test_store_uint_out_of_range() {
        let mut builder = CellBuilder::new();
        assert_eq!(
            builder.store_uint(8, 3).unwrap_err(),
            CellError::OutOfRange { bits: 3 }
        );
        builder.store_uint(7, 3).unwrap();
        builder.store_uint(1, 100).unwrap();
        assert_eq!(builder.bit_len(), 103);
    }

    #[test]
    fn test_store_int() {
        let mut builder = CellBuilder::new();
        builder.store_int(-1, 8).unwrap();
        builder.store_int(-128, 8).unwrap();
        assert!(builder.store_int(128, 8).is_err());
        assert!(builder.store_int(-129, 8).is_err());
        let cell = builder.build().unwrap();
        assert_eq!(cell.data(), &[0xFF, 0x80]);
    }

    #[test]
    fn test_store_big_int() {
        let mut builder = CellBuilder::new();
        builder.store_big_int(&BigInt::from(-2), 257).unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 257);
        assert!(cell.bits().is_uniform(0, 256) == Some(true));
        assert_eq!(cell.bits().get(256), Some(false));

        let mut builder = CellBuilder::new();
        let too_big = BigUint::from(1u8) << 256;
        assert!(builder.store_big_uint(&too_big, 256).is_err());
    }

    #[test]
    fn test_zero_coins_is_single_nibble() {
        let mut builder = CellBuilder::new();
        builder.store_coins(0).unwrap();
        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 4);
        assert_eq!(cell.data(), &[0x00]);
    }

    #[test]
    fn test_builder_coins() {
        let mut builder = CellBuilder::new();
        builder.store_coins(1_000_000_000).unwrap();
        let cell = builder.build().unwrap();
        // 4 bits length + 4 bytes
        assert_eq!(cell.bit_len(), 36);
        assert_eq!(cell.bits().read_uint(0, 4).unwrap(), 4);
        assert_eq!(cell.bits().read_uint(4, 32).unwrap(), 1_000_000_000);

        let mut builder = CellBuilder::new();
        assert!(builder.store_coins(1u128 << 120).is_err());
        assert!(builder.store_coins((1u128 << 120) - 1).is_ok());
    }

    #[test]
    fn test_builder_address() {
        let addr = Address::new(0, [0u8; 32]);
        let mut builder = CellBuilder::new();
        builder.store_address(Some(&addr)).unwrap();
        builder.store_address(None).unwrap();

        let cell = builder.build().unwrap();
        // 2 bits (addr_std) + 1 bit (no anycast) + 8 bits (workchain) + 256 bits (hash) + 2 bits (addr_none)
        assert_eq!(cell.bit_len(), 269);
    }

    #[test]
    fn test_builder_snake_string() {
        let long_string = "a".repeat(200);
        let mut builder = CellBuilder::new();
        builder.store_snake_string(&long_string, false).unwrap();

        let cell = builder.build().unwrap();
        assert_eq!(cell.bit_len(), 127 * 8);
        assert_eq!(cell.reference_count(), 1);
        assert_eq!(cell.references()[0].bit_len(), 73 * 8);
    }

    #[test]
    fn test_reset() {
        let mut builder = CellBuilder::new();
        builder.store_u64(42).unwrap();
        builder.store_ref(Cell::empty()).unwrap();
        builder.reset();
        assert_eq!(builder.bit_len(), 0);
        assert_eq!(builder.ref_count(), 0);
        assert_eq!(builder.build().unwrap().repr_hash(), Cell::empty().repr_hash());
    }

    #[test]
    fn test_store_cell_and_slice() {
        let mut inner = CellBuilder::new();
        inner.store_u16(0xBEEF).unwrap();
        inner.store_ref(Cell::empty()).unwrap();
        let inner = inner.build().unwrap();

        let mut builder = CellBuilder::new();
        builder.store_cell(&inner).unwrap();
        let mut slice = inner.as_slice();
        slice.skip_bits(8).unwrap();
        builder.store_slice(&slice).unwrap();

        let cell = builder.build().unwrap();
        assert_eq!(cell.data(), &[0xBE, 0xEF, 0xEF]);
        assert_eq!(cell.reference_count(), 2);
    }
}
