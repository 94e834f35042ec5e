//! Growable bit buffer
//!
//! Bits are stored most-significant-bit first. The unused tail of the last
//! byte is always zero, so two bit strings with the same bits compare equal
//! and sort in lexicographic bit order.

use crate::tvm::error::{CellError, Result};
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitString {
    data: Vec<u8>,
    len: usize,
}

impl BitString {
    /// Creates an empty bit string
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty bit string with room for `bits` bits
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            data: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
        }
    }

    /// Creates a bit string from whole bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            len: bytes.len() * 8,
        }
    }

    /// Creates a bit string from the first `len` bits of `data`
    pub fn from_raw(mut data: Vec<u8>, len: usize) -> Result<Self> {
        let required = len.div_ceil(8);
        if data.len() < required {
            return Err(CellError::bits_underrun(len, data.len() * 8));
        }
        data.truncate(required);
        if len % 8 != 0 {
            if let Some(last) = data.last_mut() {
                *last &= 0xff << (8 - len % 8);
            }
        }
        Ok(Self { data, len })
    }

    /// Creates a bit string holding `bits` low bits of `value`
    pub fn from_uint(value: u64, bits: usize) -> Result<Self> {
        let mut result = Self::with_capacity(bits);
        result.push_uint(value, bits)?;
        Ok(result)
    }

    /// Parses bytes that carry a completion tag: a single `1` bit followed by
    /// zeros up to the byte boundary marks the end of the data.
    pub fn from_padded_bytes(data: &[u8], exact_bytes: bool) -> Result<Self> {
        if exact_bytes {
            return Ok(Self::from_bytes(data));
        }
        let Some(&last) = data.last() else {
            return Err(CellError::InvalidCell("missing completion tag"));
        };
        if last == 0 {
            return Err(CellError::InvalidCell("missing completion tag"));
        }
        let len = data.len() * 8 - last.trailing_zeros() as usize - 1;
        Self::from_raw(data.to_vec(), len)
    }

    /// Number of bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Underlying bytes; the unused tail of the last byte is zero
    pub fn as_raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes with a completion tag appended when the length is not byte aligned
    pub fn to_padded_bytes(&self) -> Vec<u8> {
        let mut result = self.data.clone();
        if self.len % 8 != 0 {
            if let Some(last) = result.last_mut() {
                *last |= 1 << (7 - self.len % 8);
            }
        }
        result
    }

    /// Returns the bit at `index`
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some((self.data[index / 8] >> (7 - index % 8)) & 1 == 1)
    }

    /// Appends a single bit
    pub fn push_bit(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 1 << (7 - self.len % 8);
        }
        self.len += 1;
    }

    /// Appends the low `bits` bits of `value`, most significant first
    pub fn push_uint(&mut self, value: u64, bits: usize) -> Result<()> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(CellError::OutOfRange { bits });
        }
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    /// Appends `count` copies of `bit`
    pub fn push_repeated(&mut self, bit: bool, count: usize) {
        for _ in 0..count {
            self.push_bit(bit);
        }
    }

    /// Appends `len` bits of `data` starting at bit `offset`
    pub fn append_raw(&mut self, data: &[u8], offset: usize, len: usize) -> Result<()> {
        let available = (data.len() * 8).saturating_sub(offset);
        if len > available {
            return Err(CellError::bits_underrun(len, available));
        }
        if self.len % 8 == 0 && offset % 8 == 0 {
            let start = offset / 8;
            let whole = len / 8;
            self.data.extend_from_slice(&data[start..start + whole]);
            self.len += whole * 8;
            for i in whole * 8..len {
                let pos = offset + i;
                self.push_bit((data[pos / 8] >> (7 - pos % 8)) & 1 == 1);
            }
            return Ok(());
        }
        for i in 0..len {
            let pos = offset + i;
            self.push_bit((data[pos / 8] >> (7 - pos % 8)) & 1 == 1);
        }
        Ok(())
    }

    /// Appends another bit string
    pub fn append(&mut self, other: &BitString) {
        // `other` always holds enough bytes for its own length
        let _ = self.append_raw(&other.data, 0, other.len);
    }

    /// Copies `len` bits starting at `start`
    pub fn range(&self, start: usize, len: usize) -> Result<BitString> {
        if start + len > self.len {
            return Err(CellError::bits_underrun(start + len, self.len));
        }
        let mut result = BitString::with_capacity(len);
        result.append_raw(&self.data, start, len)?;
        Ok(result)
    }

    /// Reads `bits` bits starting at `offset` as a big-endian unsigned integer
    pub fn read_uint(&self, offset: usize, bits: usize) -> Result<u64> {
        if bits > 64 {
            return Err(CellError::OutOfRange { bits });
        }
        if offset + bits > self.len {
            return Err(CellError::bits_underrun(bits, self.len.saturating_sub(offset)));
        }
        let mut result = 0u64;
        for pos in offset..offset + bits {
            result = (result << 1) | ((self.data[pos / 8] >> (7 - pos % 8)) & 1) as u64;
        }
        Ok(result)
    }

    /// Returns `Some(bit)` if all bits in `start..start + len` are equal to `bit`
    pub fn is_uniform(&self, start: usize, len: usize) -> Option<bool> {
        let first = self.get(start)?;
        if start + len > self.len {
            return None;
        }
        for i in start + 1..start + len {
            if self.get(i)? != first {
                return None;
            }
        }
        Some(first)
    }

    /// Length of the common prefix of `self` and `other`
    pub fn common_prefix_len(&self, other: &BitString) -> usize {
        let max = self.len.min(other.len);
        let mut i = 0;
        while i < max && self.get(i) == other.get(i) {
            i += 1;
        }
        i
    }

    /// Whether `self` starts with `prefix`
    pub fn starts_with(&self, prefix: &BitString) -> bool {
        prefix.len <= self.len && self.common_prefix_len(prefix) == prefix.len
    }

    /// Iterates over the bits
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| (self.data[i / 8] >> (7 - i % 8)) & 1 == 1)
    }

    /// Fift-style hex representation: `x{...}`, with a trailing `_` when a
    /// completion tag was appended to reach a nibble boundary
    pub fn to_fift_hex(&self) -> String {
        let mut padded = self.clone();
        let tagged = self.len % 4 != 0;
        if tagged {
            padded.push_bit(true);
            while padded.len % 4 != 0 {
                padded.push_bit(false);
            }
        }
        let mut hex = hex::encode_upper(&padded.data);
        hex.truncate(padded.len / 4);
        if tagged {
            hex.push('_');
        }
        format!("x{{{hex}}}")
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let mut result = BitString::new();
        for bit in iter {
            result.push_bit(bit);
        }
        result
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fift_hex())
    }
}

impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitString({}, {} bits)", self.to_fift_hex(), self.len)
    }
}
