//! Reading and writing structured values as cells

use crate::tvm::boc::{deserialize_boc, serialize_boc};
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, CellHash};
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;

/// A value with a canonical TL-B cell encoding
pub trait TLB: Sized {
    /// Reads the value from the current position of `slice`
    fn read(slice: &mut CellSlice) -> Result<Self>;

    /// Appends the value to `builder`
    fn write(&self, builder: &mut CellBuilder) -> Result<()>;

    /// Reads a value that must occupy the whole cell
    fn from_cell(cell: &ArcCell) -> Result<Self> {
        let mut slice = CellSlice::new(cell.clone());
        let value = Self::read(&mut slice)?;
        slice.end_parse()?;
        Ok(value)
    }

    fn to_cell(&self) -> Result<ArcCell> {
        let mut builder = CellBuilder::new();
        self.write(&mut builder)?;
        builder.build()
    }

    fn from_boc(data: &[u8]) -> Result<Self> {
        Self::from_cell(&deserialize_boc(data)?)
    }

    fn to_boc(&self, has_crc32c: bool) -> Result<Vec<u8>> {
        serialize_boc(&self.to_cell()?, has_crc32c)
    }

    /// Representation hash of the encoded value
    fn cell_hash(&self) -> Result<CellHash> {
        Ok(self.to_cell()?.repr_hash())
    }

    /// Reads `^X`
    fn read_ref(slice: &mut CellSlice) -> Result<Self> {
        Self::from_cell(&slice.load_ref()?)
    }

    /// Writes `^X`
    fn write_ref(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_ref(self.to_cell()?)?;
        Ok(())
    }
}

/// `Maybe X`
impl<T: TLB> TLB for Option<T> {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if slice.load_bit()? {
            Ok(Some(T::read(slice)?))
        } else {
            Ok(None)
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Some(value) => {
                builder.store_bit(true)?;
                value.write(builder)
            }
            None => {
                builder.store_bit(false)?;
                Ok(())
            }
        }
    }
}

impl TLB for bool {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        slice.load_bit()
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_bit(*self)?;
        Ok(())
    }
}

impl TLB for i32 {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        slice.load_i32()
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_int(*self as i64, 32)?;
        Ok(())
    }
}

/// Reads `Either X ^X`
pub fn read_either<T: TLB>(slice: &mut CellSlice) -> Result<(T, bool)> {
    if slice.load_bit()? {
        Ok((T::read_ref(slice)?, true))
    } else {
        Ok((T::read(slice)?, false))
    }
}

/// Writes `Either X ^X`, inline unless `to_cell` is set
pub fn write_either<T: TLB>(value: &T, to_cell: bool, builder: &mut CellBuilder) -> Result<()> {
    builder.store_bit(to_cell)?;
    if to_cell {
        value.write_ref(builder)
    } else {
        value.write(builder)
    }
}

/// Reads every remaining bit and reference of `slice` into a new cell
pub fn read_remaining(slice: &mut CellSlice) -> Result<ArcCell> {
    let bits = slice.load_remaining_bits();
    let references = slice.load_remaining_refs();
    let mut builder = CellBuilder::new();
    builder.store_bitstring(&bits)?;
    for reference in references {
        builder.store_ref(reference)?;
    }
    builder.build()
}

pub(crate) fn unknown_variant(ty: &'static str, tag: u64) -> CellError {
    CellError::UnknownVariant { ty, tag }
}
