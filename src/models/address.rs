//! Message addresses (`MsgAddress`)

use crate::models::traits::{TLB, unknown_variant};
use crate::tvm::address::Address;
use crate::tvm::bitstring::BitString;
use crate::tvm::builder::CellBuilder;
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;

/// `anycast_info$_ depth:(#<= 30) { depth >= 1 } rewrite_pfx:(bits depth)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anycast {
    pub rewrite_pfx: BitString,
}

impl Anycast {
    pub const MAX_DEPTH: usize = 30;
    const DEPTH_BITS: usize = 5;

    pub fn new(rewrite_pfx: BitString) -> Result<Self> {
        check_anycast_depth(rewrite_pfx.len())?;
        Ok(Self { rewrite_pfx })
    }

    pub fn depth(&self) -> usize {
        self.rewrite_pfx.len()
    }
}

fn check_anycast_depth(depth: usize) -> Result<()> {
    if depth == 0 || depth > Anycast::MAX_DEPTH {
        return Err(CellError::SchemaMismatch(format!(
            "anycast depth {depth} is outside 1..=30"
        )));
    }
    Ok(())
}

impl TLB for Anycast {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let depth = slice.load_uint(Self::DEPTH_BITS)? as usize;
        check_anycast_depth(depth)?;
        Ok(Self {
            rewrite_pfx: slice.load_bits(depth)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        check_anycast_depth(self.depth())?;
        builder.store_uint(self.depth() as u64, Self::DEPTH_BITS)?;
        builder.store_bitstring(&self.rewrite_pfx)?;
        Ok(())
    }
}

/// Any message address.
///
/// ```text
/// addr_none$00 = MsgAddressExt;
/// addr_extern$01 len:(## 9) external_address:(bits len) = MsgAddressExt;
/// addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256 = MsgAddressInt;
/// addr_var$11 anycast:(Maybe Anycast) addr_len:(## 9) workchain_id:int32
///     address:(bits addr_len) = MsgAddressInt;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MsgAddress {
    #[default]
    None,
    Extern(BitString),
    IntStd {
        anycast: Option<Anycast>,
        workchain: i8,
        address: [u8; 32],
    },
    IntVar {
        anycast: Option<Anycast>,
        workchain: i32,
        address: BitString,
    },
}

impl MsgAddress {
    const LEN_BITS: usize = 9;

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// True for `addr_std` and `addr_var`
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::IntStd { .. } | Self::IntVar { .. })
    }

    /// True for `addr_none` and `addr_extern`
    pub fn is_external(&self) -> bool {
        matches!(self, Self::None | Self::Extern(_))
    }

    /// Standard address without anycast, if this is one
    pub fn to_address(&self) -> Option<Address> {
        match self {
            Self::IntStd {
                anycast: None,
                workchain,
                address,
            } => Some(Address::new(*workchain, *address)),
            _ => None,
        }
    }

    pub(crate) fn expect_internal(self, field: &str) -> Result<Self> {
        if self.is_internal() {
            Ok(self)
        } else {
            Err(CellError::SchemaMismatch(format!(
                "{field} must be an internal address"
            )))
        }
    }

    pub(crate) fn expect_external(self, field: &str) -> Result<Self> {
        if self.is_external() {
            Ok(self)
        } else {
            Err(CellError::SchemaMismatch(format!(
                "{field} must be an external address"
            )))
        }
    }
}

impl From<Address> for MsgAddress {
    fn from(address: Address) -> Self {
        Self::IntStd {
            anycast: None,
            workchain: address.workchain,
            address: address.hash_part,
        }
    }
}

impl From<&Address> for MsgAddress {
    fn from(address: &Address) -> Self {
        Self::from(address.clone())
    }
}

impl TLB for MsgAddress {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let tag = slice.load_uint(2)?;
        match tag {
            0b00 => Ok(Self::None),
            0b01 => {
                let len = slice.load_uint(Self::LEN_BITS)? as usize;
                Ok(Self::Extern(slice.load_bits(len)?))
            }
            0b10 => Ok(Self::IntStd {
                anycast: Option::<Anycast>::read(slice)?,
                workchain: slice.load_i8()?,
                address: slice.load_u256()?,
            }),
            0b11 => {
                let anycast = Option::<Anycast>::read(slice)?;
                let len = slice.load_uint(Self::LEN_BITS)? as usize;
                Ok(Self::IntVar {
                    anycast,
                    workchain: slice.load_i32()?,
                    address: slice.load_bits(len)?,
                })
            }
            _ => Err(unknown_variant("MsgAddress", tag)),
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::None => {
                builder.store_uint(0b00, 2)?;
            }
            Self::Extern(bits) => {
                builder.store_uint(0b01, 2)?;
                builder.store_uint(bits.len() as u64, Self::LEN_BITS)?;
                builder.store_bitstring(bits)?;
            }
            Self::IntStd {
                anycast,
                workchain,
                address,
            } => {
                builder.store_uint(0b10, 2)?;
                anycast.write(builder)?;
                builder.store_int(*workchain as i64, 8)?;
                builder.store_bytes(address)?;
            }
            Self::IntVar {
                anycast,
                workchain,
                address,
            } => {
                builder.store_uint(0b11, 2)?;
                anycast.write(builder)?;
                builder.store_uint(address.len() as u64, Self::LEN_BITS)?;
                builder.store_int(*workchain as i64, 32)?;
                builder.store_bitstring(address)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(address: &MsgAddress) -> MsgAddress {
        MsgAddress::from_cell(&address.to_cell().unwrap()).unwrap()
    }

    #[test]
    fn test_address_none() {
        let cell = MsgAddress::None.to_cell().unwrap();
        assert_eq!(cell.bit_len(), 2);
        assert_eq!(roundtrip(&MsgAddress::None), MsgAddress::None);
    }

    #[test]
    fn test_address_std_matches_builder() {
        let address = Address::new(-1, [0xAB; 32]);
        let msg_address = MsgAddress::from(&address);
        let cell = msg_address.to_cell().unwrap();
        assert_eq!(cell.bit_len(), 267);

        let mut builder = CellBuilder::new();
        builder.store_address(Some(&address)).unwrap();
        assert_eq!(builder.build().unwrap().repr_hash(), cell.repr_hash());

        assert_eq!(roundtrip(&msg_address).to_address(), Some(address));
    }

    #[test]
    fn test_address_extern() {
        let bits = BitString::from_uint(0b1011, 4).unwrap();
        let address = MsgAddress::Extern(bits);
        assert_eq!(address.to_cell().unwrap().bit_len(), 2 + 9 + 4);
        assert_eq!(roundtrip(&address), address);
        assert!(address.is_external());
    }

    #[test]
    fn test_address_with_anycast() {
        let anycast = Anycast::new(BitString::from_uint(0b101, 3).unwrap()).unwrap();
        let std = MsgAddress::IntStd {
            anycast: Some(anycast.clone()),
            workchain: 0,
            address: [1; 32],
        };
        assert_eq!(std.to_cell().unwrap().bit_len(), 2 + 1 + 5 + 3 + 8 + 256);
        assert_eq!(roundtrip(&std), std);
        assert_eq!(std.to_address(), None);

        let var = MsgAddress::IntVar {
            anycast: Some(anycast),
            workchain: 1234,
            address: BitString::from_uint(0xFFFF, 16).unwrap(),
        };
        assert_eq!(roundtrip(&var), var);
    }

    #[test]
    fn test_anycast_depth_range() {
        assert!(Anycast::new(BitString::new()).is_err());

        // depth 31 does not fit the schema range
        let mut builder = CellBuilder::new();
        builder.store_uint(0b10, 2).unwrap();
        builder.store_bit(true).unwrap();
        builder.store_uint(31, 5).unwrap();
        builder.store_zeros(31 + 8 + 256).unwrap();
        let cell = builder.build().unwrap();
        assert!(matches!(
            MsgAddress::from_cell(&cell),
            Err(CellError::SchemaMismatch(_))
        ));
    }
}
