//! Contract initial state

use crate::models::traits::TLB;
use crate::tvm::address::Address;
use crate::tvm::bitstring::BitString;
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, CellHash};
use crate::tvm::dict::Dict;
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;
use std::collections::BTreeMap;

/// `tick_tock$_ tick:Bool tock:Bool = TickTock`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickTock {
    pub tick: bool,
    pub tock: bool,
}

impl TLB for TickTock {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            tick: slice.load_bit()?,
            tock: slice.load_bit()?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_bit(self.tick)?;
        builder.store_bit(self.tock)?;
        Ok(())
    }
}

/// `simple_lib$_ public:Bool root:^Cell = SimpleLib`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleLib {
    pub public: bool,
    pub root: ArcCell,
}

impl TLB for SimpleLib {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            public: slice.load_bit()?,
            root: slice.load_ref()?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_bit(self.public)?;
        builder.store_ref(self.root.clone())?;
        Ok(())
    }
}

/// ```text
/// _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
///   code:(Maybe ^Cell) data:(Maybe ^Cell)
///   library:(HashmapE 256 SimpleLib) = StateInit;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateInit {
    pub split_depth: Option<u8>,
    pub special: Option<TickTock>,
    pub code: Option<ArcCell>,
    pub data: Option<ArcCell>,
    pub libraries: BTreeMap<CellHash, SimpleLib>,
}

impl StateInit {
    const SPLIT_DEPTH_BITS: usize = 5;

    pub fn new(code: ArcCell, data: ArcCell) -> Self {
        Self {
            code: Some(code),
            data: Some(data),
            ..Default::default()
        }
    }

    /// Address of the contract deployed with this state in `workchain`
    pub fn address(&self, workchain: i8) -> Result<Address> {
        Ok(Address::new(workchain, self.cell_hash()?))
    }
}

impl TLB for StateInit {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let split_depth = if slice.load_bit()? {
            Some(slice.load_uint(Self::SPLIT_DEPTH_BITS)? as u8)
        } else {
            None
        };
        let special = Option::<TickTock>::read(slice)?;
        let code = slice.load_maybe_ref()?;
        let data = slice.load_maybe_ref()?;

        let mut libraries = BTreeMap::new();
        for entry in &Dict::load(slice, 256)? {
            let (key, mut value) = entry?;
            let lib = SimpleLib::read(&mut value)?;
            value.end_parse()?;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(key.as_raw_data());
            if hash != lib.root.repr_hash() {
                return Err(CellError::SchemaMismatch(
                    "library key differs from its root hash".to_string(),
                ));
            }
            libraries.insert(hash, lib);
        }

        Ok(Self {
            split_depth,
            special,
            code,
            data,
            libraries,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self.split_depth {
            Some(depth) => {
                builder.store_bit(true)?;
                builder.store_uint(depth as u64, Self::SPLIT_DEPTH_BITS)?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }
        self.special.write(builder)?;
        builder.store_maybe_ref(self.code.clone())?;
        builder.store_maybe_ref(self.data.clone())?;

        let mut entries = Vec::with_capacity(self.libraries.len());
        for (hash, lib) in &self.libraries {
            let mut value = CellBuilder::new();
            lib.write(&mut value)?;
            entries.push((BitString::from_bytes(hash), value.to_slice()?));
        }
        Dict::from_entries(256, entries)?.store(builder)
    }
}
