//! Currency amounts

use crate::models::traits::TLB;
use crate::tvm::builder::CellBuilder;
use crate::tvm::dict::{Dict, uint_key};
use crate::tvm::dict_aug::AugExtra;
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;
use num_bigint::BigUint;
use std::collections::BTreeMap;
use std::fmt;

/// Length prefix width of `VarUInteger 32`
const EXTRA_LEN_BITS: usize = 5;

/// Amount of nanotons (`Grams`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Coins(pub u128);

impl Coins {
    pub const ZERO: Self = Self(0);

    pub fn new(amount: u128) -> Self {
        Self(amount)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u128> for Coins {
    fn from(amount: u128) -> Self {
        Self(amount)
    }
}

impl From<u64> for Coins {
    fn from(amount: u64) -> Self {
        Self(amount as u128)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TLB for Coins {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self(slice.load_coins()?))
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_coins(self.0)?;
        Ok(())
    }
}

/// Balances summed over an augmented dictionary
impl AugExtra for Coins {
    fn load_extra(slice: &mut CellSlice) -> Result<Self> {
        Self::read(slice)
    }

    fn store_extra(&self, builder: &mut CellBuilder) -> Result<()> {
        self.write(builder)
    }

    fn combine(left: &Self, right: &Self) -> Result<Self> {
        left.0
            .checked_add(right.0)
            .filter(|sum| *sum < 1 << 120)
            .map(Self)
            .ok_or(CellError::OutOfRange { bits: 120 })
    }
}

/// Nanotons plus extra currencies keyed by currency id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurrencyCollection {
    pub grams: Coins,
    pub other: BTreeMap<u32, BigUint>,
}

impl CurrencyCollection {
    pub fn new(grams: impl Into<Coins>) -> Self {
        Self {
            grams: grams.into(),
            other: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, currency: u32, amount: BigUint) -> Self {
        self.other.insert(currency, amount);
        self
    }
}

impl TLB for CurrencyCollection {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let grams = Coins::read(slice)?;
        let dict = Dict::load(slice, 32)?;

        let mut other = BTreeMap::new();
        for entry in &dict {
            let (key, mut value) = entry?;
            let amount = value.load_var_big_uint(EXTRA_LEN_BITS)?;
            value.end_parse()?;
            other.insert(key.read_uint(0, 32)? as u32, amount);
        }
        Ok(Self { grams, other })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        self.grams.write(builder)?;

        let mut entries = Vec::with_capacity(self.other.len());
        for (currency, amount) in &self.other {
            let mut value = CellBuilder::new();
            value.store_var_big_uint(amount, EXTRA_LEN_BITS)?;
            entries.push((uint_key(*currency as u64, 32)?, value.to_slice()?));
        }
        Dict::from_entries(32, entries)?.store(builder)
    }
}
