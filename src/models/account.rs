//! Account state

use crate::models::address::MsgAddress;
use crate::models::currency::{Coins, CurrencyCollection};
use crate::models::state_init::StateInit;
use crate::models::traits::{TLB, unknown_variant};
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::CellHash;
use crate::tvm::error::Result;
use crate::tvm::slice::CellSlice;

/// Length prefix width of `VarUInteger 7`
pub(crate) const VAR_UINT7_LEN_BITS: usize = 3;

/// `storage_used$_ cells:(VarUInteger 7) bits:(VarUInteger 7) public_cells:(VarUInteger 7)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageUsed {
    pub cells: u64,
    pub bits: u64,
    pub public_cells: u64,
}

impl TLB for StorageUsed {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            cells: slice.load_var_uint(VAR_UINT7_LEN_BITS)?,
            bits: slice.load_var_uint(VAR_UINT7_LEN_BITS)?,
            public_cells: slice.load_var_uint(VAR_UINT7_LEN_BITS)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_var_uint(self.cells, VAR_UINT7_LEN_BITS)?;
        builder.store_var_uint(self.bits, VAR_UINT7_LEN_BITS)?;
        builder.store_var_uint(self.public_cells, VAR_UINT7_LEN_BITS)?;
        Ok(())
    }
}

/// `storage_info$_ used:StorageUsed last_paid:uint32 due_payment:(Maybe Grams)`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageInfo {
    pub used: StorageUsed,
    pub last_paid: u32,
    pub due_payment: Option<Coins>,
}

impl TLB for StorageInfo {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            used: StorageUsed::read(slice)?,
            last_paid: slice.load_u32()?,
            due_payment: Option::<Coins>::read(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        self.used.write(builder)?;
        builder.store_u32(self.last_paid)?;
        self.due_payment.write(builder)
    }
}

/// ```text
/// account_uninit$00 = AccountState;
/// account_active$1 _:StateInit = AccountState;
/// account_frozen$01 state_hash:bits256 = AccountState;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountState {
    Uninit,
    Active(StateInit),
    Frozen(CellHash),
}

impl TLB for AccountState {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if slice.load_bit()? {
            return Ok(Self::Active(StateInit::read(slice)?));
        }
        if slice.load_bit()? {
            Ok(Self::Frozen(slice.load_u256()?))
        } else {
            Ok(Self::Uninit)
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::Uninit => {
                builder.store_uint(0b00, 2)?;
            }
            Self::Active(state) => {
                builder.store_bit(true)?;
                state.write(builder)?;
            }
            Self::Frozen(hash) => {
                builder.store_uint(0b01, 2)?;
                builder.store_bytes(hash)?;
            }
        }
        Ok(())
    }
}

/// `acc_state_uninit$00 acc_state_frozen$01 acc_state_active$10 acc_state_nonexist$11`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    Uninit = 0b00,
    Frozen = 0b01,
    Active = 0b10,
    NonExist = 0b11,
}

impl TLB for AccountStatus {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let tag = slice.load_uint(2)?;
        Ok(match tag {
            0b00 => Self::Uninit,
            0b01 => Self::Frozen,
            0b10 => Self::Active,
            0b11 => Self::NonExist,
            _ => return Err(unknown_variant("AccountStatus", tag)),
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_uint(*self as u64, 2)?;
        Ok(())
    }
}

/// `account_storage$_ last_trans_lt:uint64 balance:CurrencyCollection state:AccountState`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStorage {
    pub last_trans_lt: u64,
    pub balance: CurrencyCollection,
    pub state: AccountState,
}

impl TLB for AccountStorage {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            last_trans_lt: slice.load_u64()?,
            balance: CurrencyCollection::read(slice)?,
            state: AccountState::read(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_u64(self.last_trans_lt)?;
        self.balance.write(builder)?;
        self.state.write(builder)
    }
}

/// ```text
/// account_none$0 = Account;
/// account$1 addr:MsgAddressInt storage_stat:StorageInfo storage:AccountStorage = Account;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    None,
    Existing {
        address: MsgAddress,
        storage_stat: StorageInfo,
        storage: AccountStorage,
    },
}

impl Account {
    pub fn status(&self) -> AccountStatus {
        match self {
            Self::None => AccountStatus::NonExist,
            Self::Existing { storage, .. } => match storage.state {
                AccountState::Uninit => AccountStatus::Uninit,
                AccountState::Active(_) => AccountStatus::Active,
                AccountState::Frozen(_) => AccountStatus::Frozen,
            },
        }
    }

    pub fn balance(&self) -> Option<&CurrencyCollection> {
        match self {
            Self::None => None,
            Self::Existing { storage, .. } => Some(&storage.balance),
        }
    }
}

impl TLB for Account {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if !slice.load_bit()? {
            return Ok(Self::None);
        }
        Ok(Self::Existing {
            address: MsgAddress::read(slice)?.expect_internal("account address")?,
            storage_stat: StorageInfo::read(slice)?,
            storage: AccountStorage::read(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::None => {
                builder.store_bit(false)?;
            }
            Self::Existing {
                address,
                storage_stat,
                storage,
            } => {
                builder.store_bit(true)?;
                address.clone().expect_internal("account address")?.write(builder)?;
                storage_stat.write(builder)?;
                storage.write(builder)?;
            }
        }
        Ok(())
    }
}

/// `account_descr$_ account:^Account last_trans_hash:bits256 last_trans_lt:uint64`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardAccount {
    pub account: Account,
    pub last_trans_hash: CellHash,
    pub last_trans_lt: u64,
}

impl TLB for ShardAccount {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            account: Account::read_ref(slice)?,
            last_trans_hash: slice.load_u256()?,
            last_trans_lt: slice.load_u64()?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        self.account.write_ref(builder)?;
        builder.store_bytes(&self.last_trans_hash)?;
        builder.store_u64(self.last_trans_lt)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tvm::address::Address;
    use crate::tvm::cell::Cell;

    fn active_account() -> Account {
        Account::Existing {
            address: MsgAddress::from(Address::new(0, [9; 32])),
            storage_stat: StorageInfo {
                used: StorageUsed {
                    cells: 3,
                    bits: 1_250,
                    public_cells: 0,
                },
                last_paid: 1_700_000_000,
                due_payment: None,
            },
            storage: AccountStorage {
                last_trans_lt: 44_000_000_001,
                balance: CurrencyCollection::new(2_500_000_000u64),
                state: AccountState::Active(StateInit::new(Cell::empty(), Cell::empty())),
            },
        }
    }

    #[test]
    fn test_account_none_is_one_bit() {
        let cell = Account::None.to_cell().unwrap();
        assert_eq!(cell.bit_len(), 1);
        assert_eq!(Account::from_cell(&cell).unwrap(), Account::None);
        assert_eq!(Account::None.status(), AccountStatus::NonExist);
    }

    #[test]
    fn test_active_account_roundtrip() {
        let account = active_account();
        let decoded = Account::from_cell(&account.to_cell().unwrap()).unwrap();
        assert_eq!(decoded, account);
        assert_eq!(decoded.status(), AccountStatus::Active);
        assert_eq!(decoded.balance().unwrap().grams, Coins(2_500_000_000));
    }

    #[test]
    fn test_account_state_tags() {
        assert_eq!(AccountState::Uninit.to_cell().unwrap().bit_len(), 2);
        let frozen = AccountState::Frozen([7; 32]);
        let cell = frozen.to_cell().unwrap();
        assert_eq!(cell.bit_len(), 2 + 256);
        assert_eq!(AccountState::from_cell(&cell).unwrap(), frozen);
    }

    #[test]
    fn test_account_status_tags() {
        for status in [
            AccountStatus::Uninit,
            AccountStatus::Frozen,
            AccountStatus::Active,
            AccountStatus::NonExist,
        ] {
            let cell = status.to_cell().unwrap();
            assert_eq!(cell.bit_len(), 2);
            assert_eq!(AccountStatus::from_cell(&cell).unwrap(), status);
        }
    }

    #[test]
    fn test_shard_account() {
        let shard_account = ShardAccount {
            account: active_account(),
            last_trans_hash: [1; 32],
            last_trans_lt: 44_000_000_001,
        };
        let cell = shard_account.to_cell().unwrap();
        assert_eq!(cell.reference_count(), 1);
        assert_eq!(cell.bit_len(), 256 + 64);

        let boc = shard_account.to_boc(true).unwrap();
        assert_eq!(ShardAccount::from_boc(&boc).unwrap(), shard_account);
    }

    #[test]
    fn test_trailing_data_is_rejected() {
        let mut builder = CellBuilder::new();
        Account::None.write(&mut builder).unwrap();
        builder.store_bit(true).unwrap();
        let cell = builder.build().unwrap();
        assert!(Account::from_cell(&cell).is_err());
    }
}
