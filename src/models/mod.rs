//! Structured blockchain values encoded as cells (TL-B)
//!
//! Every entity implements [`TLB`]. Union types are closed enums dispatched
//! on their leading tag bits; `Maybe X` fields are `Option<X>`.

pub mod account;
pub mod address;
pub mod currency;
pub mod message;
pub mod signature;
pub mod state_init;
pub mod traits;
pub mod transaction;

#[cfg(test)]
mod tests;

pub use account::{
    Account, AccountState, AccountStatus, AccountStorage, ShardAccount, StorageInfo, StorageUsed,
};
pub use address::{Anycast, MsgAddress};
pub use currency::{Coins, CurrencyCollection};
pub use message::{
    Body, CommonMsgInfo, ExtInMsgInfo, ExtOutMsgInfo, IntMsgInfo, Message, MessageLayout,
};
pub use signature::{SignedBody, sign_cell, verify_cell};
pub use state_init::{SimpleLib, StateInit, TickTock};
pub use traits::TLB;
pub use transaction::{
    AccountStatusChange, ActionPhase, BouncePhase, ComputePhase, ComputePhaseVm,
    ComputeSkipReason, CreditPhase, HashUpdate, SplitMergeInfo, StoragePhase, StorageUsedShort,
    Transaction, TransactionDescr,
};
