//! Transactions, their descriptions and execution phases

use crate::models::account::{AccountStatus, VAR_UINT7_LEN_BITS};
use crate::models::currency::{Coins, CurrencyCollection};
use crate::models::message::Message;
use crate::models::traits::{TLB, unknown_variant};
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, CellHash};
use crate::tvm::dict::{Dict, uint_key};
use crate::tvm::error::{CellError, Result};
use crate::tvm::slice::CellSlice;

/// Length prefix width of `VarUInteger 3`
const VAR_UINT3_LEN_BITS: usize = 2;

/// `update_hashes#72 {X:Type} old_hash:bits256 new_hash:bits256 = HASH_UPDATE X`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashUpdate {
    pub old_hash: CellHash,
    pub new_hash: CellHash,
}

impl HashUpdate {
    const TAG: u8 = 0x72;
}

impl TLB for HashUpdate {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let tag = slice.load_u8()?;
        if tag != Self::TAG {
            return Err(unknown_variant("HashUpdate", tag as u64));
        }
        Ok(Self {
            old_hash: slice.load_u256()?,
            new_hash: slice.load_u256()?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_byte(Self::TAG)?;
        builder.store_bytes(&self.old_hash)?;
        builder.store_bytes(&self.new_hash)?;
        Ok(())
    }
}

/// `acst_unchanged$0 acst_frozen$10 acst_deleted$11 = AccStatusChange`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatusChange {
    Unchanged,
    Frozen,
    Deleted,
}

impl TLB for AccountStatusChange {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if !slice.load_bit()? {
            return Ok(Self::Unchanged);
        }
        if slice.load_bit()? {
            Ok(Self::Deleted)
        } else {
            Ok(Self::Frozen)
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::Unchanged => builder.store_bit(false)?,
            Self::Frozen => builder.store_uint(0b10, 2)?,
            Self::Deleted => builder.store_uint(0b11, 2)?,
        };
        Ok(())
    }
}

/// `storage_used_short$_ cells:(VarUInteger 7) bits:(VarUInteger 7)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageUsedShort {
    pub cells: u64,
    pub bits: u64,
}

impl TLB for StorageUsedShort {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            cells: slice.load_var_uint(VAR_UINT7_LEN_BITS)?,
            bits: slice.load_var_uint(VAR_UINT7_LEN_BITS)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_var_uint(self.cells, VAR_UINT7_LEN_BITS)?;
        builder.store_var_uint(self.bits, VAR_UINT7_LEN_BITS)?;
        Ok(())
    }
}

/// Storage phase: the account pays for keeping its state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePhase {
    pub storage_fees_collected: Coins,
    pub storage_fees_due: Option<Coins>,
    pub status_change: AccountStatusChange,
}

impl TLB for StoragePhase {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            storage_fees_collected: Coins::read(slice)?,
            storage_fees_due: Option::<Coins>::read(slice)?,
            status_change: AccountStatusChange::read(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        self.storage_fees_collected.write(builder)?;
        self.storage_fees_due.write(builder)?;
        self.status_change.write(builder)
    }
}

/// Credit phase: the inbound value is added to the balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditPhase {
    pub due_fees_collected: Option<Coins>,
    pub credit: CurrencyCollection,
}

impl TLB for CreditPhase {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            due_fees_collected: Option::<Coins>::read(slice)?,
            credit: CurrencyCollection::read(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        self.due_fees_collected.write(builder)?;
        self.credit.write(builder)
    }
}

/// `cskip_no_state$00 cskip_bad_state$01 cskip_no_gas$10 cskip_suspended$110`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeSkipReason {
    NoState,
    BadState,
    NoGas,
    Suspended,
}

impl TLB for ComputeSkipReason {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let tag = slice.load_uint(2)?;
        Ok(match tag {
            0b00 => Self::NoState,
            0b01 => Self::BadState,
            0b10 => Self::NoGas,
            _ => {
                if slice.load_bit()? {
                    return Err(unknown_variant("ComputeSkipReason", 0b111));
                }
                Self::Suspended
            }
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::NoState => builder.store_uint(0b00, 2)?,
            Self::BadState => builder.store_uint(0b01, 2)?,
            Self::NoGas => builder.store_uint(0b10, 2)?,
            Self::Suspended => builder.store_uint(0b110, 3)?,
        };
        Ok(())
    }
}

/// Executed compute phase; the VM details live in a child cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePhaseVm {
    pub success: bool,
    pub msg_state_used: bool,
    pub account_activated: bool,
    pub gas_fees: Coins,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub gas_credit: Option<u64>,
    pub mode: i8,
    pub exit_code: i32,
    pub exit_arg: Option<i32>,
    pub vm_steps: u32,
    pub vm_init_state_hash: CellHash,
    pub vm_final_state_hash: CellHash,
}

/// `tr_phase_compute_skipped$0 | tr_phase_compute_vm$1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputePhase {
    Skipped(ComputeSkipReason),
    Vm(Box<ComputePhaseVm>),
}

impl TLB for ComputePhase {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if !slice.load_bit()? {
            return Ok(Self::Skipped(ComputeSkipReason::read(slice)?));
        }

        let success = slice.load_bit()?;
        let msg_state_used = slice.load_bit()?;
        let account_activated = slice.load_bit()?;
        let gas_fees = Coins::read(slice)?;

        let mut details = CellSlice::new(slice.load_ref()?);
        let gas_used = details.load_var_uint(VAR_UINT7_LEN_BITS)?;
        let gas_limit = details.load_var_uint(VAR_UINT7_LEN_BITS)?;
        let gas_credit = if details.load_bit()? {
            Some(details.load_var_uint(VAR_UINT3_LEN_BITS)?)
        } else {
            None
        };
        let phase = ComputePhaseVm {
            success,
            msg_state_used,
            account_activated,
            gas_fees,
            gas_used,
            gas_limit,
            gas_credit,
            mode: details.load_i8()?,
            exit_code: details.load_i32()?,
            exit_arg: Option::<i32>::read(&mut details)?,
            vm_steps: details.load_u32()?,
            vm_init_state_hash: details.load_u256()?,
            vm_final_state_hash: details.load_u256()?,
        };
        details.end_parse()?;
        Ok(Self::Vm(Box::new(phase)))
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        let phase = match self {
            Self::Skipped(reason) => {
                builder.store_bit(false)?;
                return reason.write(builder);
            }
            Self::Vm(phase) => phase,
        };

        let mut details = CellBuilder::new();
        details.store_var_uint(phase.gas_used, VAR_UINT7_LEN_BITS)?;
        details.store_var_uint(phase.gas_limit, VAR_UINT7_LEN_BITS)?;
        match phase.gas_credit {
            Some(credit) => {
                details.store_bit(true)?;
                details.store_var_uint(credit, VAR_UINT3_LEN_BITS)?;
            }
            None => {
                details.store_bit(false)?;
            }
        }
        details.store_int(phase.mode as i64, 8)?;
        details.store_int(phase.exit_code as i64, 32)?;
        phase.exit_arg.write(&mut details)?;
        details.store_u32(phase.vm_steps)?;
        details.store_bytes(&phase.vm_init_state_hash)?;
        details.store_bytes(&phase.vm_final_state_hash)?;

        builder.store_bit(true)?;
        builder.store_bit(phase.success)?;
        builder.store_bit(phase.msg_state_used)?;
        builder.store_bit(phase.account_activated)?;
        phase.gas_fees.write(builder)?;
        builder.store_ref(details.build()?)?;
        Ok(())
    }
}

/// Action phase: the produced action list is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPhase {
    pub success: bool,
    pub valid: bool,
    pub no_funds: bool,
    pub status_change: AccountStatusChange,
    pub total_fwd_fees: Option<Coins>,
    pub total_action_fees: Option<Coins>,
    pub result_code: i32,
    pub result_arg: Option<i32>,
    pub tot_actions: u16,
    pub spec_actions: u16,
    pub skipped_actions: u16,
    pub msgs_created: u16,
    pub action_list_hash: CellHash,
    pub tot_msg_size: StorageUsedShort,
}

impl TLB for ActionPhase {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            success: slice.load_bit()?,
            valid: slice.load_bit()?,
            no_funds: slice.load_bit()?,
            status_change: AccountStatusChange::read(slice)?,
            total_fwd_fees: Option::<Coins>::read(slice)?,
            total_action_fees: Option::<Coins>::read(slice)?,
            result_code: slice.load_i32()?,
            result_arg: Option::<i32>::read(slice)?,
            tot_actions: slice.load_u16()?,
            spec_actions: slice.load_u16()?,
            skipped_actions: slice.load_u16()?,
            msgs_created: slice.load_u16()?,
            action_list_hash: slice.load_u256()?,
            tot_msg_size: StorageUsedShort::read(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_bit(self.success)?;
        builder.store_bit(self.valid)?;
        builder.store_bit(self.no_funds)?;
        self.status_change.write(builder)?;
        self.total_fwd_fees.write(builder)?;
        self.total_action_fees.write(builder)?;
        builder.store_int(self.result_code as i64, 32)?;
        self.result_arg.write(builder)?;
        builder.store_u16(self.tot_actions)?;
        builder.store_u16(self.spec_actions)?;
        builder.store_u16(self.skipped_actions)?;
        builder.store_u16(self.msgs_created)?;
        builder.store_bytes(&self.action_list_hash)?;
        self.tot_msg_size.write(builder)
    }
}

/// ```text
/// tr_phase_bounce_negfunds$00 = TrBouncePhase;
/// tr_phase_bounce_nofunds$01 msg_size:StorageUsedShort req_fwd_fees:Grams = TrBouncePhase;
/// tr_phase_bounce_ok$1 msg_size:StorageUsedShort msg_fees:Grams fwd_fees:Grams = TrBouncePhase;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BouncePhase {
    NegativeFunds,
    NoFunds {
        msg_size: StorageUsedShort,
        req_fwd_fees: Coins,
    },
    Ok {
        msg_size: StorageUsedShort,
        msg_fees: Coins,
        fwd_fees: Coins,
    },
}

impl TLB for BouncePhase {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        if slice.load_bit()? {
            return Ok(Self::Ok {
                msg_size: StorageUsedShort::read(slice)?,
                msg_fees: Coins::read(slice)?,
                fwd_fees: Coins::read(slice)?,
            });
        }
        if slice.load_bit()? {
            Ok(Self::NoFunds {
                msg_size: StorageUsedShort::read(slice)?,
                req_fwd_fees: Coins::read(slice)?,
            })
        } else {
            Ok(Self::NegativeFunds)
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::NegativeFunds => {
                builder.store_uint(0b00, 2)?;
            }
            Self::NoFunds {
                msg_size,
                req_fwd_fees,
            } => {
                builder.store_uint(0b01, 2)?;
                msg_size.write(builder)?;
                req_fwd_fees.write(builder)?;
            }
            Self::Ok {
                msg_size,
                msg_fees,
                fwd_fees,
            } => {
                builder.store_bit(true)?;
                msg_size.write(builder)?;
                msg_fees.write(builder)?;
                fwd_fees.write(builder)?;
            }
        }
        Ok(())
    }
}

/// `split_merge_info$_ cur_shard_pfx_len:(## 6) acc_split_depth:(## 6) this_addr:bits256 sibling_addr:bits256`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMergeInfo {
    pub cur_shard_pfx_len: u8,
    pub acc_split_depth: u8,
    pub this_addr: CellHash,
    pub sibling_addr: CellHash,
}

impl TLB for SplitMergeInfo {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            cur_shard_pfx_len: slice.load_uint(6)? as u8,
            acc_split_depth: slice.load_uint(6)? as u8,
            this_addr: slice.load_u256()?,
            sibling_addr: slice.load_u256()?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_uint(self.cur_shard_pfx_len as u64, 6)?;
        builder.store_uint(self.acc_split_depth as u64, 6)?;
        builder.store_bytes(&self.this_addr)?;
        builder.store_bytes(&self.sibling_addr)?;
        Ok(())
    }
}

/// `action:(Maybe ^TrActionPhase)`
fn read_action(slice: &mut CellSlice) -> Result<Option<ActionPhase>> {
    match slice.load_maybe_ref()? {
        Some(cell) => Ok(Some(ActionPhase::from_cell(&cell)?)),
        None => Ok(None),
    }
}

fn write_action(action: &Option<ActionPhase>, builder: &mut CellBuilder) -> Result<()> {
    let cell = match action {
        Some(action) => Some(action.to_cell()?),
        None => None,
    };
    builder.store_maybe_ref(cell)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinaryDescr {
    pub credit_first: bool,
    pub storage_ph: Option<StoragePhase>,
    pub credit_ph: Option<CreditPhase>,
    pub compute_ph: ComputePhase,
    pub action: Option<ActionPhase>,
    pub aborted: bool,
    pub bounce: Option<BouncePhase>,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickTockDescr {
    pub is_tock: bool,
    pub storage_ph: StoragePhase,
    pub compute_ph: ComputePhase,
    pub action: Option<ActionPhase>,
    pub aborted: bool,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPrepareDescr {
    pub split_info: SplitMergeInfo,
    pub storage_ph: Option<StoragePhase>,
    pub compute_ph: ComputePhase,
    pub action: Option<ActionPhase>,
    pub aborted: bool,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitInstallDescr {
    pub split_info: SplitMergeInfo,
    pub prepare_transaction: ArcCell,
    pub installed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrepareDescr {
    pub split_info: SplitMergeInfo,
    pub storage_ph: StoragePhase,
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInstallDescr {
    pub split_info: SplitMergeInfo,
    pub prepare_transaction: ArcCell,
    pub storage_ph: Option<StoragePhase>,
    pub credit_ph: Option<CreditPhase>,
    pub compute_ph: ComputePhase,
    pub action: Option<ActionPhase>,
    pub aborted: bool,
    pub destroyed: bool,
}

/// ```text
/// trans_ord$0000 trans_storage$0001 trans_tick_tock$001
/// trans_split_prepare$0100 trans_split_install$0101
/// trans_merge_prepare$0110 trans_merge_install$0111
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionDescr {
    Ordinary(OrdinaryDescr),
    Storage(StoragePhase),
    TickTock(TickTockDescr),
    SplitPrepare(SplitPrepareDescr),
    SplitInstall(SplitInstallDescr),
    MergePrepare(MergePrepareDescr),
    MergeInstall(MergeInstallDescr),
}

impl TLB for TransactionDescr {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let prefix = slice.load_uint(3)?;
        if prefix == 0b001 {
            return Ok(Self::TickTock(TickTockDescr {
                is_tock: slice.load_bit()?,
                storage_ph: StoragePhase::read(slice)?,
                compute_ph: ComputePhase::read(slice)?,
                action: read_action(slice)?,
                aborted: slice.load_bit()?,
                destroyed: slice.load_bit()?,
            }));
        }

        let tag = (prefix << 1) | slice.load_uint(1)?;
        Ok(match tag {
            0b0000 => Self::Ordinary(OrdinaryDescr {
                credit_first: slice.load_bit()?,
                storage_ph: Option::<StoragePhase>::read(slice)?,
                credit_ph: Option::<CreditPhase>::read(slice)?,
                compute_ph: ComputePhase::read(slice)?,
                action: read_action(slice)?,
                aborted: slice.load_bit()?,
                bounce: Option::<BouncePhase>::read(slice)?,
                destroyed: slice.load_bit()?,
            }),
            0b0001 => Self::Storage(StoragePhase::read(slice)?),
            0b0100 => Self::SplitPrepare(SplitPrepareDescr {
                split_info: SplitMergeInfo::read(slice)?,
                storage_ph: Option::<StoragePhase>::read(slice)?,
                compute_ph: ComputePhase::read(slice)?,
                action: read_action(slice)?,
                aborted: slice.load_bit()?,
                destroyed: slice.load_bit()?,
            }),
            0b0101 => Self::SplitInstall(SplitInstallDescr {
                split_info: SplitMergeInfo::read(slice)?,
                prepare_transaction: slice.load_ref()?,
                installed: slice.load_bit()?,
            }),
            0b0110 => Self::MergePrepare(MergePrepareDescr {
                split_info: SplitMergeInfo::read(slice)?,
                storage_ph: StoragePhase::read(slice)?,
                aborted: slice.load_bit()?,
            }),
            0b0111 => Self::MergeInstall(MergeInstallDescr {
                split_info: SplitMergeInfo::read(slice)?,
                prepare_transaction: slice.load_ref()?,
                storage_ph: Option::<StoragePhase>::read(slice)?,
                credit_ph: Option::<CreditPhase>::read(slice)?,
                compute_ph: ComputePhase::read(slice)?,
                action: read_action(slice)?,
                aborted: slice.load_bit()?,
                destroyed: slice.load_bit()?,
            }),
            _ => return Err(unknown_variant("TransactionDescr", tag)),
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        match self {
            Self::Ordinary(descr) => {
                builder.store_uint(0b0000, 4)?;
                builder.store_bit(descr.credit_first)?;
                descr.storage_ph.write(builder)?;
                descr.credit_ph.write(builder)?;
                descr.compute_ph.write(builder)?;
                write_action(&descr.action, builder)?;
                builder.store_bit(descr.aborted)?;
                descr.bounce.write(builder)?;
                builder.store_bit(descr.destroyed)?;
            }
            Self::Storage(storage_ph) => {
                builder.store_uint(0b0001, 4)?;
                storage_ph.write(builder)?;
            }
            Self::TickTock(descr) => {
                builder.store_uint(0b001, 3)?;
                builder.store_bit(descr.is_tock)?;
                descr.storage_ph.write(builder)?;
                descr.compute_ph.write(builder)?;
                write_action(&descr.action, builder)?;
                builder.store_bit(descr.aborted)?;
                builder.store_bit(descr.destroyed)?;
            }
            Self::SplitPrepare(descr) => {
                builder.store_uint(0b0100, 4)?;
                descr.split_info.write(builder)?;
                descr.storage_ph.write(builder)?;
                descr.compute_ph.write(builder)?;
                write_action(&descr.action, builder)?;
                builder.store_bit(descr.aborted)?;
                builder.store_bit(descr.destroyed)?;
            }
            Self::SplitInstall(descr) => {
                builder.store_uint(0b0101, 4)?;
                descr.split_info.write(builder)?;
                builder.store_ref(descr.prepare_transaction.clone())?;
                builder.store_bit(descr.installed)?;
            }
            Self::MergePrepare(descr) => {
                builder.store_uint(0b0110, 4)?;
                descr.split_info.write(builder)?;
                descr.storage_ph.write(builder)?;
                builder.store_bit(descr.aborted)?;
            }
            Self::MergeInstall(descr) => {
                builder.store_uint(0b0111, 4)?;
                descr.split_info.write(builder)?;
                builder.store_ref(descr.prepare_transaction.clone())?;
                descr.storage_ph.write(builder)?;
                descr.credit_ph.write(builder)?;
                descr.compute_ph.write(builder)?;
                write_action(&descr.action, builder)?;
                builder.store_bit(descr.aborted)?;
                builder.store_bit(descr.destroyed)?;
            }
        }
        Ok(())
    }
}

/// ```text
/// transaction$0111 account_addr:bits256 lt:uint64
///   prev_trans_hash:bits256 prev_trans_lt:uint64 now:uint32
///   outmsg_cnt:uint15 orig_status:AccountStatus end_status:AccountStatus
///   ^[ in_msg:(Maybe ^(Message Any)) out_msgs:(HashmapE 15 ^(Message Any)) ]
///   total_fees:CurrencyCollection state_update:^(HASH_UPDATE Account)
///   description:^TransactionDescr = Transaction;
/// ```
///
/// Messages are kept as cells; [`Transaction::in_message`] and
/// [`Transaction::out_messages`] decode them on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub account_addr: CellHash,
    pub lt: u64,
    pub prev_trans_hash: CellHash,
    pub prev_trans_lt: u64,
    pub now: u32,
    pub outmsg_cnt: u16,
    pub orig_status: AccountStatus,
    pub end_status: AccountStatus,
    pub in_msg: Option<ArcCell>,
    pub out_msgs: Dict,
    pub total_fees: CurrencyCollection,
    pub state_update: HashUpdate,
    pub description: TransactionDescr,
}

impl Transaction {
    const TAG: u64 = 0b0111;
    const OUT_MSG_KEY_BITS: usize = 15;

    pub fn in_message(&self) -> Result<Option<Message>> {
        match &self.in_msg {
            Some(cell) => Ok(Some(Message::from_cell(cell)?)),
            None => Ok(None),
        }
    }

    /// Outbound messages in creation order
    pub fn out_messages(&self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        for entry in &self.out_msgs {
            let (_, mut value) = entry?;
            messages.push(Message::read_ref(&mut value)?);
            value.end_parse()?;
        }
        Ok(messages)
    }

    /// Sets the outbound messages, keyed by position
    pub fn set_out_messages(&mut self, messages: &[Message]) -> Result<()> {
        let mut entries = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let mut value = CellBuilder::new();
            message.write_ref(&mut value)?;
            entries.push((
                uint_key(index as u64, Self::OUT_MSG_KEY_BITS)?,
                value.to_slice()?,
            ));
        }
        self.out_msgs = Dict::from_entries(Self::OUT_MSG_KEY_BITS, entries)?;
        self.outmsg_cnt = messages.len() as u16;
        Ok(())
    }

    pub fn is_aborted(&self) -> bool {
        match &self.description {
            TransactionDescr::Ordinary(descr) => descr.aborted,
            TransactionDescr::Storage(_) => false,
            TransactionDescr::TickTock(descr) => descr.aborted,
            TransactionDescr::SplitPrepare(descr) => descr.aborted,
            TransactionDescr::SplitInstall(_) => false,
            TransactionDescr::MergePrepare(descr) => descr.aborted,
            TransactionDescr::MergeInstall(descr) => descr.aborted,
        }
    }
}

impl TLB for Transaction {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        let tag = slice.load_uint(4)?;
        if tag != Self::TAG {
            return Err(unknown_variant("Transaction", tag));
        }
        let account_addr = slice.load_u256()?;
        let lt = slice.load_u64()?;
        let prev_trans_hash = slice.load_u256()?;
        let prev_trans_lt = slice.load_u64()?;
        let now = slice.load_u32()?;
        let outmsg_cnt = slice.load_uint(15)? as u16;
        let orig_status = AccountStatus::read(slice)?;
        let end_status = AccountStatus::read(slice)?;

        let mut messages = CellSlice::new(slice.load_ref()?);
        let in_msg = messages.load_maybe_ref()?;
        let out_msgs = Dict::load(&mut messages, Self::OUT_MSG_KEY_BITS)?;
        messages.end_parse()?;

        let total_fees = CurrencyCollection::read(slice)?;
        let state_update = HashUpdate::read_ref(slice)?;
        let description = TransactionDescr::read_ref(slice)?;

        Ok(Self {
            account_addr,
            lt,
            prev_trans_hash,
            prev_trans_lt,
            now,
            outmsg_cnt,
            orig_status,
            end_status,
            in_msg,
            out_msgs,
            total_fees,
            state_update,
            description,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        if self.out_msgs.key_bits() != Self::OUT_MSG_KEY_BITS {
            return Err(CellError::InvalidKey {
                expected: Self::OUT_MSG_KEY_BITS,
                actual: self.out_msgs.key_bits(),
            });
        }
        builder.store_uint(Self::TAG, 4)?;
        builder.store_bytes(&self.account_addr)?;
        builder.store_u64(self.lt)?;
        builder.store_bytes(&self.prev_trans_hash)?;
        builder.store_u64(self.prev_trans_lt)?;
        builder.store_u32(self.now)?;
        builder.store_uint(self.outmsg_cnt as u64, 15)?;
        self.orig_status.write(builder)?;
        self.end_status.write(builder)?;

        let mut messages = CellBuilder::new();
        messages.store_maybe_ref(self.in_msg.clone())?;
        self.out_msgs.store(&mut messages)?;
        builder.store_ref(messages.build()?)?;

        self.total_fees.write(builder)?;
        self.state_update.write_ref(builder)?;
        self.description.write_ref(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::address::MsgAddress;
    use crate::models::message::{CommonMsgInfo, ExtOutMsgInfo, IntMsgInfo};
    use crate::tvm::address::Address;
    use crate::tvm::cell::Cell;

    fn vm_phase() -> ComputePhase {
        ComputePhase::Vm(Box::new(ComputePhaseVm {
            success: true,
            msg_state_used: false,
            account_activated: false,
            gas_fees: Coins(1_000_000),
            gas_used: 2_994,
            gas_limit: 0,
            gas_credit: Some(10_000),
            mode: 0,
            exit_code: 0,
            exit_arg: None,
            vm_steps: 68,
            vm_init_state_hash: [0; 32],
            vm_final_state_hash: [0; 32],
        }))
    }

    fn action_phase() -> ActionPhase {
        ActionPhase {
            success: true,
            valid: true,
            no_funds: false,
            status_change: AccountStatusChange::Unchanged,
            total_fwd_fees: Some(Coins(666_672)),
            total_action_fees: Some(Coins(222_224)),
            result_code: 0,
            result_arg: None,
            tot_actions: 1,
            spec_actions: 0,
            skipped_actions: 0,
            msgs_created: 1,
            action_list_hash: [3; 32],
            tot_msg_size: StorageUsedShort {
                cells: 1,
                bits: 705,
            },
        }
    }

    fn ordinary_descr() -> TransactionDescr {
        TransactionDescr::Ordinary(OrdinaryDescr {
            credit_first: false,
            storage_ph: Some(StoragePhase {
                storage_fees_collected: Coins(151),
                storage_fees_due: None,
                status_change: AccountStatusChange::Unchanged,
            }),
            credit_ph: Some(CreditPhase {
                due_fees_collected: None,
                credit: CurrencyCollection::new(1_000_000_000u64),
            }),
            compute_ph: vm_phase(),
            action: Some(action_phase()),
            aborted: false,
            bounce: None,
            destroyed: false,
        })
    }

    fn inbound() -> Message {
        let info = CommonMsgInfo::Int(IntMsgInfo {
            ihr_disabled: true,
            bounce: true,
            src: MsgAddress::from(Address::new(0, [5; 32])),
            dest: MsgAddress::from(Address::new(0, [6; 32])),
            value: CurrencyCollection::new(1_000_000_000u64),
            created_lt: 10,
            created_at: 1_700_000_000,
            ..Default::default()
        });
        Message::new(info, Cell::empty())
    }

    fn outbound(lt: u64) -> Message {
        let info = CommonMsgInfo::ExtOut(ExtOutMsgInfo {
            src: MsgAddress::from(Address::new(0, [6; 32])),
            dest: MsgAddress::None,
            created_lt: lt,
            created_at: 1_700_000_000,
        });
        Message::new(info, Cell::empty())
    }

    fn transaction() -> Transaction {
        let mut transaction = Transaction {
            account_addr: [6; 32],
            lt: 12,
            prev_trans_hash: [7; 32],
            prev_trans_lt: 8,
            now: 1_700_000_001,
            outmsg_cnt: 0,
            orig_status: AccountStatus::Active,
            end_status: AccountStatus::Active,
            in_msg: Some(inbound().to_cell().unwrap()),
            out_msgs: Dict::new(15),
            total_fees: CurrencyCollection::new(1_888_896u64),
            state_update: HashUpdate {
                old_hash: [1; 32],
                new_hash: [2; 32],
            },
            description: ordinary_descr(),
        };
        transaction
            .set_out_messages(&[outbound(13), outbound(14)])
            .unwrap();
        transaction
    }

    #[test]
    fn test_hash_update_layout() {
        let update = HashUpdate {
            old_hash: [1; 32],
            new_hash: [2; 32],
        };
        let cell = update.to_cell().unwrap();
        assert_eq!(cell.bit_len(), 8 + 512);
        assert_eq!(cell.data()[0], 0x72);
        assert_eq!(HashUpdate::from_cell(&cell).unwrap(), update);
    }

    #[test]
    fn test_compute_phase_skipped_reasons() {
        for (reason, bits) in [
            (ComputeSkipReason::NoState, 3),
            (ComputeSkipReason::BadState, 3),
            (ComputeSkipReason::NoGas, 3),
            (ComputeSkipReason::Suspended, 4),
        ] {
            let phase = ComputePhase::Skipped(reason);
            let cell = phase.to_cell().unwrap();
            assert_eq!(cell.bit_len(), bits);
            assert_eq!(ComputePhase::from_cell(&cell).unwrap(), phase);
        }
    }

    #[test]
    fn test_compute_phase_vm_details_in_reference() {
        let phase = vm_phase();
        let cell = phase.to_cell().unwrap();
        assert_eq!(cell.reference_count(), 1);
        assert_eq!(ComputePhase::from_cell(&cell).unwrap(), phase);
    }

    #[test]
    fn test_bounce_phase_variants() {
        let size = StorageUsedShort { cells: 1, bits: 10 };
        for phase in [
            BouncePhase::NegativeFunds,
            BouncePhase::NoFunds {
                msg_size: size,
                req_fwd_fees: Coins(100),
            },
            BouncePhase::Ok {
                msg_size: size,
                msg_fees: Coins(1),
                fwd_fees: Coins(2),
            },
        ] {
            assert_eq!(BouncePhase::from_cell(&phase.to_cell().unwrap()).unwrap(), phase);
        }
        assert_eq!(BouncePhase::NegativeFunds.to_cell().unwrap().bit_len(), 2);
    }

    #[test]
    fn test_descr_tags() {
        let storage = StoragePhase {
            storage_fees_collected: Coins::ZERO,
            storage_fees_due: None,
            status_change: AccountStatusChange::Frozen,
        };
        let split_info = SplitMergeInfo {
            cur_shard_pfx_len: 3,
            acc_split_depth: 5,
            this_addr: [1; 32],
            sibling_addr: [2; 32],
        };
        let cases = [
            (ordinary_descr(), 0b0000, 4),
            (TransactionDescr::Storage(storage.clone()), 0b0001, 4),
            (
                TransactionDescr::TickTock(TickTockDescr {
                    is_tock: true,
                    storage_ph: storage.clone(),
                    compute_ph: ComputePhase::Skipped(ComputeSkipReason::NoGas),
                    action: None,
                    aborted: true,
                    destroyed: false,
                }),
                0b001,
                3,
            ),
            (
                TransactionDescr::SplitInstall(SplitInstallDescr {
                    split_info: split_info.clone(),
                    prepare_transaction: Cell::empty(),
                    installed: true,
                }),
                0b0101,
                4,
            ),
            (
                TransactionDescr::MergePrepare(MergePrepareDescr {
                    split_info,
                    storage_ph: storage,
                    aborted: false,
                }),
                0b0110,
                4,
            ),
        ];
        for (descr, tag, tag_bits) in cases {
            let cell = descr.to_cell().unwrap();
            let mut slice = CellSlice::new(cell.clone());
            assert_eq!(slice.load_uint(tag_bits).unwrap(), tag);
            assert_eq!(TransactionDescr::from_cell(&cell).unwrap(), descr);
        }
    }

    #[test]
    fn test_unknown_descr_tag() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b1000, 4).unwrap();
        let cell = builder.build().unwrap();
        assert!(matches!(
            TransactionDescr::from_cell(&cell),
            Err(CellError::UnknownVariant {
                ty: "TransactionDescr",
                ..
            })
        ));
    }

    #[test]
    fn test_transaction_roundtrip() {
        let transaction = transaction();
        let boc = transaction.to_boc(true).unwrap();
        let decoded = Transaction::from_boc(&boc).unwrap();
        assert_eq!(decoded, transaction);
        assert_eq!(decoded.outmsg_cnt, 2);
        assert!(!decoded.is_aborted());

        let in_msg = decoded.in_message().unwrap().unwrap();
        assert!(in_msg.info.is_internal());

        let out_msgs = decoded.out_messages().unwrap();
        assert_eq!(out_msgs.len(), 2);
        match &out_msgs[1].info {
            CommonMsgInfo::ExtOut(info) => assert_eq!(info.created_lt, 14),
            other => panic!("unexpected info {other:?}"),
        }
    }

    #[test]
    fn test_transaction_cell_shape() {
        let cell = transaction().to_cell().unwrap();
        // messages, state update, description
        assert_eq!(cell.reference_count(), 3);
        let mut slice = CellSlice::new(cell);
        assert_eq!(slice.load_uint(4).unwrap(), 0b0111);
        assert_eq!(slice.load_u256().unwrap(), [6; 32]);
        assert_eq!(slice.load_u64().unwrap(), 12);
    }

    #[test]
    fn test_out_msgs_key_width_is_checked() {
        let mut transaction = transaction();
        transaction.out_msgs = Dict::new(16);
        assert!(matches!(
            transaction.to_cell(),
            Err(CellError::InvalidKey { .. })
        ));
    }
}
