//! Lite-server answers

use crate::tl::common::*;
use tl_proto::{TlRead, TlWrite};

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct MasterchainInfo {
    pub last: BlockIdExt,
    pub state_root_hash: Int256,
    pub init: ZeroStateIdExt,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct MasterchainInfoExt {
    pub mode: u32,
    pub version: i32,
    pub capabilities: i64,
    pub last: BlockIdExt,
    pub last_utime: u32,
    pub now: u32,
    pub state_root_hash: Int256,
    pub init: ZeroStateIdExt,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct CurrentTime {
    pub now: u32,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub mode: u32,
    pub version: i32,
    pub capabilities: i64,
    pub now: u32,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub id: BlockIdExt,
    pub data: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub id: BlockIdExt,
    pub mode: u32,
    pub header_proof: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct SendMsgStatus {
    pub status: i32,
}

/// Account state as a BoC of `ShardAccount` plus its proofs
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub id: BlockIdExt,
    pub shardblk: BlockIdExt,
    pub shard_proof: Vec<u8>,
    pub proof: Vec<u8>,
    pub state: Vec<u8>,
}

/// `shard_proof` and `proof` of a get-method result, both present under mode bit 0
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct RunMethodProofs {
    pub shard_proof: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Result of a get-method; optional parts follow the request mode
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct RunMethodResult {
    #[tl(flags)]
    pub mode: (),
    pub id: BlockIdExt,
    pub shardblk: BlockIdExt,
    #[tl(flags_bit = 0)]
    pub proofs: Option<RunMethodProofs>,
    #[tl(flags_bit = 1)]
    pub state_proof: Option<Vec<u8>>,
    #[tl(flags_bit = 3)]
    pub init_c7: Option<Vec<u8>>,
    #[tl(flags_bit = 4)]
    pub lib_extras: Option<Vec<u8>>,
    pub exit_code: i32,
    #[tl(flags_bit = 2)]
    pub result: Option<Vec<u8>>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub id: BlockIdExt,
    pub proof: Vec<u8>,
    pub transaction: Vec<u8>,
}

/// Transactions as a single BoC with one root per transaction
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct TransactionList {
    pub ids: Vec<BlockIdExt>,
    pub transactions: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct BlockTransactions {
    pub id: BlockIdExt,
    pub req_count: u32,
    pub incomplete: bool,
    pub ids: Vec<TransactionId>,
    pub proof: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct ConfigInfo {
    pub mode: u32,
    pub id: BlockIdExt,
    pub state_proof: Vec<u8>,
    pub config_proof: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct LibraryResult {
    pub result: Vec<LibraryEntry>,
}

/// `liteServer.error`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
#[tl(boxed)]
pub enum Response {
    #[tl(id = 0x85832881)]
    MasterchainInfo(MasterchainInfo),
    #[tl(id = 0xa8cce0f5)]
    MasterchainInfoExt(MasterchainInfoExt),
    #[tl(id = 0xe953000d)]
    CurrentTime(CurrentTime),
    #[tl(id = 0x5a0491e5)]
    Version(Version),
    #[tl(id = 0xa574ed6c)]
    BlockData(BlockData),
    #[tl(id = 0x752d8219)]
    BlockHeader(BlockHeader),
    #[tl(id = 0x3950e597)]
    SendMsgStatus(SendMsgStatus),
    #[tl(id = 0x7079c751)]
    AccountState(AccountState),
    #[tl(id = 0xa39a616b)]
    RunMethodResult(RunMethodResult),
    #[tl(id = 0x0edeed47)]
    TransactionInfo(TransactionInfo),
    #[tl(id = 0x6f26c60b)]
    TransactionList(TransactionList),
    #[tl(id = 0xbd8cad2b)]
    BlockTransactions(BlockTransactions),
    #[tl(id = 0xae7b272f)]
    ConfigInfo(ConfigInfo),
    #[tl(id = 0x117ab96b)]
    LibraryResult(LibraryResult),
    #[tl(id = 0xbba9e148)]
    Error(Error),
}
