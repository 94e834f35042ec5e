//! Lite-server queries

use crate::tl::common::*;
use crate::tl::error::{Result, TlError};
use crate::tl::utils::peek_id;
use tl_proto::{TlRead, TlWrite};

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetMasterchainInfoExt {
    pub mode: u32,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetBlock {
    pub id: BlockIdExt,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetBlockHeader {
    pub id: BlockIdExt,
    pub mode: u32,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub body: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetAccountState {
    pub id: BlockIdExt,
    pub account: AccountId,
}

/// Runs a get-method. `mode` selects which proofs and extras the server
/// includes in its `RunMethodResult`.
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct RunSmcMethod {
    pub mode: u32,
    pub id: BlockIdExt,
    pub account: AccountId,
    pub method_id: u64,
    pub params: Vec<u8>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetTransactions {
    pub count: u32,
    pub account: AccountId,
    pub lt: u64,
    pub hash: Int256,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetOneTransaction {
    pub id: BlockIdExt,
    pub account: AccountId,
    pub lt: u64,
}

/// Finds a block by seqno (bit 0), logical time (bit 1) or unix time (bit 2)
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct LookupBlock {
    #[tl(flags)]
    pub mode: (),
    pub id: BlockId,
    #[tl(flags_bit = 0)]
    pub seqno: Option<()>,
    #[tl(flags_bit = 1)]
    pub lt: Option<u64>,
    #[tl(flags_bit = 2)]
    pub utime: Option<u32>,
}

/// Lists transactions of a block.
///
/// Bits 0..=2 ask for the account, lt and hash of every returned id.
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct ListBlockTransactions {
    pub id: BlockIdExt,
    #[tl(flags)]
    pub mode: (),
    pub count: u32,
    #[tl(flags_bit = 0)]
    pub want_account: Option<()>,
    #[tl(flags_bit = 1)]
    pub want_lt: Option<()>,
    #[tl(flags_bit = 2)]
    pub want_hash: Option<()>,
    #[tl(flags_bit = 7)]
    pub after: Option<TransactionId3>,
    #[tl(flags_bit = 6)]
    pub reverse_order: Option<()>,
    #[tl(flags_bit = 5)]
    pub want_proof: Option<()>,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetConfigAll {
    pub mode: u32,
    pub id: BlockIdExt,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct GetLibraries {
    pub library_list: Vec<Int256>,
}

/// Delays a query until the masterchain reaches `seqno`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
#[tl(boxed, id = 0xbaeab892)]
pub struct WaitMasterchainSeqno {
    pub seqno: u32,
    pub timeout_ms: u32,
}

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
#[tl(boxed)]
pub enum Request {
    #[tl(id = 0x89b5e62e)]
    GetMasterchainInfo,
    #[tl(id = 0x70a671df)]
    GetMasterchainInfoExt(GetMasterchainInfoExt),
    #[tl(id = 0x16ad5a34)]
    GetTime,
    #[tl(id = 0x232b940b)]
    GetVersion,
    #[tl(id = 0x6377cf0d)]
    GetBlock(GetBlock),
    #[tl(id = 0x21ec069e)]
    GetBlockHeader(GetBlockHeader),
    #[tl(id = 0x690ad482)]
    SendMessage(SendMessage),
    #[tl(id = 0x6b890e25)]
    GetAccountState(GetAccountState),
    #[tl(id = 0x5cc65dd2)]
    RunSmcMethod(RunSmcMethod),
    #[tl(id = 0x1c40e7a1)]
    GetTransactions(GetTransactions),
    #[tl(id = 0xd40f24ea)]
    GetOneTransaction(GetOneTransaction),
    #[tl(id = 0xfac8f71e)]
    LookupBlock(LookupBlock),
    #[tl(id = 0xadfcc7da)]
    ListBlockTransactions(ListBlockTransactions),
    #[tl(id = 0x911b26b7)]
    GetConfigAll(GetConfigAll),
    #[tl(id = 0xd122b662)]
    GetLibraries(GetLibraries),
}

/// A request optionally prefixed with `liteServer.waitMasterchainSeqno`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedRequest {
    pub wait_masterchain_seqno: Option<WaitMasterchainSeqno>,
    pub request: Request,
}

impl WrappedRequest {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        if let Some(wait) = &self.wait_masterchain_seqno {
            data.extend(tl_proto::serialize(wait));
        }
        data.extend(tl_proto::serialize(&self.request));
        data
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let id = peek_id(data).ok_or(TlError::Proto(tl_proto::TlError::UnexpectedEof))?;
        if id == WAIT_MASTERCHAIN_SEQNO_ID {
            let (prefix, rest) = data.split_at(WAIT_PREFIX_LEN.min(data.len()));
            let wait = tl_proto::deserialize::<WaitMasterchainSeqno>(prefix)?;
            Ok(Self {
                wait_masterchain_seqno: Some(wait),
                request: tl_proto::deserialize(rest)?,
            })
        } else {
            Ok(Self {
                wait_masterchain_seqno: None,
                request: tl_proto::deserialize(data)?,
            })
        }
    }
}

impl From<Request> for WrappedRequest {
    fn from(request: Request) -> Self {
        Self {
            wait_masterchain_seqno: None,
            request,
        }
    }
}

pub(crate) const WAIT_MASTERCHAIN_SEQNO_ID: u32 = 0xbaeab892;
const WAIT_PREFIX_LEN: usize = 12;

/// `liteServer.query`: a serialized request carried as bytes
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
#[tl(boxed, id = 0x798c06df)]
pub struct LiteQuery {
    pub data: Vec<u8>,
}

impl LiteQuery {
    pub fn new(request: &WrappedRequest) -> Self {
        Self {
            data: request.to_bytes(),
        }
    }

    pub fn request(&self) -> Result<WrappedRequest> {
        WrappedRequest::from_bytes(&self.data)
    }
}
