//! Bare types shared by lite-server requests and responses

use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use tl_proto::{TlRead, TlWrite};

/// 256-bit value (`int256`)
#[derive(TlRead, TlWrite, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[tl(size_hint = 32)]
pub struct Int256(pub [u8; 32]);

impl Int256 {
    /// Random value, used for query ids
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> std::string::String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl FromStr for Int256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Int256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Int256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for Int256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// TL `string`: raw bytes that are usually, but not necessarily, UTF-8
#[derive(TlRead, TlWrite, Clone, PartialEq, Eq, Hash, Default)]
pub struct String(Vec<u8>);

impl String {
    pub fn new(s: std::string::String) -> Self {
        Self(s.into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for String {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Debug for String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", std::string::String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&std::string::String::from_utf8_lossy(&self.0))
    }
}

/// `tonNode.blockId`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: u32,
}

/// `tonNode.blockIdExt`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockIdExt {
    pub workchain: i32,
    pub shard: i64,
    pub seqno: u32,
    pub root_hash: Int256,
    pub file_hash: Int256,
}

impl BlockIdExt {
    pub fn block_id(&self) -> BlockId {
        BlockId {
            workchain: self.workchain,
            shard: self.shard,
            seqno: self.seqno,
        }
    }
}

impl fmt::Display for BlockIdExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{:016x},{}):{}:{}",
            self.workchain, self.shard as u64, self.seqno, self.root_hash, self.file_hash
        )
    }
}

/// `tonNode.zeroStateIdExt`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZeroStateIdExt {
    pub workchain: i32,
    pub root_hash: Int256,
    pub file_hash: Int256,
}

/// `liteServer.accountId`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId {
    pub workchain: i32,
    pub id: Int256,
}

/// `liteServer.transactionId`; each field is present only when its mode bit is set
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct TransactionId {
    #[tl(flags)]
    pub mode: (),
    #[tl(flags_bit = 0)]
    pub account: Option<Int256>,
    #[tl(flags_bit = 1)]
    pub lt: Option<u64>,
    #[tl(flags_bit = 2)]
    pub hash: Option<Int256>,
}

/// `liteServer.transactionId3`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct TransactionId3 {
    pub account: Int256,
    pub lt: u64,
}

/// `liteServer.libraryEntry`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub hash: Int256,
    pub data: Vec<u8>,
}

/// `liteServer.signature`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub node_id_short: Int256,
    pub signature: Vec<u8>,
}

/// `liteServer.signatureSet`
#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    pub validator_set_hash: u32,
    pub catchain_seqno: u32,
    pub signatures: Vec<Signature>,
}
