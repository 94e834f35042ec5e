//! Type Language (TL) implementation of the lite-server protocol
//!
//! Every boxed value starts with a little-endian constructor id. Optional
//! fields are gated by bits of a `mode` field, which `tl-proto` derives from
//! the fields that are present.

pub mod adnl;
pub mod common;
pub mod error;
pub mod request;
pub mod response;
pub mod utils;


// Re-export commonly used types
pub use adnl::{Message, build_query, build_query_after_seqno, parse_answer, parse_query};
pub use common::{AccountId, BlockId, BlockIdExt, Int256, ZeroStateIdExt};
pub use error::TlError;
pub use request::{LiteQuery, Request, WaitMasterchainSeqno, WrappedRequest};
pub use response::{Error, Response};
pub use utils::tl_id;
