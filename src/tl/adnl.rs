//! ADNL message envelopes around lite-server queries

use crate::tl::common::Int256;
use crate::tl::error::{Result, TlError};
use crate::tl::request::{LiteQuery, Request, WaitMasterchainSeqno, WrappedRequest};
use crate::tl::response::Response;
use log::{debug, trace};
use tl_proto::{TlRead, TlWrite};

#[derive(TlRead, TlWrite, Debug, Clone, PartialEq, Eq)]
#[tl(boxed)]
pub enum Message {
    #[tl(id = 0xb48bf97a)]
    Query { query_id: Int256, query: Vec<u8> },
    #[tl(id = 0x0fac8416)]
    Answer { query_id: Int256, answer: Vec<u8> },
}

/// Serializes `request` as `adnl.message.query` wrapping `liteServer.query`
pub fn build_query(query_id: Int256, request: &Request) -> Vec<u8> {
    build_wrapped_query(query_id, &WrappedRequest::from(request.clone()))
}

/// Like [`build_query`], but makes the server wait for a masterchain seqno first
pub fn build_query_after_seqno(
    query_id: Int256,
    request: &Request,
    wait: WaitMasterchainSeqno,
) -> Vec<u8> {
    let wrapped = WrappedRequest {
        wait_masterchain_seqno: Some(wait),
        request: request.clone(),
    };
    build_wrapped_query(query_id, &wrapped)
}

fn build_wrapped_query(query_id: Int256, request: &WrappedRequest) -> Vec<u8> {
    let query = tl_proto::serialize(LiteQuery::new(request));
    trace!("built query {} of {} bytes", query_id, query.len());
    tl_proto::serialize(Message::Query { query_id, query })
}

/// Parses a query built by [`build_query`] back into its parts
pub fn parse_query(data: &[u8]) -> Result<(Int256, WrappedRequest)> {
    match tl_proto::deserialize::<Message>(data)? {
        Message::Query { query_id, query } => {
            let lite_query = tl_proto::deserialize::<LiteQuery>(&query)?;
            Ok((query_id, lite_query.request()?))
        }
        Message::Answer { .. } => Err(TlError::UnexpectedConstructor(ANSWER_ID)),
    }
}

/// Parses `adnl.message.answer` for the query with `expected_id`.
///
/// A `liteServer.error` answer becomes [`TlError::LiteServer`].
pub fn parse_answer(data: &[u8], expected_id: &Int256) -> Result<Response> {
    let (query_id, answer) = match tl_proto::deserialize::<Message>(data)? {
        Message::Answer { query_id, answer } => (query_id, answer),
        Message::Query { .. } => return Err(TlError::UnexpectedConstructor(QUERY_ID)),
    };
    if &query_id != expected_id {
        return Err(TlError::QueryIdMismatch {
            expected: expected_id.to_hex(),
            actual: query_id.to_hex(),
        });
    }
    parse_response(&answer)
}

/// Parses a bare response body
pub fn parse_response(data: &[u8]) -> Result<Response> {
    match tl_proto::deserialize::<Response>(data)? {
        Response::Error(error) => {
            debug!("lite server error {}: {}", error.code, error.message);
            Err(TlError::LiteServer {
                code: error.code,
                message: error.message.to_string(),
            })
        }
        response => Ok(response),
    }
}

const QUERY_ID: u32 = 0xb48bf97a;
const ANSWER_ID: u32 = 0x0fac8416;
