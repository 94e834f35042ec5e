use crate::tvm::CellError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TlError>;

#[derive(Debug, Error)]
pub enum TlError {
    #[error("TL parsing error: {0}")]
    Proto(#[from] tl_proto::TlError),
    #[error("unexpected constructor {0:#010x}")]
    UnexpectedConstructor(u32),
    #[error("lite server error {code}: {message}")]
    LiteServer { code: i32, message: String },
    #[error("answer for query {actual} while waiting for {expected}")]
    QueryIdMismatch { expected: String, actual: String },
    #[error("cell error: {0}")]
    Cell(#[from] CellError),
}
