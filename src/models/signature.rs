//! Signed cell payloads

use crate::models::traits::{TLB, read_remaining};
use crate::tvm::builder::CellBuilder;
use crate::tvm::cell::{ArcCell, CellHash};
use crate::tvm::error::Result;
use crate::tvm::slice::CellSlice;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::borrow::Cow;

/// Prepends the big-endian signature id to the data when one is set
pub fn extend_signature_with_id(data: &[u8], signature_id: Option<i32>) -> Cow<'_, [u8]> {
    match signature_id {
        Some(signature_id) => {
            let mut result = Vec::with_capacity(4 + data.len());
            result.extend_from_slice(&signature_id.to_be_bytes());
            result.extend_from_slice(data);
            Cow::Owned(result)
        }
        None => Cow::Borrowed(data),
    }
}

/// Signs the representation hash of `cell`
pub fn sign_cell(key: &SigningKey, cell: &ArcCell, signature_id: Option<i32>) -> [u8; 64] {
    sign_hash(key, &cell.repr_hash(), signature_id)
}

pub fn sign_hash(key: &SigningKey, hash: &CellHash, signature_id: Option<i32>) -> [u8; 64] {
    let data = extend_signature_with_id(hash, signature_id);
    key.sign(&data).to_bytes()
}

/// Checks a detached signature over the representation hash of `cell`
pub fn verify_cell(
    key: &VerifyingKey,
    cell: &ArcCell,
    signature: &[u8; 64],
    signature_id: Option<i32>,
) -> bool {
    let hash = cell.repr_hash();
    let data = extend_signature_with_id(&hash, signature_id);
    key.verify(&data, &Signature::from_bytes(signature)).is_ok()
}

/// `signature:bits512` followed by the signed payload, which occupies the
/// rest of the cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBody {
    pub signature: [u8; 64],
    pub payload: ArcCell,
}

impl SignedBody {
    pub fn sign(key: &SigningKey, payload: ArcCell, signature_id: Option<i32>) -> Self {
        Self {
            signature: sign_cell(key, &payload, signature_id),
            payload,
        }
    }

    pub fn verify(&self, key: &VerifyingKey, signature_id: Option<i32>) -> bool {
        verify_cell(key, &self.payload, &self.signature, signature_id)
    }
}

impl TLB for SignedBody {
    fn read(slice: &mut CellSlice) -> Result<Self> {
        Ok(Self {
            signature: slice.load_array()?,
            payload: read_remaining(slice)?,
        })
    }

    fn write(&self, builder: &mut CellBuilder) -> Result<()> {
        builder.store_bytes(&self.signature)?;
        builder.store_cell(&self.payload)?;
        Ok(())
    }
}
