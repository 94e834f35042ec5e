//! TON Address implementation
//!
//! Textual forms of a standard internal address: raw `workchain:hex` and the
//! 36-byte user-friendly form (flags, workchain, hash, CRC16) in base64.

use crate::crc::CRC16;
use crate::tl::common::{AccountId, Int256};
use base64::Engine;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid raw address: {0}")]
    InvalidRaw(String),
    #[error("invalid base64 address: {0}")]
    InvalidBase64(String),
    #[error("invalid address length {0}, expected 36 bytes")]
    InvalidLength(usize),
    #[error("invalid address tag {0:#04x}")]
    InvalidTag(u8),
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

/// Represents a TON blockchain address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Workchain ID (-1 for masterchain, 0 for basechain)
    pub workchain: i8,
    /// 32-byte hash part of the address
    pub hash_part: [u8; 32],
    /// Whether the address is bounceable
    pub is_bounceable: bool,
    /// Whether this is a test-only address
    pub is_test_only: bool,
}

impl Address {
    /// Creates a new address from workchain and hash part
    pub fn new(workchain: i8, hash_part: [u8; 32]) -> Self {
        Self {
            workchain,
            hash_part,
            is_bounceable: true,
            is_test_only: false,
        }
    }

    /// Parses address from raw format: "workchain:hash"
    pub fn from_raw(address: &str) -> Result<Self, AddressError> {
        let (workchain, hash_hex) = address
            .split_once(':')
            .ok_or_else(|| AddressError::InvalidRaw("missing ':' separator".to_string()))?;

        let workchain = workchain
            .parse::<i8>()
            .map_err(|e| AddressError::InvalidRaw(e.to_string()))?;
        if hash_hex.len() != 64 {
            return Err(AddressError::InvalidRaw(
                "hash part must be 64 hex characters".to_string(),
            ));
        }

        let mut hash_part = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash_part)
            .map_err(|e| AddressError::InvalidRaw(e.to_string()))?;

        Ok(Self::new(workchain, hash_part))
    }

    /// Parses address from base64 user-friendly format (either alphabet)
    pub fn from_base64(address: &str) -> Result<Self, AddressError> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(address)
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(address))
            .map_err(|e| AddressError::InvalidBase64(e.to_string()))?;

        if decoded.len() != 36 {
            return Err(AddressError::InvalidLength(decoded.len()));
        }

        let mut tag = decoded[0];
        let is_test_only = tag & 0x80 != 0;
        tag &= 0x7f;

        let is_bounceable = match tag {
            0x11 => true,
            0x51 => false,
            _ => return Err(AddressError::InvalidTag(decoded[0])),
        };

        if CRC16.checksum(&decoded[..34]).to_be_bytes() != decoded[34..36] {
            return Err(AddressError::ChecksumMismatch);
        }

        let mut hash_part = [0u8; 32];
        hash_part.copy_from_slice(&decoded[2..34]);

        Ok(Self {
            workchain: decoded[1] as i8,
            hash_part,
            is_bounceable,
            is_test_only,
        })
    }

    /// Converts to raw format (workchain:hash)
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    /// Converts to the user-friendly form with explicit flags
    pub fn to_friendly(&self, url_safe: bool, bounceable: bool, test_only: bool) -> String {
        let mut tag = if bounceable { 0x11u8 } else { 0x51u8 };
        if test_only {
            tag |= 0x80;
        }

        let mut data = Vec::with_capacity(36);
        data.push(tag);
        data.push(self.workchain as u8);
        data.extend_from_slice(&self.hash_part);
        data.extend_from_slice(&CRC16.checksum(&data).to_be_bytes());

        if url_safe {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&data)
        } else {
            base64::engine::general_purpose::STANDARD.encode(&data)
        }
    }

    /// Converts to user-friendly base64 format using the address's own flags
    pub fn to_base64(&self) -> String {
        self.to_friendly(true, self.is_bounceable, self.is_test_only)
    }

    /// Converts to the lite-protocol account id
    pub fn to_account_id(&self) -> AccountId {
        AccountId {
            workchain: self.workchain as i32,
            id: Int256(self.hash_part),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Accepts both the raw and the user-friendly form
    fn from_str(address: &str) -> Result<Self, Self::Err> {
        if address.contains(':') {
            Self::from_raw(address)
        } else {
            Self::from_base64(address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    #[test]
    fn test_address_raw() {
        let addr = Address::from_raw(RAW).unwrap();
        assert_eq!(addr.workchain, 0);
        assert_eq!(addr.to_raw(), RAW);
        assert!(Address::from_raw("0:abcd").is_err());
        assert!(Address::from_raw("x:00").is_err());
    }

    #[test]
    fn test_address_base64() {
        let addr_str = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N";
        let addr = Address::from_base64(addr_str).unwrap();
        assert_eq!(addr.workchain, 0);
        assert!(addr.is_bounceable);
        assert_eq!(addr.to_raw(), RAW);
        assert_eq!(addr.to_base64(), addr_str);
    }

    #[test]
    fn test_address_checksum() {
        let mut bad = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N".to_string();
        bad.replace_range(46..47, "O");
        assert_eq!(
            Address::from_base64(&bad).unwrap_err(),
            AddressError::ChecksumMismatch
        );
    }

    #[test]
    fn test_from_str_accepts_both_forms() {
        let raw: Address = RAW.parse().unwrap();
        let friendly: Address = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N"
            .parse()
            .unwrap();
        assert_eq!(raw, friendly);
    }

    #[test]
    fn test_zero_address_formats() {
        let zero_addr = Address::new(0, [0u8; 32]);
        assert_eq!(
            zero_addr.to_raw(),
            "0:0000000000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(
            zero_addr.to_friendly(true, true, false),
            "EQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAM9c"
        );
        assert_eq!(
            zero_addr.to_friendly(true, false, false),
            "UQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAJKZ"
        );
    }
}
