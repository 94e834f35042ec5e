//! Tests for CRC module

use super::*;

const CHECK_INPUT: &[u8] = b"123456789";

#[test]
fn test_crc16_check_value() {
    assert_eq!(CRC16.checksum(CHECK_INPUT), 0x31c3);
}

#[test]
fn test_crc32_check_value() {
    assert_eq!(CRC32.checksum(CHECK_INPUT), 0xcbf43926);
}

#[test]
fn test_crc32c_check_value() {
    assert_eq!(CRC32C.checksum(CHECK_INPUT), 0xe3069283);
}

#[test]
fn test_crc32c_empty_cell_boc() {
    // Header and body of the canonical empty-cell BoC with the CRC flag set
    let data = hex::decode("b5ee9c72410101010002000000").unwrap();
    let crc = CRC32C.checksum(&data);
    assert_eq!(crc.to_le_bytes(), [0x4c, 0xac, 0xb9, 0xcd]);
}

#[test]
fn test_crc16_method_name() {
    // `seqno` get-method id is (crc16 & 0xffff) | 0x10000
    let crc = CRC16.checksum(b"seqno") as u32;
    assert_eq!(crc | 0x10000, 85143);
}

#[test]
fn test_crc32_tl_constructor() {
    let crc = CRC32.checksum(b"liteServer.query data:bytes = Object");
    assert_eq!(crc, 0x798c06df);
}

#[test]
fn test_crc32c_digest_update() {
    let mut digest = CRC32C.digest();
    digest.update(b"hello");
    digest.update(b" world");
    assert_eq!(digest.finalize(), CRC32C.checksum(b"hello world"));
}

#[test]
fn test_crc16_order_matters() {
    assert_ne!(CRC16.checksum(b"abc"), CRC16.checksum(b"bca"));
}
