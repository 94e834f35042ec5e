//! Constructor id helpers

use crate::crc::CRC32;

/// Computes the constructor id of a TL schema line.
///
/// The id is the CRC32 (IEEE) of the line with parentheses and the trailing
/// semicolon removed and whitespace collapsed to single spaces.
pub fn tl_id(schema: &str) -> u32 {
    let stripped: String = schema
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ';'))
        .collect();
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    CRC32.checksum(normalized.as_bytes())
}

/// Reads the little-endian constructor id at the start of `data`
pub fn peek_id(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tl_id_normalization() {
        assert_eq!(tl_id("liteServer.getTime = liteServer.CurrentTime"), 0x16ad5a34);
        assert_eq!(
            tl_id("liteServer.getTime   =  liteServer.CurrentTime;"),
            0x16ad5a34
        );
        assert_eq!(
            tl_id(
                "liteServer.libraryResult result:(vector liteServer.libraryEntry) = liteServer.LibraryResult"
            ),
            0x117ab96b
        );
    }

    #[test]
    fn test_peek_id() {
        assert_eq!(peek_id(&[0x34, 0x5a, 0xad, 0x16, 0xff]), Some(0x16ad5a34));
        assert_eq!(peek_id(&[0x34, 0x5a]), None);
    }
}
