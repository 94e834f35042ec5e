use crate::crc::CRC16;
use pretty_env_logger::formatted_builder;

pub fn init_logger() -> Result<(), log::SetLoggerError> {
    let mut builder = formatted_builder();

    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        builder.parse_filters("info");
    }

    builder.try_init()
}

/// Id of a named get-method, as passed to `runSmcMethod`
pub fn method_name_to_id(name: &str) -> u64 {
    let crc = CRC16.checksum(name.as_bytes()) as u64;
    (crc & 0xFFFF) | 0x10000
}
