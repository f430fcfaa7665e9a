//! Hex argument parsing.

use alloy_primitives::{hex, Bytes};

/// Parses a hex string with an optional `0x` prefix into bytes. An empty string is empty bytes.
pub fn parse_hex(s: &str) -> Result<Bytes, hex::FromHexError> {
    let s = s.trim();
    let hex_str = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    Ok(hex::decode(hex_str)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x").unwrap(), Bytes::new());
        assert_eq!(parse_hex("").unwrap(), Bytes::new());
        assert_eq!(parse_hex("0xd0e30db0").unwrap(), Bytes::from_static(&[0xd0, 0xe3, 0x0d, 0xb0]));
        assert_eq!(parse_hex(" 0XABcd\n").unwrap(), Bytes::from_static(&[0xab, 0xcd]));
        assert!(parse_hex("0x123").is_err());
        assert!(parse_hex("0xzz").is_err());
    }
}
