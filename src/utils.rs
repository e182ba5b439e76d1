/// Format a buffer as a lowercase hex string, with no prefix
pub fn buf_to_hex_str(b: &[u8]) -> String {
    hex::encode(b)
}

/// Parse a hex string with no prefix. Return None if the string has an odd
/// length or contains anything other than hex digits.
pub fn hex_str_to_buf(s: &str) -> Option<Vec<u8>> {
    hex::decode(s).ok()
}
