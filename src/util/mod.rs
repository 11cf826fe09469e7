//! Utility functions
//!
//! Number formatting/parsing and UTF-8 helpers shared by the runtime.

pub mod dtoa;
pub mod unicode;

pub use dtoa::{format_g15, parse_number};
pub use unicode::{count_chars, decode_first, utf8_seq_len};

/// Maximum bytes for a UTF-8 character
pub const UTF8_CHAR_LEN_MAX: usize = 4;

/// Highest code point accepted by the multibyte conversions
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

/// Encode a Unicode code point to UTF-8
///
/// Returns the number of bytes written (1-4).
/// The buffer must have at least UTF8_CHAR_LEN_MAX bytes available.
/// Surrogate code points are encoded as-is, the way the legacy player does.
#[inline]
pub fn unicode_to_utf8(buf: &mut [u8; UTF8_CHAR_LEN_MAX], c: u32) -> usize {
    if c < 0x80 {
        buf[0] = c as u8;
        1
    } else if c < 0x800 {
        buf[0] = (0xC0 | (c >> 6)) as u8;
        buf[1] = (0x80 | (c & 0x3F)) as u8;
        2
    } else if c < 0x10000 {
        buf[0] = (0xE0 | (c >> 12)) as u8;
        buf[1] = (0x80 | ((c >> 6) & 0x3F)) as u8;
        buf[2] = (0x80 | (c & 0x3F)) as u8;
        3
    } else {
        buf[0] = (0xF0 | (c >> 18)) as u8;
        buf[1] = (0x80 | ((c >> 12) & 0x3F)) as u8;
        buf[2] = (0x80 | ((c >> 6) & 0x3F)) as u8;
        buf[3] = (0x80 | (c & 0x3F)) as u8;
        4
    }
}

/// Encode a code point into an owned byte vector
///
/// Returns None above [`MAX_CODE_POINT`].
pub fn encode_code_point(c: u32) -> Option<Vec<u8>> {
    if c > MAX_CODE_POINT {
        return None;
    }
    let mut buf = [0u8; UTF8_CHAR_LEN_MAX];
    let len = unicode_to_utf8(&mut buf, c);
    Some(buf[..len].to_vec())
}

/// Render bytes as a Rust byte-string literal body (without the `b"` `"` quotes)
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}
