//! Lenient UTF-8 walking
//!
//! Script strings are raw byte buffers. The multibyte opcodes look only at
//! lead bytes: a valid lead decides the sequence length, anything else
//! counts as a single byte. Truncated sequences are clamped to the buffer.

use std::ops::Range;

/// Length of the sequence introduced by `lead` (1 for invalid leads)
#[inline]
pub fn utf8_seq_len(lead: u8) -> usize {
    if lead & 0x80 == 0 {
        1
    } else if lead & 0xE0 == 0xC0 {
        2
    } else if lead & 0xF0 == 0xE0 {
        3
    } else if lead & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}

/// Count characters the way MBStringLength does
pub fn count_chars(bytes: &[u8]) -> usize {
    let mut i = 0;
    let mut count = 0;
    while i < bytes.len() {
        i += utf8_seq_len(bytes[i]);
        count += 1;
    }
    count
}

/// Decode the first character
///
/// Returns 0 for an empty buffer or an invalid lead byte. Continuation
/// bytes are masked without validation and missing ones read as zero.
pub fn decode_first(bytes: &[u8]) -> u32 {
    let Some(&lead) = bytes.first() else {
        return 0;
    };
    let cont = |i: usize| (bytes.get(i).copied().unwrap_or(0) & 0x3F) as u32;

    if lead & 0x80 == 0 {
        lead as u32
    } else if lead & 0xE0 == 0xC0 {
        ((lead & 0x1F) as u32) << 6 | cont(1)
    } else if lead & 0xF0 == 0xE0 {
        ((lead & 0x0F) as u32) << 12 | cont(1) << 6 | cont(2)
    } else if lead & 0xF8 == 0xF0 {
        ((lead & 0x07) as u32) << 18 | cont(1) << 12 | cont(2) << 6 | cont(3)
    } else {
        0
    }
}

/// Byte range covering `count` characters starting at character `start`
///
/// Both ends are clamped to the buffer.
pub fn char_range(bytes: &[u8], start: usize, count: usize) -> Range<usize> {
    let mut i = 0;
    let mut seen = 0;
    while i < bytes.len() && seen < start {
        i += utf8_seq_len(bytes[i]);
        seen += 1;
    }
    let begin = i.min(bytes.len());

    let mut taken = 0;
    while i < bytes.len() && taken < count {
        i += utf8_seq_len(bytes[i]);
        taken += 1;
    }
    begin..i.min(bytes.len())
}
